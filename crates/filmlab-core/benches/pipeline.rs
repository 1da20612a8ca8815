//! CPU path benchmarks.
//!
//! Run with: cargo bench -p filmlab-core

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use filmlab_core::lut::Lut3d;
use filmlab_core::params::{CurvePoint, LutSlot, ToneZone};
use filmlab_core::pipeline::cpu::{RenderTarget, render_with};
use filmlab_core::{FilmProfiles, ImageBuf, ParameterSet, RenderCore, bake_cube};

fn gradient(width: u32, height: u32) -> ImageBuf {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            data.extend_from_slice(&[r, g, r / 2 + g / 2, 255]);
        }
    }
    ImageBuf {
        width,
        height,
        data,
    }
}

fn heavy_params() -> ParameterSet {
    let mut p = ParameterSet::negative();
    p.temp = -12.0;
    p.tint = 4.0;
    p.film_curve_enabled = true;
    p.exposure = 10.0;
    p.contrast = 25.0;
    p.shadows = 30.0;
    p.curves.rgb.insert(1, CurvePoint::new(70.0, 60.0));
    p.hsl_params.buckets[1].saturation = 20.0;
    p.split_toning.highlights = ToneZone {
        hue: 40.0,
        saturation: 15.0,
    };
    p.lut1 = Some(LutSlot::new(Lut3d::identity(33), 0.8));
    p.rotation = 3.5;
    p
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_cpu");
    let profiles = FilmProfiles::default();

    for (name, params) in [("identity", ParameterSet::default()), ("all_stages", heavy_params())] {
        for size in [256u32, 1024] {
            let source = gradient(size, size);
            group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
            group.bench_with_input(
                BenchmarkId::new(name, format!("{size}x{size}")),
                &source,
                |b, source| {
                    b.iter(|| {
                        render_with(
                            black_box(&params),
                            &profiles,
                            black_box(source),
                            RenderTarget::export(0),
                        )
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_prepare(c: &mut Criterion) {
    let params = heavy_params();
    let profiles = FilmProfiles::default();
    c.bench_function("prepare_render_core", |b| {
        b.iter(|| RenderCore::prepare(black_box(&params), &profiles));
    });
    c.bench_function("bake_cube_33", |b| {
        b.iter(|| bake_cube(black_box(&params), &profiles, 33));
    });
}

criterion_group!(benches, bench_render, bench_prepare);
criterion_main!(benches);
