use std::sync::Arc;

use anyhow::{Result, bail, ensure};
use bytemuck::{Pod, Zeroable};
use tracing::{debug, info, warn};

use filmlab_core::geometry::SampleTransform;
use filmlab_core::lut::LUT1D_SIZE;
use filmlab_core::pipeline::{StageUniforms, curve_row};
use filmlab_core::{
    FilmProfiles, Histograms, ImageBuf, ParameterSet, RenderCore, RenderOutput, RenderTarget,
};

use crate::cache::{FrameKey, OutputCache};
use crate::context::GpuContext;
use crate::shader::ShaderManager;
use crate::texture::GpuTexture;

const WORKGROUP_SIZE: u32 = 16;

/// Uniform block matching `Params` in `render.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuParams {
    pub xform0: [f32; 4],
    pub xform1: [f32; 4],
    pub dims: [u32; 4],
    pub gains: [f32; 4],
    pub film: [f32; 4],
    pub split_shadow: [f32; 4],
    pub split_highlight: [f32; 4],
    pub split_params: [f32; 4],
    pub lut: [f32; 4],
    pub hsl: [[f32; 4]; 8],
}

impl GpuParams {
    pub fn new(transform: &SampleTransform, stages: &StageUniforms) -> Self {
        let m = transform.matrix;
        Self {
            xform0: [m[0], m[1], m[2], 0.0],
            xform1: [m[3], m[4], m[5], 0.0],
            dims: [transform.src_w, transform.src_h, transform.out_w, transform.out_h],
            gains: stages.gains,
            film: stages.film,
            split_shadow: stages.split_shadow,
            split_highlight: stages.split_highlight,
            split_params: stages.split_params,
            lut: stages.lut,
            hsl: stages.hsl,
        }
    }
}

/// Something that can run a prepared RenderCore over a source image.
///
/// Implemented by [`GpuRenderer`]; [`FrameRenderer`] falls back to the
/// CPU path whenever it returns an error.
pub trait Accelerator {
    fn name(&self) -> &str;

    fn render(
        &mut self,
        core: &RenderCore,
        source: &ImageBuf,
        transform: &SampleTransform,
    ) -> Result<ImageBuf>;
}

/// Runs the generated compute shader for a RenderCore.
pub struct GpuRenderer {
    ctx: GpuContext,
    shaders: ShaderManager,
    layout: wgpu::BindGroupLayout,
    /// Last uploaded source, keyed by content digest.
    source: Option<([u8; 32], GpuTexture)>,
    empty_atlas: GpuTexture,
}

impl GpuRenderer {
    pub fn new(ctx: GpuContext) -> Self {
        let layout = Self::create_layout(&ctx.device);
        let empty_atlas =
            GpuTexture::from_rgba8(&ctx.device, &ctx.queue, 1, 1, &[0, 0, 0, 255], "empty_atlas");
        Self {
            ctx,
            shaders: ShaderManager::new(),
            layout,
            source: None,
            empty_atlas,
        }
    }

    fn create_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let sampled = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render_bgl"),
            entries: &[
                // Source image
                sampled(0),
                // Output image
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                // Params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Curve rows
                sampled(3),
                // 3D LUT atlas
                sampled(4),
            ],
        })
    }

    fn upload_source(&mut self, source: &ImageBuf) {
        let digest = source.digest();
        if self.source.as_ref().is_none_or(|(d, _)| *d != digest) {
            debug!(w = source.width, h = source.height, "uploading source texture");
            let tex = GpuTexture::from_image_buf(&self.ctx.device, &self.ctx.queue, source, "source");
            self.source = Some((digest, tex));
        }
    }

    fn encode_and_run(
        &mut self,
        core: &RenderCore,
        source: &ImageBuf,
        transform: &SampleTransform,
    ) -> Result<ImageBuf> {
        let max_dim = self.ctx.max_texture_dimension();
        ensure!(source.width > 0 && source.height > 0, "empty source image");
        ensure!(
            source.width <= max_dim
                && source.height <= max_dim
                && transform.out_w <= max_dim
                && transform.out_h <= max_dim,
            "image exceeds GPU texture limit of {max_dim}"
        );

        let payload = core.gpu_payload();
        let params = GpuParams::new(transform, &payload.uniforms);

        let curves = GpuTexture::from_f32_rows(
            &self.ctx.device,
            &self.ctx.queue,
            LUT1D_SIZE as u32,
            &payload.curves,
            "curves",
        );
        debug_assert_eq!(curves.height as usize, curve_row::COUNT);

        let atlas = match &payload.lut {
            Some(lut) => {
                ensure!(
                    lut.size * lut.size <= max_dim,
                    "3D LUT of size {} exceeds GPU texture limit",
                    lut.size
                );
                Some(GpuTexture::from_rgba8(
                    &self.ctx.device,
                    &self.ctx.queue,
                    lut.size,
                    lut.size * lut.size,
                    &lut.pixels,
                    "lut_atlas",
                ))
            }
            None => None,
        };

        let params_buf = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("render_params"),
            size: std::mem::size_of::<GpuParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.ctx
            .queue
            .write_buffer(&params_buf, 0, bytemuck::bytes_of(&params));

        let output =
            GpuTexture::create_storage(&self.ctx.device, transform.out_w, transform.out_h, "render_out");

        let body = core.wgsl_body();
        let pipeline = self
            .shaders
            .get_or_create_pipeline(&self.ctx.device, &body, &self.layout)?
            .clone();

        self.upload_source(source);
        let Some((_, source_tex)) = &self.source else {
            bail!("source texture missing after upload");
        };
        let atlas_view = atlas.as_ref().map_or(&self.empty_atlas.view, |a| &a.view);
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("render_bg"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source_tex.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&curves.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(atlas_view),
                },
            ],
        });

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("render_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                transform.out_w.div_ceil(WORKGROUP_SIZE),
                transform.out_h.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.download(&self.ctx.device, &self.ctx.queue)
    }
}

impl Accelerator for GpuRenderer {
    fn name(&self) -> &str {
        &self.ctx.adapter_name
    }

    fn render(
        &mut self,
        core: &RenderCore,
        source: &ImageBuf,
        transform: &SampleTransform,
    ) -> Result<ImageBuf> {
        self.ctx
            .device
            .push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = self.encode_and_run(core, source, transform);
        let validation = pollster::block_on(self.ctx.device.pop_error_scope());
        let oom = pollster::block_on(self.ctx.device.pop_error_scope());

        if let Some(err) = validation.or(oom) {
            // A failed frame may have left a half-written source upload.
            self.source = None;
            bail!("GPU error: {err}");
        }
        result
    }
}

/// Which backend produced a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Gpu,
    Cpu,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub output: Arc<RenderOutput>,
    pub backend: Backend,
    pub cache_hit: bool,
}

/// Renders frames on the GPU when one is available, caching the last
/// output. Any GPU failure renders that frame on the CPU instead and
/// empties the cache, so the next frame tries the GPU again.
pub struct FrameRenderer {
    accelerator: Option<Box<dyn Accelerator>>,
    cache: OutputCache,
    cached_backend: Backend,
    profiles: FilmProfiles,
}

impl FrameRenderer {
    /// Use the GPU if one can be initialized, the CPU otherwise.
    pub fn new(profiles: FilmProfiles) -> Self {
        match GpuContext::new_blocking() {
            Ok(ctx) => Self::with_accelerator(Box::new(GpuRenderer::new(ctx)), profiles),
            Err(err) => {
                warn!(%err, "GPU unavailable, rendering on the CPU");
                Self::cpu_only(profiles)
            }
        }
    }

    pub fn cpu_only(profiles: FilmProfiles) -> Self {
        Self {
            accelerator: None,
            cache: OutputCache::default(),
            cached_backend: Backend::Cpu,
            profiles,
        }
    }

    pub fn with_accelerator(accelerator: Box<dyn Accelerator>, profiles: FilmProfiles) -> Self {
        info!(accelerator = accelerator.name(), "frame renderer using accelerator");
        Self {
            accelerator: Some(accelerator),
            cache: OutputCache::default(),
            cached_backend: Backend::Gpu,
            profiles,
        }
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn render(&mut self, params: &ParameterSet, source: &ImageBuf, target: RenderTarget) -> Frame {
        let key = FrameKey::new(params, source, target);
        if let Some(output) = self.cache.get(&key) {
            return Frame {
                output,
                backend: self.cached_backend,
                cache_hit: true,
            };
        }

        let core = RenderCore::prepare(params, &self.profiles);
        let transform = SampleTransform::new(source.width, source.height, params, target.output_width);

        if let Some(accelerator) = self.accelerator.as_mut() {
            match accelerator.render(&core, source, &transform) {
                Ok(image) => {
                    let histograms = Histograms::from_rgba(&image.data, target.histogram_stride);
                    let output = Arc::new(RenderOutput { image, histograms });
                    self.cache.store(key, Arc::clone(&output));
                    self.cached_backend = Backend::Gpu;
                    debug!(w = transform.out_w, h = transform.out_h, "gpu frame");
                    return Frame {
                        output,
                        backend: Backend::Gpu,
                        cache_hit: false,
                    };
                }
                Err(err) => {
                    warn!(%err, "GPU render failed, falling back to CPU for this frame");
                    self.cache.invalidate();
                    let output = Arc::new(filmlab_core::render_cpu(
                        &core,
                        source,
                        &transform,
                        target.histogram_stride,
                    ));
                    return Frame {
                        output,
                        backend: Backend::Cpu,
                        cache_hit: false,
                    };
                }
            }
        }

        let output = Arc::new(filmlab_core::render_cpu(
            &core,
            source,
            &transform,
            target.histogram_stride,
        ));
        self.cache.store(key, Arc::clone(&output));
        self.cached_backend = Backend::Cpu;
        Frame {
            output,
            backend: Backend::Cpu,
            cache_hit: false,
        }
    }
}
