use std::collections::HashMap;

use anyhow::{Result, bail};
use tracing::debug;

const PRELUDE: &str = include_str!("../shaders/render.wgsl");
const STAGES_MARKER: &str = "//__STAGES__";

/// Full compute shader source for a RenderCore stage body.
pub fn compose_shader(stage_body: &str) -> String {
    PRELUDE.replacen(STAGES_MARKER, stage_body, 1)
}

/// Compiles one compute pipeline per distinct stage body and keeps it.
///
/// Parameter Sets that enable the same stages share a pipeline; only
/// toggling a stage on or off compiles a new one.
pub struct ShaderManager {
    pipelines: HashMap<blake3::Hash, wgpu::ComputePipeline>,
}

impl ShaderManager {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    pub fn get_or_create_pipeline(
        &mut self,
        device: &wgpu::Device,
        stage_body: &str,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Result<&wgpu::ComputePipeline> {
        let key = blake3::hash(stage_body.as_bytes());
        if !self.pipelines.contains_key(&key) {
            debug!(key = %key.to_hex(), "compiling render shader");
            let source = compose_shader(stage_body);

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("render"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("render_layout"),
                bind_group_layouts: &[bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("render"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                bail!("render shader failed to compile: {err}");
            }

            self.pipelines.insert(key, pipeline);
        }

        Ok(&self.pipelines[&key])
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl Default for ShaderManager {
    fn default() -> Self {
        Self::new()
    }
}
