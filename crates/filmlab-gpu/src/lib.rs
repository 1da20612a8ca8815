//! GPU execution path.
//!
//! The compute shader is generated from the RenderCore stage list, so the
//! GPU always runs the same stages in the same order as the CPU path.

pub mod cache;
pub mod context;
pub mod renderer;
pub mod shader;
pub mod texture;

pub use context::GpuContext;
pub use renderer::{Accelerator, Backend, Frame, FrameRenderer, GpuParams, GpuRenderer};
pub use shader::compose_shader;
