pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod histogram;
pub mod history;
pub mod image_buf;
pub mod lut;
pub mod params;
pub mod pipeline;
pub mod session;
pub mod white_balance;

pub use config::{EngineConfig, FilmProfile, FilmProfiles};
pub use error::LutError;
pub use histogram::Histograms;
pub use history::History;
pub use image_buf::ImageBuf;
pub use lut::Lut3d;
pub use params::ParameterSet;
pub use pipeline::cpu::{RenderOutput, RenderTarget, render, render_cpu, render_with};
pub use pipeline::{RenderCore, bake_cube};
pub use session::EditSession;
