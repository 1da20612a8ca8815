mod io;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filmlab_core::params::SourceType;
use filmlab_core::white_balance::solve_temp_tint;
use filmlab_core::{EngineConfig, Lut3d, RenderTarget, bake_cube};
use filmlab_gpu::FrameRenderer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filmlab", version, about = "Film scan colour rendering")]
struct Cli {
    /// Engine configuration (JSON). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an image through a preset.
    Render {
        input: PathBuf,
        output: PathBuf,
        /// Preset document (flat key/value JSON).
        #[arg(long)]
        preset: Option<PathBuf>,
        /// Output width in pixels; 0 keeps the crop's native width.
        #[arg(long, default_value_t = 0)]
        width: u32,
        /// Treat the input as a negative scan.
        #[arg(long)]
        negative: bool,
        /// Skip GPU initialization.
        #[arg(long)]
        cpu: bool,
    },
    /// Bake a preset's colour stages into a .cube file.
    ExportCube {
        output: PathBuf,
        #[arg(long)]
        preset: Option<PathBuf>,
        #[arg(long, default_value_t = 33)]
        size: usize,
        #[arg(long)]
        title: Option<String>,
    },
    /// Write the inverse of a .cube LUT.
    InvertLut {
        input: PathBuf,
        output: PathBuf,
        /// Grid size of the inverse; defaults to the input size.
        #[arg(long)]
        size: Option<usize>,
    },
    /// Solve temp/tint that neutralizes an RGB sample (0..255).
    SolveWb {
        r: f32,
        g: f32,
        b: f32,
        #[arg(long)]
        preset: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Render {
            input,
            output,
            preset,
            width,
            negative,
            cpu,
        } => {
            let mut params = io::load_preset(preset.as_deref())?;
            if negative {
                params.set_source_type(SourceType::Negative);
            }
            let source = io::load_image(&input)?;
            let mut renderer = if cpu {
                FrameRenderer::cpu_only(config.film_profiles.clone())
            } else {
                FrameRenderer::new(config.film_profiles.clone())
            };
            let frame = renderer.render(&params, &source, RenderTarget::export(width));
            io::save_image(&frame.output.image, &output)?;
            info!(
                path = %output.display(),
                width = frame.output.image.width,
                height = frame.output.image.height,
                backend = ?frame.backend,
                "rendered"
            );
        }
        Command::ExportCube {
            output,
            preset,
            size,
            title,
        } => {
            let params = io::load_preset(preset.as_deref())?;
            let cube = bake_cube(&params, &config.film_profiles, size).with_title(title);
            io::write_text(&output, &cube.to_cube_string())?;
            info!(path = %output.display(), size = cube.size(), "exported cube");
        }
        Command::InvertLut {
            input,
            output,
            size,
        } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("read LUT: {}", input.display()))?;
            let lut = Lut3d::parse_cube(&text)
                .with_context(|| format!("parse LUT: {}", input.display()))?;
            let inverse = lut.inverted(size.unwrap_or(lut.size()));
            io::write_text(&output, &inverse.to_cube_string())?;
            info!(path = %output.display(), size = inverse.size(), "wrote inverse LUT");
        }
        Command::SolveWb { r, g, b, preset } => {
            let params = io::load_preset(preset.as_deref())?;
            match solve_temp_tint([r, g, b], params.base_gains()) {
                Some((temp, tint)) => println!("{}", serde_json::json!({ "temp": temp, "tint": tint })),
                None => warn!("sample cannot be neutralized; temp/tint unchanged"),
            }
        }
    }
    Ok(())
}
