use crate::config::load_config;
use crate::placement::LabelPlacement;
use crate::placement_dump::{FrameDump, write_placement_dump};
use crate::render::{render_svg, write_output_svg};
use crate::scene::Scene;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tlp", version, about = "Replay map label placement over a tile scene")]
pub struct Args {
    /// Scene file (.json/.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (placement and render settings)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Frame to render; the last one by default. JSON output dumps every
    /// frame unless set.
    #[arg(long = "frame")]
    pub frame: Option<usize>,

    /// Width, defaults to the scene viewport
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Height, defaults to the scene viewport
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level)?;

    let mut config = load_config(args.config.as_deref())?;
    let scene = read_scene(args.input.as_deref())?;
    let (viewport_width, viewport_height) = scene.viewport_size();
    config.render.width = args.width.unwrap_or(viewport_width);
    config.render.height = args.height.unwrap_or(viewport_height);

    let mut placement = LabelPlacement::new(config.placement.clone());
    let results = scene.play(&mut placement);
    scene.finish(&mut placement);

    let selected = match args.frame {
        Some(frame) if frame >= results.len() => {
            return Err(anyhow::anyhow!(
                "Frame {} out of range, scene has {} frames",
                frame,
                results.len()
            ));
        }
        Some(frame) => frame,
        None => results.len() - 1,
    };

    match args.output_format {
        OutputFormat::Json => {
            let dumps: Vec<FrameDump> = match args.frame {
                Some(frame) => vec![FrameDump::from_result(frame, &results[frame])],
                None => results
                    .iter()
                    .enumerate()
                    .map(|(idx, result)| FrameDump::from_result(idx, result))
                    .collect(),
            };
            write_placement_dump(args.output.as_deref(), &dumps)?;
        }
        OutputFormat::Svg => {
            let svg = render_svg(&results[selected].task, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&results[selected].task, &config.render);
            write_png(&svg, &output, &config.render)?;
        }
    }

    Ok(())
}

fn setup_logging(base_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .map_err(|e| anyhow::anyhow!("Invalid log filter: {e}"))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logger initialization failed: {e}"))
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, render: &crate::config::RenderConfig) -> Result<()> {
    crate::render::write_output_png(svg, output, render)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _render: &crate::config::RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_scene(path: Option<&Path>) -> Result<Scene> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Scene::load(path);
        }
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Scene::parse(&buf)?)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
