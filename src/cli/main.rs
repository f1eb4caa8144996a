//! magic-photo command line front end

use super::config::CliConfigBuilder;
use super::shell;
use crate::{
    canvas::StrokeEvent,
    config::{Backdrop, EditorConfig, InpaintMethod},
    processor::BackgroundRemovalProcessor,
    services::{ImageIOService, BACKGROUND_REMOVED_FILE_NAME, ERASED_FILE_NAME},
    session::{EditorSession, Notice, SessionEvent},
    tracing_config::{init_cli_tracing, spans},
    types::{EditResult, PaintMask},
    utils::ExecutionProviderManager,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use image::imageops::FilterType;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Instrument;

/// Photo editor with AI background removal and a magic eraser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "magic-photo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON configuration file [default: <config dir>/magic-photo/config.json if present]
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Segmentation backend as backend[:provider] (tract, onnx:auto, onnx:cuda, mock)
    #[arg(short, long, value_name = "BACKEND", global = true)]
    pub backend: Option<String>,

    /// Segmentation model file, or a directory containing model.onnx
    #[arg(short, long, value_name = "PATH", global = true)]
    pub model: Option<PathBuf>,

    /// Inference threads (0 = auto)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove the background of a photo and write a transparent PNG
    RemoveBg(RemoveBgArgs),
    /// Erase a painted region of a photo and write a JPEG
    Erase(EraseArgs),
    /// Interactive editing session over stdin
    Session,
    /// Show segmentation backends and execution providers
    Providers,
}

#[derive(Args, Debug)]
pub struct RemoveBgArgs {
    /// PNG or JPEG photo
    pub input: PathBuf,

    /// Output file [default: no_bg.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("paint").required(true).args(["strokes", "mask"]))]
pub struct EraseArgs {
    /// PNG or JPEG photo
    pub input: PathBuf,

    /// JSON array of strokes in display coordinates
    #[arg(long, value_name = "FILE")]
    pub strokes: Option<PathBuf>,

    /// Mask image; non-zero pixels are erased (resized to the display size)
    #[arg(long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Brush size for strokes that do not set one (1-50)
    #[arg(long)]
    pub brush_size: Option<u32>,

    /// Inpainting neighborhood radius
    #[arg(long)]
    pub radius: Option<u32>,

    /// Inpainting method (telea, diffusion)
    #[arg(long)]
    pub method: Option<InpaintMethod>,

    /// Width the photo is scaled to before painting
    #[arg(long)]
    pub display_width: Option<u32>,

    /// Color behind transparent pixels (white, black, #rrggbb)
    #[arg(long)]
    pub backdrop: Option<Backdrop>,

    /// JPEG quality of the result (1-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Output file [default: erased_photo.jpg]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,
}

/// A stroke as written in a strokes file; the brush size may be omitted
#[derive(Debug, serde::Deserialize)]
struct StrokeRecord {
    points: Vec<(f32, f32)>,
    brush_size: Option<u32>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    if matches!(cli.command, Command::Providers) {
        show_provider_diagnostics();
        return Ok(());
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let command_name = match &cli.command {
        Command::RemoveBg(_) => "remove-bg",
        Command::Erase(_) => "erase",
        Command::Session => "session",
        Command::Providers => "providers",
    };
    let session_span = spans::session(&session_id, command_name);
    run_command(&cli, config).instrument(session_span).await
}

async fn run_command(cli: &Cli, config: EditorConfig) -> Result<()> {
    info!(
        "Backend: {}, model: {}",
        ExecutionProviderManager::provider_to_string(config.backend_type, config.execution_provider),
        config.model_spec.display_name()
    );

    match &cli.command {
        Command::RemoveBg(args) => {
            let mut processor = BackgroundRemovalProcessor::new(config)
                .context("Failed to create background removal processor")?;
            remove_background(&mut processor, args)
                .instrument(spans::file_processing(&args.input))
                .await
        },
        Command::Erase(args) => {
            let session = EditorSession::new(config).context("Failed to create editing session")?;
            erase(session, args)
                .instrument(spans::file_processing(&args.input))
                .await
        },
        Command::Session => {
            let session = EditorSession::new(config).context("Failed to create editing session")?;
            shell::run(session).await
        },
        Command::Providers => Ok(()),
    }
}

async fn remove_background(
    processor: &mut BackgroundRemovalProcessor,
    args: &RemoveBgArgs,
) -> Result<()> {
    let spinner = spinner("Removing background...");
    let result = processor.process_file(&args.input).await;
    spinner.finish_and_clear();
    let result = result.context("Failed to remove background")?;

    let output = CliConfigBuilder::output_path(args.output.as_ref(), BACKGROUND_REMOVED_FILE_NAME);
    save_result(&result, &output).await?;
    report_timings(&args.input, &result);
    println!("✓ Done! Saved {}", output.display());
    Ok(())
}

async fn erase(mut session: EditorSession, args: &EraseArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let file_name = args
        .input
        .file_name()
        .map_or_else(|| args.input.display().to_string(), |n| n.to_string_lossy().into_owned());
    expect_no_errors(session.handle(SessionEvent::UploadEraser { bytes, file_name }))?;

    let events = match (&args.strokes, &args.mask) {
        (Some(path), _) => load_strokes(path, session.brush_size())
            .await?
            .into_iter()
            .map(SessionEvent::Stroke)
            .collect(),
        (None, Some(path)) => {
            let display = session
                .display_image()
                .context("Display image missing after upload")?;
            vec![SessionEvent::PaintMask(load_mask(path, display.dimensions())?)]
        },
        (None, None) => bail!("Either --strokes or --mask is required"),
    };
    for event in events {
        expect_no_errors(session.handle(event))?;
    }

    let spinner = spinner("Erasing...");
    let notices = session.handle(SessionEvent::Erase);
    spinner.finish_and_clear();
    for notice in &notices {
        match notice {
            Notice::Error(message) => bail!("{message}"),
            Notice::Warning(message) => bail!("{message}"),
            _ => {},
        }
    }

    let result = session
        .eraser_result()
        .context("Erase finished without a result")?;
    let output = CliConfigBuilder::output_path(args.output.as_ref(), ERASED_FILE_NAME);
    save_result(result, &output).await?;
    report_timings(&args.input, result);
    println!("✓ Done! Saved {}", output.display());
    Ok(())
}

/// Parse a strokes file, filling in `default_brush` where a stroke has none
pub(crate) fn parse_strokes(json: &str, default_brush: u32) -> Result<Vec<StrokeEvent>> {
    let records: Vec<StrokeRecord> =
        serde_json::from_str(json).context("Strokes file must be a JSON array of strokes")?;
    Ok(records
        .into_iter()
        .map(|record| StrokeEvent::new(record.points, record.brush_size.unwrap_or(default_brush)))
        .collect())
}

async fn load_strokes(path: &Path, default_brush: u32) -> Result<Vec<StrokeEvent>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read strokes file {}", path.display()))?;
    parse_strokes(&json, default_brush)
}

/// Load a mask image and bring it to the display size
pub(crate) fn load_mask(path: &Path, display_dimensions: (u32, u32)) -> Result<PaintMask> {
    let mask = ImageIOService::load_mask(path)
        .with_context(|| format!("Failed to load mask {}", path.display()))?;
    let (width, height) = display_dimensions;
    let mask = if mask.dimensions() == display_dimensions {
        mask
    } else {
        image::imageops::resize(&mask, width, height, FilterType::Nearest)
    };
    Ok(PaintMask::from_gray_thresholded(&mask))
}

async fn save_result(result: &EditResult, output: &Path) -> Result<()> {
    ImageIOService::write_artifact_async(&result.artifact, output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))
}

fn expect_no_errors(notices: Vec<Notice>) -> Result<()> {
    for notice in notices {
        match notice {
            Notice::Error(message) => bail!("{message}"),
            Notice::Warning(message) => log::warn!("{message}"),
            Notice::Info(message) | Notice::Success(message) => info!("{message}"),
        }
    }
    Ok(())
}

fn report_timings(input: &Path, result: &EditResult) {
    let timings = result.timings();
    info!("Processing breakdown for {}:", input.display());
    info!("  ├─ Decode: {}ms", timings.image_decode_ms);
    if timings.inference_ms > 0 {
        info!("  ├─ Preprocessing: {}ms", timings.preprocessing_ms);
        info!("  ├─ Inference: {}ms", timings.inference_ms);
        info!("  ├─ Postprocessing: {}ms", timings.postprocessing_ms);
    }
    if timings.inpainting_ms > 0 {
        info!("  ├─ Inpainting: {}ms", timings.inpainting_ms);
    }
    info!("  ├─ Encode: {}ms", timings.image_encode_ms);
    info!("  └─ Total: {}ms", timings.total_ms);
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn show_provider_diagnostics() {
    println!("Backends and execution providers");
    println!("────────────────────────────────");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected\n");

    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available {
            "available"
        } else {
            "not available"
        };
        println!("  • {:<10} {:<14} {}", provider.name, status, provider.description);
    }

    println!("\nUsage examples:");
    println!("  --backend tract       # Pure Rust inference (default)");
    println!("  --backend onnx:cuda   # ONNX Runtime on an NVIDIA GPU");
    println!("  --backend onnx        # Same as onnx:auto");
    println!("  --backend mock        # Synthetic mask, no model needed");
}
