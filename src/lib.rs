#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # magic-photo
//!
//! A photo editor library with two features:
//!
//! - **AI background removal**: a foreground segmentation model (ONNX, run by
//!   Tract or ONNX Runtime) turns an upload into a transparent PNG cut-out.
//! - **Magic eraser**: the upload is resized for display, the user paints over
//!   an unwanted object, and the painted region is reconstructed by inpainting
//!   (fast marching or diffusion). The result is offered as a JPEG.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use magic_photo::{remove_background_from_bytes, BackendType, EditorConfig};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = EditorConfig::builder()
//!     .backend_type(BackendType::Tract)
//!     .model_path("models/u2net.onnx")
//!     .build()?;
//! let result = remove_background_from_bytes(&upload, "photo.jpg", &config).await?;
//! result.save("no_bg.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Interactive editing
//!
//! Front ends drive an [`EditorSession`] with [`SessionEvent`]s and render the
//! returned [`Notice`]s:
//!
//! ```rust
//! use magic_photo::{BackendType, EditorConfig, EditorSession, EraserState, SessionEvent, StrokeEvent};
//! # use image::{DynamicImage, ImageFormat, RgbImage};
//! # let mut bytes = Vec::new();
//! # DynamicImage::ImageRgb8(RgbImage::new(700, 500))
//! #     .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
//!
//! let config = EditorConfig::builder().backend_type(BackendType::Mock).build().unwrap();
//! let mut session = EditorSession::new(config).unwrap();
//!
//! session.handle(SessionEvent::UploadEraser { bytes, file_name: "room.png".into() });
//! assert_eq!(session.display_image().unwrap().dimensions(), (350, 250));
//!
//! session.handle(SessionEvent::Stroke(StrokeEvent::new(vec![(100.0, 100.0), (140.0, 120.0)], 15)));
//! session.handle(SessionEvent::Erase);
//! assert_eq!(session.eraser_state(), EraserState::Inpainted);
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust segmentation backend
//! - `onnx`: ONNX Runtime backend with optional CUDA acceleration
//! - `cli` (default): the `magic-photo` command line tool
//! - `tracing-json`: JSON log output for the command line tool

pub mod backends;
pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod display;
pub mod eraser;
pub mod error;
pub mod inference;
pub mod inpaint;
pub mod models;
pub mod processor;
pub mod services;
pub mod session;
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::*;
pub use canvas::{DrawingSurface, StrokeEvent};
pub use config::{Backdrop, EditorConfig, EditorConfigBuilder, ExecutionProvider, InpaintMethod, OutputFormat};
pub use display::{prepare_display_image, resize_for_display};
pub use eraser::ObjectEraser;
pub use error::{PhotoEditError, Result};
pub use inference::InferenceBackend;
pub use self::inpaint::{inpaint, InpaintExt};
pub use models::{ModelManager, ModelSpec, PreprocessingConfig};
pub use processor::{BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory};
pub use services::{ImageIOService, OutputFormatHandler};
pub use session::{EditorSession, EraserState, Notice, SessionEvent};
pub use types::{Artifact, DisplayImage, EditResult, PaintMask, SegmentationMask, SourceImage};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, ProviderInfo};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{TracingConfig, TracingFormat};

/// Remove the background of an uploaded image
///
/// `file_name` is only used to check the upload extension and for messages.
///
/// # Errors
/// - The bytes are not a PNG or JPEG image
/// - The backend cannot be created or its model cannot be loaded
/// - Inference or encoding failures
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    file_name: &str,
    config: &EditorConfig,
) -> Result<EditResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes, file_name)
}

/// Remove the background of an image read from an async stream
///
/// # Errors
/// - Reading the stream fails
/// - Same as [`remove_background_from_bytes`]
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    file_name: &str,
    config: &EditorConfig,
) -> Result<EditResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, file_name, config).await
}
