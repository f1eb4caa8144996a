//! Editing session shared by both tabs
//!
//! A front end feeds [`SessionEvent`]s into [`EditorSession::handle`] one at a
//! time and shows the returned [`Notice`]s. Every failure is contained here:
//! it becomes an error notice and the session keeps its prior state.
//!
//! The eraser tab is a small state machine:
//!
//! ```text
//! NoImage --upload--> ImageLoaded --stroke--> MaskDrawn --erase--> Inpainted
//!    any state --upload--> ImageLoaded (fresh surface)
//!    Inpainted --stroke--> MaskDrawn
//! ```

use crate::{
    canvas::{DrawingSurface, StrokeEvent},
    config::{EditorConfig, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE},
    display::prepare_display_image,
    eraser::ObjectEraser,
    error::Result,
    processor::BackgroundRemovalProcessor,
    services::ImageIOService,
    types::{DisplayImage, EditResult, PaintMask, SourceImage},
};
use std::fmt;
use tracing::{debug, warn};

pub const DONE_MESSAGE: &str = "Done!";
pub const EMPTY_MASK_MESSAGE: &str = "Paint the area you want to erase first!";
pub const NO_IMAGE_MESSAGE: &str = "Upload a photo first!";

/// Eraser tab state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraserState {
    NoImage,
    ImageLoaded,
    MaskDrawn,
    Inpainted,
}

impl fmt::Display for EraserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoImage => "no image",
            Self::ImageLoaded => "image loaded",
            Self::MaskDrawn => "mask drawn",
            Self::Inpainted => "inpainted",
        };
        f.write_str(name)
    }
}

/// User-facing message produced by an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
}

impl Notice {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Info(m) | Self::Success(m) | Self::Warning(m) | Self::Error(m) => m,
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info(m) => write!(f, "{m}"),
            Self::Success(m) => write!(f, "✓ {m}"),
            Self::Warning(m) => write!(f, "⚠ {m}"),
            Self::Error(m) => write!(f, "✗ {m}"),
        }
    }
}

/// One user interaction
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// New upload in the background removal tab
    UploadBackground { bytes: Vec<u8>, file_name: String },
    /// Press of the background removal button
    RemoveBackground,
    /// New upload in the eraser tab
    UploadEraser { bytes: Vec<u8>, file_name: String },
    SetBrushSize(u32),
    /// Freehand stroke in display coordinates
    Stroke(StrokeEvent),
    /// Paint every marked pixel of a ready-made mask
    PaintMask(PaintMask),
    ClearCanvas,
    /// Press of the erase button
    Erase,
}

#[derive(Default)]
struct BackgroundTab {
    source: Option<SourceImage>,
    result: Option<EditResult>,
}

struct EraserTab {
    state: EraserState,
    source: Option<SourceImage>,
    display: Option<DisplayImage>,
    surface: Option<DrawingSurface>,
    result: Option<EditResult>,
}

/// Both editing flows plus the state the front end renders
pub struct EditorSession {
    config: EditorConfig,
    processor: BackgroundRemovalProcessor,
    eraser: ObjectEraser,
    brush_size: u32,
    background: BackgroundTab,
    eraser_tab: EraserTab,
}

impl EditorSession {
    /// Create a session with the backend named in `config`
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: EditorConfig) -> Result<Self> {
        let processor = BackgroundRemovalProcessor::new(config.clone())?;
        Ok(Self::with_processor(config, processor))
    }

    /// Create a session around a prepared processor
    #[must_use]
    pub fn with_processor(config: EditorConfig, processor: BackgroundRemovalProcessor) -> Self {
        Self {
            eraser: ObjectEraser::new(&config),
            brush_size: config.default_brush_size,
            config,
            processor,
            background: BackgroundTab::default(),
            eraser_tab: EraserTab {
                state: EraserState::NoImage,
                source: None,
                display: None,
                surface: None,
                result: None,
            },
        }
    }

    /// Apply one interaction and report what the user should see
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Notice> {
        debug!(state = %self.eraser_tab.state, event = event_name(&event), "Handling session event");
        match event {
            SessionEvent::UploadBackground { bytes, file_name } => {
                self.upload_background(&bytes, &file_name)
            },
            SessionEvent::RemoveBackground => self.remove_background(),
            SessionEvent::UploadEraser { bytes, file_name } => self.upload_eraser(&bytes, &file_name),
            SessionEvent::SetBrushSize(size) => self.set_brush_size(size),
            SessionEvent::Stroke(stroke) => self.paint(|surface| surface.apply(&stroke)),
            SessionEvent::PaintMask(mask) => self.paint(|surface| surface.apply_mask(&mask)),
            SessionEvent::ClearCanvas => self.clear_canvas(),
            SessionEvent::Erase => self.erase(),
        }
    }

    fn upload_background(&mut self, bytes: &[u8], file_name: &str) -> Vec<Notice> {
        match ImageIOService::decode_upload(bytes, file_name) {
            Ok(source) => {
                let (width, height) = source.dimensions();
                self.background = BackgroundTab {
                    source: Some(source),
                    result: None,
                };
                vec![Notice::Info(format!(
                    "Original photo: {file_name} ({width}x{height})"
                ))]
            },
            Err(e) => {
                warn!(error = %e, "Background upload rejected");
                vec![Notice::Error(format!("Could not open {file_name}: {e}"))]
            },
        }
    }

    fn remove_background(&mut self) -> Vec<Notice> {
        let Some(source) = self.background.source.as_ref() else {
            return vec![Notice::Warning(NO_IMAGE_MESSAGE.to_string())];
        };

        match self.processor.process_source(source) {
            Ok(result) => {
                self.background.result = Some(result);
                vec![Notice::Success(DONE_MESSAGE.to_string())]
            },
            Err(e) => {
                warn!(error = %e, "Background removal failed");
                vec![Notice::Error(format!("Background removal failed: {e}"))]
            },
        }
    }

    fn upload_eraser(&mut self, bytes: &[u8], file_name: &str) -> Vec<Notice> {
        let prepared = ImageIOService::decode_upload(bytes, file_name).and_then(|source| {
            let display =
                prepare_display_image(
                    &source,
                    self.config.display_width,
                    self.config.max_display_height,
                    self.config.backdrop,
                )?;
            Ok((source, display))
        });

        match prepared {
            Ok((source, display)) => {
                let (width, height) = display.dimensions();
                let surface = DrawingSurface::new(source.identity_key(), width, height);
                debug!(key = surface.key(), width, height, "New drawing surface");
                self.eraser_tab = EraserTab {
                    state: EraserState::ImageLoaded,
                    source: Some(source),
                    display: Some(display),
                    surface: Some(surface),
                    result: None,
                };
                vec![Notice::Info(format!(
                    "Loaded {file_name}, resized to {width}x{height}. Paint over the object to erase."
                ))]
            },
            Err(e) => {
                warn!(error = %e, "Eraser upload rejected");
                vec![Notice::Error(format!("Could not open {file_name}: {e}"))]
            },
        }
    }

    fn set_brush_size(&mut self, size: u32) -> Vec<Notice> {
        if (MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&size) {
            self.brush_size = size;
            vec![Notice::Info(format!("Brush size: {size}"))]
        } else {
            vec![Notice::Warning(format!(
                "Brush size must be between {MIN_BRUSH_SIZE} and {MAX_BRUSH_SIZE}"
            ))]
        }
    }

    fn paint<F>(&mut self, apply: F) -> Vec<Notice>
    where
        F: FnOnce(&mut DrawingSurface) -> Result<()>,
    {
        let Some(surface) = self.eraser_tab.surface.as_mut() else {
            return vec![Notice::Warning(NO_IMAGE_MESSAGE.to_string())];
        };

        if let Err(e) = apply(surface) {
            return vec![Notice::Error(format!("Could not paint: {e}"))];
        }
        if !surface.is_blank() {
            self.eraser_tab.state = EraserState::MaskDrawn;
        }
        Vec::new()
    }

    fn clear_canvas(&mut self) -> Vec<Notice> {
        let Some(surface) = self.eraser_tab.surface.as_mut() else {
            return vec![Notice::Warning(NO_IMAGE_MESSAGE.to_string())];
        };
        surface.clear();
        if self.eraser_tab.state == EraserState::MaskDrawn {
            self.eraser_tab.state = EraserState::ImageLoaded;
        }
        vec![Notice::Info("Canvas cleared".to_string())]
    }

    fn erase(&mut self) -> Vec<Notice> {
        let (Some(display), Some(surface)) = (
            self.eraser_tab.display.as_ref(),
            self.eraser_tab.surface.as_ref(),
        ) else {
            return vec![Notice::Warning(NO_IMAGE_MESSAGE.to_string())];
        };

        let mask = surface.extract_mask();
        if mask.is_empty() {
            return vec![Notice::Warning(EMPTY_MASK_MESSAGE.to_string())];
        }

        match self.eraser.erase(display, &mask) {
            Ok(result) => {
                self.eraser_tab.result = Some(result);
                self.eraser_tab.state = EraserState::Inpainted;
                vec![Notice::Success(DONE_MESSAGE.to_string())]
            },
            Err(e) => {
                warn!(error = %e, "Erase failed");
                vec![Notice::Error(format!("Erasing failed: {e}"))]
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[must_use]
    pub fn eraser_state(&self) -> EraserState {
        self.eraser_tab.state
    }

    /// Brush size used for new strokes from the front end
    #[must_use]
    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    #[must_use]
    pub fn background_source(&self) -> Option<&SourceImage> {
        self.background.source.as_ref()
    }

    #[must_use]
    pub fn background_result(&self) -> Option<&EditResult> {
        self.background.result.as_ref()
    }

    #[must_use]
    pub fn eraser_source(&self) -> Option<&SourceImage> {
        self.eraser_tab.source.as_ref()
    }

    #[must_use]
    pub fn display_image(&self) -> Option<&DisplayImage> {
        self.eraser_tab.display.as_ref()
    }

    #[must_use]
    pub fn surface(&self) -> Option<&DrawingSurface> {
        self.eraser_tab.surface.as_ref()
    }

    /// Mask the next erase would use
    #[must_use]
    pub fn current_mask(&self) -> Option<PaintMask> {
        self.eraser_tab.surface.as_ref().map(DrawingSurface::extract_mask)
    }

    #[must_use]
    pub fn eraser_result(&self) -> Option<&EditResult> {
        self.eraser_tab.result.as_ref()
    }
}

fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::UploadBackground { .. } => "upload_background",
        SessionEvent::RemoveBackground => "remove_background",
        SessionEvent::UploadEraser { .. } => "upload_eraser",
        SessionEvent::SetBrushSize(_) => "set_brush_size",
        SessionEvent::Stroke(_) => "stroke",
        SessionEvent::PaintMask(_) => "paint_mask",
        SessionEvent::ClearCanvas => "clear_canvas",
        SessionEvent::Erase => "erase",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use crate::processor::BackendType;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn session() -> EditorSession {
        let config = EditorConfig::builder()
            .backend_type(BackendType::Mock)
            .display_width(40)
            .build()
            .unwrap();
        EditorSession::new(config).unwrap()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, _| Rgb([(x * 3) as u8, 90, 160]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(session: &mut EditorSession, name: &str, width: u32, height: u32) -> Vec<Notice> {
        session.handle(SessionEvent::UploadEraser {
            bytes: png_bytes(width, height),
            file_name: name.to_string(),
        })
    }

    fn stroke() -> SessionEvent {
        SessionEvent::Stroke(StrokeEvent::new(vec![(5.0, 5.0), (15.0, 10.0)], 5))
    }

    #[test]
    fn test_eraser_state_transitions() {
        let mut session = session();
        assert_eq!(session.eraser_state(), EraserState::NoImage);

        upload(&mut session, "a.png", 80, 60);
        assert_eq!(session.eraser_state(), EraserState::ImageLoaded);
        assert_eq!(session.display_image().unwrap().dimensions(), (40, 30));

        assert!(session.handle(stroke()).is_empty());
        assert_eq!(session.eraser_state(), EraserState::MaskDrawn);

        let notices = session.handle(SessionEvent::Erase);
        assert_eq!(notices, vec![Notice::Success(DONE_MESSAGE.to_string())]);
        assert_eq!(session.eraser_state(), EraserState::Inpainted);
        assert_eq!(session.eraser_result().unwrap().dimensions(), (40, 30));

        session.handle(stroke());
        assert_eq!(session.eraser_state(), EraserState::MaskDrawn);
    }

    #[test]
    fn test_erase_without_paint_warns() {
        let mut session = session();
        upload(&mut session, "a.png", 80, 60);

        let notices = session.handle(SessionEvent::Erase);
        assert_eq!(notices, vec![Notice::Warning(EMPTY_MASK_MESSAGE.to_string())]);
        assert_eq!(session.eraser_state(), EraserState::ImageLoaded);
        assert!(session.eraser_result().is_none());
    }

    #[test]
    fn test_events_before_upload_warn() {
        let mut session = session();
        for event in [stroke(), SessionEvent::Erase, SessionEvent::RemoveBackground] {
            let notices = session.handle(event);
            assert_eq!(notices, vec![Notice::Warning(NO_IMAGE_MESSAGE.to_string())]);
        }
        assert_eq!(session.eraser_state(), EraserState::NoImage);
    }

    #[test]
    fn test_new_upload_resets_surface() {
        let mut session = session();
        upload(&mut session, "a.png", 80, 60);
        session.handle(stroke());
        let first_key = session.surface().unwrap().key().to_string();

        upload(&mut session, "b.png", 80, 60);
        let surface = session.surface().unwrap();
        assert_ne!(surface.key(), first_key);
        assert!(surface.is_blank());
        assert!(surface.strokes().is_empty());
        assert!(session.current_mask().unwrap().is_empty());
        assert_eq!(session.eraser_state(), EraserState::ImageLoaded);
    }

    #[test]
    fn test_failed_upload_keeps_prior_state() {
        let mut session = session();
        upload(&mut session, "a.png", 80, 60);
        session.handle(stroke());

        let notices = session.handle(SessionEvent::UploadEraser {
            bytes: b"garbage".to_vec(),
            file_name: "broken.png".to_string(),
        });
        assert!(notices[0].is_error());
        assert_eq!(session.eraser_state(), EraserState::MaskDrawn);
        assert!(!session.surface().unwrap().is_blank());
    }

    #[test]
    fn test_brush_size_bounds() {
        let mut session = session();
        assert_eq!(session.brush_size(), 15);
        assert!(matches!(
            session.handle(SessionEvent::SetBrushSize(51))[0],
            Notice::Warning(_)
        ));
        session.handle(SessionEvent::SetBrushSize(50));
        assert_eq!(session.brush_size(), 50);
    }

    #[test]
    fn test_clear_canvas_returns_to_image_loaded() {
        let mut session = session();
        upload(&mut session, "a.png", 80, 60);
        session.handle(stroke());
        session.handle(SessionEvent::ClearCanvas);
        assert_eq!(session.eraser_state(), EraserState::ImageLoaded);
        assert!(session.surface().unwrap().is_blank());
    }

    #[test]
    fn test_background_flow_reports_done() {
        let mut session = session();
        session.handle(SessionEvent::UploadBackground {
            bytes: png_bytes(64, 48),
            file_name: "cat.png".to_string(),
        });
        assert!(session.background_source().is_some());

        let notices = session.handle(SessionEvent::RemoveBackground);
        assert_eq!(notices, vec![Notice::Success(DONE_MESSAGE.to_string())]);
        assert_eq!(session.background_result().unwrap().dimensions(), (64, 48));
    }

    #[test]
    fn test_background_failure_is_contained() {
        let config = EditorConfig::builder()
            .backend_type(BackendType::Mock)
            .build()
            .unwrap();
        let processor = BackgroundRemovalProcessor::with_backend(
            config.clone(),
            Box::new(MockBackend::failing("model crashed")),
        )
        .unwrap();
        let mut session = EditorSession::with_processor(config, processor);

        session.handle(SessionEvent::UploadBackground {
            bytes: png_bytes(16, 16),
            file_name: "cat.png".to_string(),
        });
        let notices = session.handle(SessionEvent::RemoveBackground);
        assert!(notices[0].is_error());
        assert!(notices[0].message().contains("model crashed"));
        assert!(session.background_result().is_none());
        assert!(session.background_source().is_some());
    }
}
