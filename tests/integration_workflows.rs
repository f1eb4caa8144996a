//! Integration tests for complete editing workflows
//!
//! These tests drive both flows end to end without a segmentation model,
//! using the mock backend's center-weighted mask.

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use magic_photo::{
    config::{Backdrop, EditorConfig, InpaintMethod, OutputFormat},
    display::{display_height, resize_for_display},
    error::Result,
    processor::{BackendType, BackgroundRemovalProcessor},
    services::{ImageIOService, OutputFormatHandler},
    session::{EditorSession, EraserState, Notice, SessionEvent},
    StrokeEvent,
};
use std::io::Cursor;
use tempfile::TempDir;

const BACKGROUND: [u8; 3] = [200, 200, 200];
const OBJECT: [u8; 3] = [30, 20, 90];

/// A plain background with a dark block covering `object` (x0, y0, x1, y1)
fn subject_photo(width: u32, height: u32, object: (u32, u32, u32, u32)) -> RgbImage {
    let (x0, y0, x1, y1) = object;
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb(OBJECT)
        } else {
            Rgb(BACKGROUND)
        }
    })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn mock_config() -> EditorConfig {
    EditorConfig::builder()
        .backend_type(BackendType::Mock)
        .build()
        .unwrap()
}

#[test]
fn test_background_removal_of_opaque_jpeg() -> Result<()> {
    let photo = subject_photo(400, 300, (150, 100, 250, 200));
    let bytes = encode(DynamicImage::ImageRgb8(photo), ImageFormat::Jpeg);

    let mut processor = BackgroundRemovalProcessor::new(mock_config())?;
    let result = processor.process_bytes(&bytes, "subject.jpg")?;

    assert_eq!(result.artifact.file_name, "no_bg.png");
    assert_eq!(result.artifact.mime_type, "image/png");
    assert_eq!(image::guess_format(&result.artifact.bytes)?, ImageFormat::Png);

    let decoded = image::load_from_memory(&result.artifact.bytes)?;
    assert_eq!(decoded.dimensions(), (400, 300));
    assert!(decoded.color().has_alpha());

    let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p[3]).collect();
    let min = alpha.iter().copied().min().unwrap_or(0);
    let max = alpha.iter().copied().max().unwrap_or(0);
    assert_eq!((min, max), (0, 255), "alpha should span the full range");
    assert!(alpha.iter().any(|&a| a > 0 && a < 255), "soft edges expected");
    Ok(())
}

#[tokio::test]
async fn test_background_removal_from_file_and_save() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("portrait.png");
    subject_photo(120, 160, (40, 50, 80, 110)).save(&input)?;

    let mut processor = BackgroundRemovalProcessor::new(mock_config())?;
    let result = processor.process_file(&input).await?;
    assert_eq!(result.dimensions(), (120, 160));
    assert_eq!(result.metadata.input_format, "png");

    let output = temp_dir.path().join("out").join("no_bg.png");
    ImageIOService::write_artifact_async(&result.artifact, &output).await?;
    let saved = image::open(&output)?;
    assert_eq!(saved.dimensions(), (120, 160));
    assert!(saved.color().has_alpha());
    Ok(())
}

#[test]
fn test_erase_painted_square_only_touches_painted_region() {
    // Object at source 125..160 lands at display 109..140 after scaling to 350 wide
    let photo = subject_photo(400, 300, (125, 125, 160, 160));
    let bytes = encode(DynamicImage::ImageRgb8(photo), ImageFormat::Png);

    let mut session = EditorSession::new(mock_config()).unwrap();
    session.handle(SessionEvent::UploadEraser {
        bytes,
        file_name: "room.png".to_string(),
    });
    let display = session.display_image().unwrap().clone();
    assert_eq!(display.dimensions(), (350, 263));

    let brush = session.brush_size();
    session.handle(SessionEvent::Stroke(StrokeEvent::fill_rect(
        100.0, 100.0, 50.0, 50.0, brush,
    )));
    assert_eq!(session.eraser_state(), EraserState::MaskDrawn);

    let mask = session.current_mask().unwrap();
    assert_eq!(mask.dimensions(), display.dimensions());

    let notices = session.handle(SessionEvent::Erase);
    assert_eq!(notices, vec![Notice::Success("Done!".to_string())]);

    let result = session.eraser_result().unwrap();
    assert_eq!(result.dimensions(), display.dimensions());
    assert_eq!(result.artifact.file_name, "erased_photo.jpg");
    assert_eq!(result.artifact.mime_type, "image/jpeg");
    let decoded = image::load_from_memory(&result.artifact.bytes).unwrap();
    assert_eq!(decoded.dimensions(), (350, 263));

    let restored = result.image.to_rgb8();
    let margin = brush / 2 + 1;
    for (x, y, pixel) in restored.enumerate_pixels() {
        let marked = mask.as_image().get_pixel(x, y)[0] != 0;
        if marked {
            assert!(
                (100 - margin..=150 + margin).contains(&x) && (100 - margin..=150 + margin).contains(&y),
                "marked pixel ({x}, {y}) outside the painted square"
            );
            for channel in 0..3 {
                let diff = (i32::from(pixel[channel]) - i32::from(BACKGROUND[channel])).abs();
                assert!(diff <= 4, "object still visible at ({x}, {y}): {pixel:?}");
            }
        } else {
            assert_eq!(pixel, display.image.get_pixel(x, y), "unmarked pixel ({x}, {y}) changed");
        }
    }
}

#[test]
fn test_diffusion_erase_through_session() {
    let config = EditorConfig::builder()
        .backend_type(BackendType::Mock)
        .inpaint_method(InpaintMethod::Diffusion)
        .display_width(120)
        .build()
        .unwrap();
    let mut session = EditorSession::new(config).unwrap();
    let photo = subject_photo(240, 180, (100, 70, 140, 110));
    session.handle(SessionEvent::UploadEraser {
        bytes: encode(DynamicImage::ImageRgb8(photo), ImageFormat::Png),
        file_name: "shelf.png".to_string(),
    });
    session.handle(SessionEvent::Stroke(StrokeEvent::fill_rect(45.0, 30.0, 30.0, 30.0, 10)));

    session.handle(SessionEvent::Erase);
    let result = session.eraser_result().unwrap();
    assert_eq!(result.metadata.engine, "diffusion");

    let center = result.image.to_rgb8().get_pixel(60, 45).0;
    for (value, expected) in center.iter().zip(BACKGROUND) {
        assert!((i32::from(*value) - i32::from(expected)).abs() <= 4);
    }
}

#[test]
fn test_new_upload_resets_drawing_surface() {
    let mut session = EditorSession::new(mock_config()).unwrap();
    let upload = |name: &str, width: u32| SessionEvent::UploadEraser {
        bytes: encode(
            DynamicImage::ImageRgb8(subject_photo(width, 300, (0, 0, 10, 10))),
            ImageFormat::Png,
        ),
        file_name: name.to_string(),
    };

    session.handle(upload("a.png", 400));
    session.handle(SessionEvent::Stroke(StrokeEvent::new(vec![(20.0, 20.0), (80.0, 60.0)], 15)));
    let key_a = session.surface().unwrap().key().to_string();
    assert!(!session.current_mask().unwrap().is_empty());

    session.handle(upload("b.png", 500));
    let surface = session.surface().unwrap();
    assert_ne!(surface.key(), key_a);
    assert!(surface.is_blank());
    assert!(surface.strokes().is_empty());
    assert_eq!(surface.dimensions(), (350, 210));
    assert!(session.current_mask().unwrap().is_empty());
    assert_eq!(session.eraser_state(), EraserState::ImageLoaded);
    assert!(session.eraser_result().is_none());
}

#[test]
fn test_display_resize_keeps_aspect_ratio_and_mask_size() {
    let cases = [
        ((400, 300), 263),
        ((350, 350), 350),
        ((1000, 10), 4),
        ((3000, 1), 1),
        ((100, 600), 2100),
        ((701, 333), 166),
    ];

    for ((width, height), expected) in cases {
        assert_eq!(display_height((width, height), 350).unwrap(), expected);

        let mut session = EditorSession::new(mock_config()).unwrap();
        session.handle(SessionEvent::UploadEraser {
            bytes: encode(
                DynamicImage::ImageRgb8(RgbImage::new(width, height)),
                ImageFormat::Png,
            ),
            file_name: format!("{width}x{height}.png"),
        });
        let display = session.display_image().unwrap();
        assert_eq!(display.dimensions(), (350, expected));
        assert_eq!(display.source_dimensions, (width, height));
        assert_eq!(
            session.current_mask().unwrap().dimensions(),
            display.dimensions()
        );
    }

    let direct = resize_for_display(&RgbImage::new(400, 300), 350).unwrap();
    assert_eq!(direct.dimensions(), (350, 263));
}

#[test]
fn test_transparent_upload_uses_backdrop() {
    let rgba = RgbaImage::from_pixel(200, 100, Rgba([10, 200, 10, 0]));
    let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

    for (backdrop, expected) in [
        (Backdrop::White, [255, 255, 255]),
        (Backdrop::Black, [0, 0, 0]),
        (Backdrop::Color([0, 0, 255]), [0, 0, 255]),
    ] {
        let config = EditorConfig::builder()
            .backend_type(BackendType::Mock)
            .backdrop(backdrop)
            .build()
            .unwrap();
        let mut session = EditorSession::new(config).unwrap();
        session.handle(SessionEvent::UploadEraser {
            bytes: bytes.clone(),
            file_name: "sticker.png".to_string(),
        });
        let display = session.display_image().unwrap();
        assert_eq!(display.image.get_pixel(175, 50).0, expected);
    }
}

#[test]
fn test_png_round_trip_is_lossless_and_jpeg_keeps_dimensions() -> Result<()> {
    let mut rgba = RgbaImage::new(31, 17);
    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        *pixel = Rgba([(x * 8) as u8, (y * 15) as u8, 77, ((x + y) * 5) as u8]);
    }
    let image = DynamicImage::ImageRgba8(rgba.clone());

    let png = OutputFormatHandler::to_artifact(&image, OutputFormat::Png, 100, "no_bg.png")?;
    assert_eq!(image::load_from_memory(&png.bytes)?.to_rgba8(), rgba);

    let jpeg = OutputFormatHandler::to_artifact(&image, OutputFormat::Jpeg, 75, "erased_photo.jpg")?;
    let decoded = image::load_from_memory(&jpeg.bytes)?;
    assert_eq!(decoded.dimensions(), (31, 17));
    assert!(!decoded.color().has_alpha());
    Ok(())
}

#[test]
fn test_background_and_eraser_tabs_are_independent() {
    let mut session = EditorSession::new(mock_config()).unwrap();
    let bytes = encode(
        DynamicImage::ImageRgb8(subject_photo(80, 60, (30, 20, 50, 40))),
        ImageFormat::Jpeg,
    );

    session.handle(SessionEvent::UploadBackground {
        bytes: bytes.clone(),
        file_name: "cat.jpg".to_string(),
    });
    assert_eq!(session.eraser_state(), EraserState::NoImage);

    session.handle(SessionEvent::RemoveBackground);
    assert!(session.background_result().is_some());

    session.handle(SessionEvent::UploadEraser {
        bytes,
        file_name: "cat.jpg".to_string(),
    });
    assert_eq!(session.eraser_state(), EraserState::ImageLoaded);
    assert!(session.background_result().is_some());
}
