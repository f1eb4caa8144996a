//! Freehand drawing surface for authoring paint masks
//!
//! A [`DrawingSurface`] is bound to one display image through an identity
//! key and its dimensions. Front ends feed it [`StrokeEvent`]s; strokes are
//! rasterized as round-capped polylines into an RGBA paint buffer whose
//! alpha channel becomes the [`PaintMask`].

use crate::{
    config::{MAX_BRUSH_SIZE, MIN_BRUSH_SIZE},
    error::{PhotoEditError, Result},
    types::PaintMask,
};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

/// Stroke color of the eraser brush (`#ff0000`, opaque)
pub const STROKE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// One freehand stroke in display coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeEvent {
    /// Polyline vertices as `(x, y)`; a single point paints a dot
    pub points: Vec<(f32, f32)>,
    /// Brush diameter in pixels (1-50)
    pub brush_size: u32,
}

impl StrokeEvent {
    #[must_use]
    pub fn new(points: Vec<(f32, f32)>, brush_size: u32) -> Self {
        Self { points, brush_size }
    }

    /// Closed polyline around the rectangle `(x, y, width, height)`, filled by a zigzag
    ///
    /// Handy for scripted sessions and tests that need to cover a block.
    #[must_use]
    pub fn fill_rect(x: f32, y: f32, width: f32, height: f32, brush_size: u32) -> Self {
        let step = (brush_size.max(1) as f32 / 2.0).max(1.0);
        let mut points = Vec::new();
        let mut row = y;
        let mut left_to_right = true;
        while row <= y + height {
            if left_to_right {
                points.push((x, row));
                points.push((x + width, row));
            } else {
                points.push((x + width, row));
                points.push((x, row));
            }
            left_to_right = !left_to_right;
            row += step;
        }
        points.push((x, y + height));
        points.push((x + width, y + height));
        Self::new(points, brush_size)
    }

    /// Check the brush bounds and that every coordinate is finite
    ///
    /// # Errors
    /// - Brush size outside 1-50
    /// - NaN or infinite coordinates
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&self.brush_size) {
            return Err(PhotoEditError::config_value_error(
                "brush size",
                self.brush_size,
                "1-50",
                None,
            ));
        }
        if self
            .points
            .iter()
            .any(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(PhotoEditError::invalid_config(
                "Stroke contains non-finite coordinates",
            ));
        }
        Ok(())
    }
}

/// Paint buffer plus the strokes applied to it
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    key: String,
    paint: RgbaImage,
    strokes: Vec<StrokeEvent>,
}

impl DrawingSurface {
    /// Fresh, fully transparent surface
    #[must_use]
    pub fn new(key: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            key: key.into(),
            paint: RgbaImage::new(width, height),
            strokes: Vec::new(),
        }
    }

    /// Identity key of the image this surface belongs to
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.paint.dimensions()
    }

    #[must_use]
    pub fn strokes(&self) -> &[StrokeEvent] {
        &self.strokes
    }

    #[must_use]
    pub fn paint_buffer(&self) -> &RgbaImage {
        &self.paint
    }

    /// Rasterize a stroke into the paint buffer
    ///
    /// Parts of the stroke outside the surface are clipped. The brush paints
    /// `2 * ((brush_size - 1) / 2) + 1` pixels across, so a dot never exceeds the
    /// requested size and even sizes come out one pixel narrower.
    ///
    /// # Errors
    /// - Invalid brush size or coordinates; the surface is left untouched
    pub fn apply(&mut self, stroke: &StrokeEvent) -> Result<()> {
        stroke.validate()?;

        let radius = (stroke.brush_size.saturating_sub(1) / 2) as i32;
        match stroke.points.as_slice() {
            [] => {},
            [point] => stamp(&mut self.paint, *point, radius),
            points => {
                for segment in points.windows(2) {
                    stamp_segment(&mut self.paint, segment[0], segment[1], radius);
                }
            },
        }

        self.strokes.push(stroke.clone());
        Ok(())
    }

    /// Paint every marked pixel of an existing mask onto the surface
    ///
    /// # Errors
    /// - Mask size differs from the surface
    pub fn apply_mask(&mut self, mask: &PaintMask) -> Result<()> {
        mask.ensure_matches(self.dimensions())?;
        for (pixel, value) in self.paint.pixels_mut().zip(mask.as_image().pixels()) {
            if value[0] != 0 {
                *pixel = STROKE_COLOR;
            }
        }
        Ok(())
    }

    /// Remove all paint
    pub fn clear(&mut self) {
        let (width, height) = self.dimensions();
        self.paint = RgbaImage::new(width, height);
        self.strokes.clear();
    }

    /// Mask from the alpha channel of the paint buffer; any non-zero alpha is marked
    #[must_use]
    pub fn extract_mask(&self) -> PaintMask {
        let (width, height) = self.dimensions();
        let mask = image::GrayImage::from_fn(width, height, |x, y| {
            let alpha = self.paint.get_pixel(x, y)[3];
            image::Luma([if alpha == 0 { 0 } else { 255 }])
        });
        PaintMask::from_image(mask)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.paint.pixels().all(|p| p[3] == 0)
    }
}

fn stamp(paint: &mut RgbaImage, (x, y): (f32, f32), radius: i32) {
    // Far off-canvas points cannot touch the buffer and would overflow i32
    let limit = (paint.width().max(paint.height()) as f32) + radius as f32 + 1.0;
    if x < -limit || y < -limit || x > limit || y > limit {
        return;
    }
    draw_filled_circle_mut(paint, (x.round() as i32, y.round() as i32), radius, STROKE_COLOR);
}

fn stamp_segment(paint: &mut RgbaImage, from: (f32, f32), to: (f32, f32), radius: i32) {
    let margin = radius as f32 + 1.0;
    let bounds = (
        (-margin, -margin),
        (paint.width() as f32 + margin, paint.height() as f32 + margin),
    );
    let Some((from, to)) = clip_segment(from, to, bounds) else {
        return;
    };

    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = dx.hypot(dy);
    let steps = length.ceil().max(1.0) as u32;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        stamp(paint, (from.0 + dx * t, from.1 + dy * t), radius);
    }
}

/// Liang-Barsky clipping of a segment against an axis aligned box
fn clip_segment(
    from: (f32, f32),
    to: (f32, f32),
    (min, max): ((f32, f32), (f32, f32)),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let mut t0 = 0.0_f32;
    let mut t1 = 1.0_f32;

    for (p, q) in [
        (-dx, from.0 - min.0),
        (dx, max.0 - from.0),
        (-dy, from.1 - min.1),
        (dy, max.1 - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }

    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}
