//! Bitmap-backed raster surface.
//!
//! This module provides [`BitmapSurface`], an [`image`]-backed
//! implementation of [`RasterSurface`] that rasterizes glyphs with
//! [`fontdue`]. It backs the static-bitmap watermark path and is the
//! reference implementation hosts can crib from for their own surfaces.
//!
//! # Feature Flag
//!
//! Only available with the `bitmap` feature (on by default):
//!
//! ```toml
//! [dependencies]
//! tilemark = { version = "0.1", features = ["bitmap"] }
//! ```

use std::sync::Arc;

use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};

use crate::config::Argb;
use crate::error::SurfaceError;
use crate::surface::{LineMetrics, RasterSurface, TextMeasure};

// ============================================================================
// TileFont
// ============================================================================

/// A parsed font plus the logical-to-device pixel density factor.
///
/// Cheap to clone; the parsed font is shared.
#[derive(Clone)]
pub struct TileFont {
    font: Arc<Font>,
    scale: f32,
}

impl TileFont {
    /// Parses a font from raw TTF/OTF bytes at density 1.0.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SurfaceError> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| SurfaceError::Font(e.to_string()))?;
        Ok(Self {
            font: Arc::new(font),
            scale: 1.0,
        })
    }

    /// Sets the display density factor (e.g. 2.0 for a 2x display).
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Logical font units to device pixels, rounded the way platform
    /// density scalers do.
    fn px(&self, font_size: u32) -> f32 {
        (self.scale * font_size as f32 + 0.5).floor().max(1.0)
    }
}

// ============================================================================
// Rotation scope
// ============================================================================

/// One active rotation scope: precomputed sin/cos about a pivot.
#[derive(Debug, Clone, Copy)]
struct Rotation {
    sin: f32,
    cos: f32,
    pivot_x: f32,
    pivot_y: f32,
}

impl Rotation {
    fn new(degrees: f32, pivot_x: f32, pivot_y: f32) -> Self {
        let radians = degrees.to_radians();
        Self {
            sin: radians.sin(),
            cos: radians.cos(),
            pivot_x,
            pivot_y,
        }
    }

    /// Rotates a point about the pivot. Positive degrees turn clockwise in
    /// y-down raster coordinates, matching canvas rotation semantics.
    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let dx = x - self.pivot_x;
        let dy = y - self.pivot_y;
        (
            self.pivot_x + dx * self.cos - dy * self.sin,
            self.pivot_y + dx * self.sin + dy * self.cos,
        )
    }
}

// ============================================================================
// BitmapSurface
// ============================================================================

/// An RGBA bitmap implementing the watermark surface contract.
///
/// `clear` restores the surface to its base contents: transparent for a
/// standalone overlay, the source image for a compositing surface built
/// with [`over`](Self::over).
pub struct BitmapSurface {
    base: RgbaImage,
    pixels: RgbaImage,
    font: TileFont,
    rotations: Vec<Rotation>,
}

impl BitmapSurface {
    /// A fully transparent overlay surface.
    pub fn transparent(width: u32, height: u32, font: TileFont) -> Self {
        let base = RgbaImage::new(width, height);
        Self {
            pixels: base.clone(),
            base,
            font,
            rotations: Vec::new(),
        }
    }

    /// A compositing surface whose base contents are `source`; the
    /// watermark is drawn over the source pixels.
    pub fn over(source: RgbaImage, font: TileFont) -> Self {
        Self {
            pixels: source.clone(),
            base: source,
            font,
            rotations: Vec::new(),
        }
    }

    /// Consumes the surface, returning the composited bitmap.
    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Maps a point through the active rotation scopes, innermost last.
    fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        self.rotations
            .iter()
            .fold((x, y), |(px, py), rotation| rotation.apply(px, py))
    }

    fn blend_pixel(&mut self, x: i64, y: i64, r: u8, g: u8, b: u8, alpha: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.pixels.width()) || y >= i64::from(self.pixels.height())
        {
            return;
        }
        let pixel = self.pixels.get_pixel_mut(x as u32, y as u32);
        *pixel = blend_over(*pixel, r, g, b, alpha);
    }
}

/// Source-over blend of a colored coverage sample onto a pixel.
fn blend_over(dst: Rgba<u8>, r: u8, g: u8, b: u8, alpha: f32) -> Rgba<u8> {
    let sa = alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |src: u8, dst: u8| -> u8 {
        let s = f32::from(src) / 255.0;
        let d = f32::from(dst) / 255.0;
        let out = (s * sa + d * da * (1.0 - sa)) / out_a;
        (out * 255.0 + 0.5) as u8
    };

    Rgba([
        channel(r, dst[0]),
        channel(g, dst[1]),
        channel(b, dst[2]),
        (out_a * 255.0 + 0.5) as u8,
    ])
}

impl TextMeasure for BitmapSurface {
    fn measure_text(&self, text: &str, font_size: u32) -> f32 {
        let px = self.font.px(font_size);
        text.chars()
            .map(|ch| self.font.font.metrics(ch, px).advance_width)
            .sum()
    }

    fn line_metrics(&self, font_size: u32) -> LineMetrics {
        let px = self.font.px(font_size);
        match self.font.font.horizontal_line_metrics(px) {
            Some(metrics) => LineMetrics {
                ascent: metrics.ascent,
                // fontdue reports descent as a negative offset from baseline
                descent: -metrics.descent,
                line_spacing: metrics.new_line_size,
            },
            None => LineMetrics {
                ascent: px * 0.8,
                descent: px * 0.2,
                line_spacing: px * 1.2,
            },
        }
    }
}

impl RasterSurface for BitmapSurface {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn clear(&mut self) -> Result<(), SurfaceError> {
        self.pixels = self.base.clone();
        Ok(())
    }

    fn push_rotation(&mut self, degrees: f32, pivot_x: f32, pivot_y: f32) {
        self.rotations.push(Rotation::new(degrees, pivot_x, pivot_y));
    }

    fn pop_rotation(&mut self) {
        self.rotations.pop();
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        color: Argb,
        font_size: u32,
    ) -> Result<(), SurfaceError> {
        let (a, r, g, b) = color.channels();
        if a == 0 {
            return Ok(());
        }
        let text_alpha = f32::from(a) / 255.0;
        let px_size = self.font.px(font_size);

        let mut pen_x = x;
        for ch in text.chars() {
            let (metrics, coverage) = self.font.font.rasterize(ch, px_size);

            // Glyph bitmap top-left in surface space: fontdue's ymin is the
            // bitmap bottom's offset from the baseline.
            let left = pen_x + metrics.xmin as f32;
            let top = y - metrics.ymin as f32 - metrics.height as f32;

            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let cov = coverage[row * metrics.width + col];
                    if cov == 0 {
                        continue;
                    }
                    let (fx, fy) =
                        self.map_point(left + col as f32 + 0.5, top + row as f32 + 0.5);
                    let alpha = text_alpha * f32::from(cov) / 255.0;
                    self.blend_pixel(fx.round() as i64, fy.round() as i64, r, g, b, alpha);
                }
            }

            pen_x += metrics.advance_width;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
