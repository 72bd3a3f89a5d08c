//! Collaborator traits for the host's raster surface.
//!
//! The core never touches pixels directly; it measures through
//! [`TextMeasure`] and draws through [`RasterSurface`]. The layout engine
//! depends only on `TextMeasure`, which keeps it pure and trivially mockable.

use crate::error::SurfaceError;
use crate::config::Argb;

/// Vertical metrics for a single text line at a given font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from baseline to the top of the tallest glyph, positive.
    pub ascent: f32,
    /// Distance from baseline to the bottom of the lowest glyph, positive.
    pub descent: f32,
    /// Recommended baseline-to-baseline advance.
    pub line_spacing: f32,
}

impl LineMetrics {
    /// The full ascent-to-descent span of one line.
    pub fn span(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// Text measurement, in the surface's pixel space.
///
/// Font sizes are logical units; implementations scale them to device pixels
/// internally (the surface owns the density factor).
pub trait TextMeasure {
    /// Measures the advance width of `text` at the given logical font size.
    fn measure_text(&self, text: &str, font_size: u32) -> f32;

    /// Returns line metrics at the given logical font size.
    fn line_metrics(&self, font_size: u32) -> LineMetrics;
}

/// An abstract 2D raster surface the watermark is composited onto.
///
/// Rotation is scoped: a `push_rotation`/`pop_rotation` pair brackets the
/// drawing of one tile, mirroring a canvas save/restore. Implementations must
/// tolerate unbalanced pops (treat as no-op).
pub trait RasterSurface: TextMeasure {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Resets the surface to its base contents.
    ///
    /// For a dedicated overlay surface the base is fully transparent; a
    /// compositing surface restores its source image instead.
    fn clear(&mut self) -> Result<(), SurfaceError>;

    /// Begins drawing rotated by `degrees` about `(pivot_x, pivot_y)`.
    fn push_rotation(&mut self, degrees: f32, pivot_x: f32, pivot_y: f32);

    /// Ends the innermost rotation scope.
    fn pop_rotation(&mut self);

    /// Draws one line of text with its baseline at `(x, y)`.
    fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        color: Argb,
        font_size: u32,
    ) -> Result<(), SurfaceError>;
}
