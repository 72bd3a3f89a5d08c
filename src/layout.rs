//! The tiling/layout engine.
//!
//! [`plan`] is a pure function from canvas size + config + font metrics to a
//! sequence of draw commands. It holds no state and never fails; anything
//! that can go wrong (drawing, measurement backends) is the surface's
//! problem and is reported at the paint boundary.
//!
//! # Grid derivation
//!
//! Spacing distributes the canvas space left over after the requested tile
//! counts, with one gap before and after every tile including the edges:
//! `gap = (canvas − tile_extent × count) / (count + 1)`. When the text is
//! larger than the canvas the gap floors at 1.0 and tiles overlap rather
//! than erroring; dense configurations are the caller's choice.
//!
//! The first row's baseline starts at `row_gap × 3` while columns start at
//! `column_gap × 1`. The asymmetry is load-bearing: downstream visuals are
//! tuned to the lower first row, so it stays.

use crate::config::{DEFAULT_COLUMN_COUNT, DEFAULT_ROW_COUNT, WatermarkConfig};
use crate::surface::TextMeasure;

/// Fixed vertical gap between stacked label lines inside one tile, in pixels.
pub const LINE_GAP: f32 = 64.0;

/// Minimum gap between tiles; overflowing layouts clamp here and overlap.
const GAP_FLOOR: f32 = 1.0;

// ============================================================================
// Draw commands
// ============================================================================

/// One positioned, rotated instance of the full label stack.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTextBlock {
    /// Baseline origin of the first label line.
    pub origin_x: f32,
    pub origin_y: f32,

    /// Rotation applied to the whole block, degrees, signed.
    pub rotation_degree: i32,

    /// Rotation pivot. Always the block's own grid point, not its center.
    pub pivot: (f32, f32),

    /// Label lines, stacked vertically with [`LINE_GAP`] between baselines.
    pub lines: Vec<String>,
}

/// A single layout step for the surface to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Fully erase the surface; emitted alone when the config has no labels.
    Clear,
    /// Draw one tile.
    Tile(PlacedTextBlock),
}

// ============================================================================
// plan
// ============================================================================

/// Computes the tile grid for one config on a canvas of the given size.
///
/// Empty labels produce exactly `[DrawCommand::Clear]`. Otherwise the result
/// is one [`DrawCommand::Tile`] per grid point, in row-major order.
pub fn plan(
    canvas_width: f32,
    canvas_height: f32,
    config: &WatermarkConfig,
    measure: &dyn TextMeasure,
) -> Vec<DrawCommand> {
    if config.labels.is_empty() {
        return vec![DrawCommand::Clear];
    }

    let row_count = normalize(config.row_count, DEFAULT_ROW_COUNT);
    let column_count = normalize(config.column_count, DEFAULT_COLUMN_COUNT);

    let text_width = config
        .labels
        .iter()
        .map(|label| measure.measure_text(label, config.font_size))
        .fold(0.0f32, f32::max)
        .max(1.0);

    let metrics = measure.line_metrics(config.font_size);
    let line_count = config.labels.len();
    let text_height = (metrics.span() + (line_count - 1) as f32 * LINE_GAP).max(1.0);

    let row_gap = config
        .row_gap
        .unwrap_or_else(|| {
            (canvas_height - text_height * row_count as f32) / (row_count + 1) as f32
        })
        .max(GAP_FLOOR);

    let column_gap = config
        .column_gap
        .unwrap_or_else(|| {
            (canvas_width - text_width * column_count as f32) / (column_count + 1) as f32
        })
        .max(GAP_FLOOR);

    let mut commands = Vec::new();

    // First baseline sits three gaps down; see the module docs.
    let mut y = row_gap * 3.0;
    while y <= canvas_height {
        let mut x = column_gap;
        while x < canvas_width {
            commands.push(DrawCommand::Tile(PlacedTextBlock {
                origin_x: x,
                origin_y: y,
                rotation_degree: config.degree,
                pivot: (x, y),
                lines: config.labels.clone(),
            }));
            x += text_width + column_gap;
        }
        y += text_height + row_gap;
    }

    commands
}

fn normalize(count: i32, default: i32) -> i32 {
    if count <= 0 { default } else { count }
}

// ============================================================================
// Tests
// ============================================================================
