//! Paintable watermark layers.
//!
//! A [`Marker`] is one drawing surface's worth of watermark: it is bound to
//! the shared config slots (not a copy), re-runs the layout engine against
//! the current slot contents on every paint, and reports the combined result
//! through a one-shot completion callback gated by a tri-state
//! [`PaintState`].
//!
//! A [`MarkerStack`] is the overlay container attached to one target. Its
//! layering policy depends on the host's high-contrast-text capability: when
//! that mode is on, per-surface opacity is the only remaining way to keep
//! the overlay unobtrusive (the host overrides text color and alpha), so the
//! stack switches from one combined marker to one marker per slot with
//! progressively smaller opacity.

use std::sync::Arc;

use crate::config::{Argb, SharedSlots, WatermarkConfig};
use crate::layout::{self, DrawCommand, LINE_GAP, PlacedTextBlock};
use crate::surface::RasterSurface;

/// Opacity of the first per-slot marker in high-contrast mode; slot `i`
/// paints at `BASE_OPACITY / (i + 1)`.
pub const BASE_OPACITY: f32 = 0.03;

// ============================================================================
// PaintState
// ============================================================================

/// The cached result of a marker's most recent paint.
///
/// `Unknown` means "configuration changed, result not yet reported": the
/// next paint fires the completion callback exactly once, then the state
/// settles on `Success`/`Failure` and suppresses further firing until the
/// next invalidation resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintState {
    #[default]
    Unknown,
    Success,
    Failure,
}

impl PaintState {
    /// Records a paint result. Returns true if the completion callback
    /// should fire (only on the first paint after a reset).
    pub fn on_paint(&mut self, ok: bool) -> bool {
        let fire = matches!(self, PaintState::Unknown);
        *self = if ok {
            PaintState::Success
        } else {
            PaintState::Failure
        };
        fire
    }

    /// Resets to `Unknown`, re-arming the callback.
    pub fn reset(&mut self) {
        *self = PaintState::Unknown;
    }
}

// ============================================================================
// Marker
// ============================================================================

/// Callback invoked once per invalidation cycle with the combined paint result.
pub type PaintCallback = Box<dyn Fn(bool)>;

/// Which shared slots a marker paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotBinding {
    /// All slots composited onto one surface, in slot order.
    All,
    /// A single slot, for the per-slot high-contrast layering.
    Single(usize),
}

/// One paintable watermark surface bound to the shared slot list.
pub struct Marker {
    slots: Arc<SharedSlots>,
    binding: SlotBinding,
    opacity: f32,
    state: PaintState,
    completion: Option<PaintCallback>,
}

impl Marker {
    /// A marker compositing every slot at full opacity.
    pub(crate) fn combined(slots: Arc<SharedSlots>) -> Self {
        Self {
            slots,
            binding: SlotBinding::All,
            opacity: 1.0,
            state: PaintState::Unknown,
            completion: None,
        }
    }

    /// A marker for a single slot at a fixed opacity.
    pub(crate) fn for_slot(slots: Arc<SharedSlots>, index: usize, opacity: f32) -> Self {
        Self {
            slots,
            binding: SlotBinding::Single(index),
            opacity,
            state: PaintState::Unknown,
            completion: None,
        }
    }

    pub fn state(&self) -> PaintState {
        self.state
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Sets the one-shot completion callback.
    pub fn set_completion(&mut self, callback: PaintCallback) {
        self.completion = Some(callback);
    }

    /// Marks the cached result unknown; the next paint reports again.
    pub fn invalidate(&mut self) {
        self.state.reset();
    }

    /// Paints this marker's bound slots onto `surface`.
    ///
    /// The surface is expected to already be reset for this pass (the stack
    /// clears once up front); this only draws tiles. Per-slot results are
    /// combined with logical AND.
    pub fn paint<S: RasterSurface>(&mut self, surface: &mut S) -> bool {
        let configs = match self.binding {
            SlotBinding::All => self.slots.snapshot(),
            SlotBinding::Single(index) => self.slots.get(index).into_iter().collect(),
        };

        let mut ok = true;
        for config in &configs {
            ok &= draw_config(surface, config, self.opacity);
        }

        if self.state.on_paint(ok) {
            if let Some(callback) = &self.completion {
                callback(ok);
            }
        }
        ok
    }
}

// ============================================================================
// MarkerStack
// ============================================================================

/// Layering policy for a target's overlay container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerMode {
    /// All slots composited onto a single surface.
    Combined,
    /// One surface per slot with decreasing fixed opacity; used when the
    /// host's high-contrast-text mode defeats color/alpha control.
    PerSlot,
}

/// The overlay container attached to one target.
pub struct MarkerStack {
    mode: LayerMode,
    markers: Vec<Marker>,
}

impl MarkerStack {
    /// Builds the stack for the given layering mode.
    pub fn new(slots: &Arc<SharedSlots>, mode: LayerMode) -> Self {
        let markers = match mode {
            LayerMode::Combined => vec![Marker::combined(Arc::clone(slots))],
            LayerMode::PerSlot => (0..slots.len())
                .map(|i| Marker::for_slot(Arc::clone(slots), i, BASE_OPACITY / (i + 1) as f32))
                .collect(),
        };
        Self { mode, markers }
    }

    pub fn mode(&self) -> LayerMode {
        self.mode
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut [Marker] {
        &mut self.markers
    }

    /// Resets every marker's cached result to unknown.
    pub fn invalidate(&mut self) {
        for marker in &mut self.markers {
            marker.invalidate();
        }
    }

    /// One full draw pass: reset the surface once, then paint every marker
    /// in slot order on top.
    pub fn paint<S: RasterSurface>(&mut self, surface: &mut S) -> bool {
        let mut ok = match surface.clear() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("watermark surface reset failed: {err}");
                false
            }
        };
        for marker in &mut self.markers {
            ok &= marker.paint(surface);
        }
        ok
    }
}

// ============================================================================
// Draw execution
// ============================================================================

/// Lays out and draws one config onto a surface.
///
/// Any surface error is logged and folded into the boolean result; nothing
/// escapes the paint path. The `Clear` command is a no-op here because the
/// pass-level reset already happened.
pub(crate) fn draw_config<S: RasterSurface>(
    surface: &mut S,
    config: &WatermarkConfig,
    opacity: f32,
) -> bool {
    let color = config.paint_color.with_opacity(opacity);
    let commands = layout::plan(
        surface.width() as f32,
        surface.height() as f32,
        config,
        surface,
    );

    for command in &commands {
        match command {
            DrawCommand::Clear => {}
            DrawCommand::Tile(block) => {
                if let Err(err) = draw_block(surface, block, color, config.font_size) {
                    tracing::warn!("watermark tile draw failed: {err}");
                    return false;
                }
            }
        }
    }
    true
}

fn draw_block<S: RasterSurface>(
    surface: &mut S,
    block: &PlacedTextBlock,
    color: Argb,
    font_size: u32,
) -> Result<(), crate::error::SurfaceError> {
    surface.push_rotation(block.rotation_degree as f32, block.pivot.0, block.pivot.1);

    let mut y = block.origin_y;
    for line in &block.lines {
        let result = surface.draw_text(line, block.origin_x, y, color, font_size);
        if result.is_err() {
            surface.pop_rotation();
            return result;
        }
        y += LINE_GAP;
    }

    surface.pop_rotation();
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
