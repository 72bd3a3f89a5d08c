//! Watermark configuration values and the shared slot set.
//!
//! A [`WatermarkConfig`] describes one overlay layer: its labels, rotation,
//! font size, color and grid density. The registry owns a fixed number of
//! canonical configs (the "slots"); every marker reads those same slots
//! through a shared handle, so refreshing slot fields in place is visible to
//! all bound surfaces without re-binding.
//!
//! Configs serialize to camelCase JSON so a host can ship watermark settings
//! between processes:
//!
//! ```
//! use tilemark::WatermarkConfig;
//!
//! let config = WatermarkConfig::new(vec!["ACME Corp".into(), "user 1024".into()]);
//! let json = config.to_json().unwrap();
//! let restored = WatermarkConfig::from_json(&json).unwrap();
//! assert_eq!(restored.labels, config.labels);
//! ```

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Number of canonical config slots owned by the registry.
///
/// Two layers: one typically visible, one typically near-invisible.
pub const SLOT_COUNT: usize = 2;

/// Row count used when a config carries a count ≤ 0.
pub const DEFAULT_ROW_COUNT: i32 = 8;

/// Column count used when a config carries a count ≤ 0.
pub const DEFAULT_COLUMN_COUNT: i32 = 3;

// ============================================================================
// Argb
// ============================================================================

/// A packed 32-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

impl Argb {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self(0);

    /// Creates a color from individual channels.
    pub fn from_channels(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(u32::from(a) << 24 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b))
    }

    /// Unpacks into `(a, r, g, b)` channels.
    pub fn channels(self) -> (u8, u8, u8, u8) {
        (
            (self.0 >> 24) as u8,
            (self.0 >> 16) as u8,
            (self.0 >> 8) as u8,
            self.0 as u8,
        )
    }

    /// Returns this color with its alpha scaled by `factor` (clamped 0.0-1.0).
    pub fn with_opacity(self, factor: f32) -> Self {
        let (a, r, g, b) = self.channels();
        let scaled = (f32::from(a) * factor.clamp(0.0, 1.0) + 0.5) as u8;
        Self::from_channels(scaled, r, g, b)
    }
}

// ============================================================================
// WatermarkConfig
// ============================================================================

/// Parameters for one watermark overlay layer.
///
/// An empty `labels` list is a sentinel meaning "no visible content, the
/// surface must be fully cleared", which is distinct from "not configured".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkConfig {
    /// Watermark text lines, in display order. Empty means "clear".
    #[serde(default)]
    pub labels: Vec<String>,

    /// Rotation in degrees, signed. Applied about each tile's grid point.
    pub degree: i32,

    /// Font size in logical units; the surface scales to device pixels.
    pub font_size: u32,

    /// Text color, packed ARGB.
    pub paint_color: Argb,

    /// Number of tile rows. Values ≤ 0 normalize to 8.
    pub row_count: i32,

    /// Number of tile columns. Values ≤ 0 normalize to 3.
    pub column_count: i32,

    /// Explicit row gap in pixels. When absent, derived from canvas height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_gap: Option<f32>,

    /// Explicit column gap in pixels. When absent, derived from canvas width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_gap: Option<f32>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            degree: -30,
            font_size: 14,
            // "#0D31456A"
            paint_color: Argb(0x0D31_456A),
            row_count: DEFAULT_ROW_COUNT,
            column_count: DEFAULT_COLUMN_COUNT,
            row_gap: None,
            column_gap: None,
        }
    }
}

impl WatermarkConfig {
    /// Creates a config with the given labels and default styling.
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    /// Sets the rotation angle in degrees.
    pub fn with_degree(mut self, degree: i32) -> Self {
        self.degree = degree;
        self
    }

    /// Sets the logical font size.
    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }

    /// Sets the text color.
    pub fn with_color(mut self, color: Argb) -> Self {
        self.paint_color = color;
        self
    }

    /// Sets the tile grid density.
    pub fn with_grid(mut self, row_count: i32, column_count: i32) -> Self {
        self.row_count = row_count;
        self.column_count = column_count;
        self
    }

    /// Sets explicit row/column gaps in pixels.
    pub fn with_gaps(mut self, row_gap: f32, column_gap: f32) -> Self {
        self.row_gap = Some(row_gap);
        self.column_gap = Some(column_gap);
        self
    }

    /// Returns true if this config would draw nothing (the "clear" sentinel).
    pub fn is_clear(&self) -> bool {
        self.labels.is_empty()
    }

    /// Copies every field of `other` into `self`, in place.
    ///
    /// This is the refresh primitive: slot objects are never replaced, only
    /// overwritten, so surfaces holding the shared slot handle observe the
    /// update without re-binding.
    pub fn copy_from(&mut self, other: &WatermarkConfig) {
        self.labels = other.labels.clone();
        self.degree = other.degree;
        self.font_size = other.font_size;
        self.paint_color = other.paint_color;
        self.row_count = other.row_count;
        self.column_count = other.column_count;
        self.row_gap = other.row_gap;
        self.column_gap = other.column_gap;
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// SharedSlots
// ============================================================================

/// The canonical shared config slots.
///
/// Created once by the registry and handed to every marker as an
/// `Arc<SharedSlots>`. All mutation funnels through the registry's refresh;
/// paint-time reads take the read lock and see a consistent snapshot. On a
/// single-threaded host the lock is uncontended.
#[derive(Debug)]
pub struct SharedSlots {
    slots: RwLock<Vec<WatermarkConfig>>,
}

impl SharedSlots {
    /// Creates the slot set with `SLOT_COUNT` empty configs.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(vec![WatermarkConfig::default(); SLOT_COUNT]),
        })
    }

    /// Number of slots. Fixed for the life of the process.
    pub fn len(&self) -> usize {
        SLOT_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Copies the supplied configs into slots `0..min(len, SLOT_COUNT)`.
    ///
    /// Slots beyond the supplied length are left untouched; supplying fewer
    /// configs than slots is a deliberate partial refresh.
    pub fn overwrite(&self, configs: &[WatermarkConfig]) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        for (slot, config) in slots.iter_mut().zip(configs) {
            slot.copy_from(config);
        }
    }

    /// Clones the current slot contents as one consistent snapshot.
    pub fn snapshot(&self) -> Vec<WatermarkConfig> {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clones a single slot, if the index is in range.
    pub fn get(&self, index: usize) -> Option<WatermarkConfig> {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(index)
            .cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_channels_roundtrip() {
        let color = Argb(0x0D31_456A);
        assert_eq!(color.channels(), (0x0D, 0x31, 0x45, 0x6A));
        let (a, r, g, b) = color.channels();
        assert_eq!(Argb::from_channels(a, r, g, b), color);
    }

    #[test]
    fn argb_opacity_scales_alpha_only() {
        let color = Argb::from_channels(200, 10, 20, 30);
        let dimmed = color.with_opacity(0.5);
        let (a, r, g, b) = dimmed.channels();
        assert_eq!(a, 100);
        assert_eq!((r, g, b), (10, 20, 30));

        // Clamped, never amplified past the stored alpha
        assert_eq!(color.with_opacity(2.0).channels().0, 200);
        assert_eq!(color.with_opacity(-1.0).channels().0, 0);
    }

    #[test]
    fn config_defaults_match_documented_styling() {
        let config = WatermarkConfig::default();
        assert_eq!(config.degree, -30);
        assert_eq!(config.font_size, 14);
        assert_eq!(config.paint_color, Argb(221_332_842));
        assert_eq!(config.row_count, 8);
        assert_eq!(config.column_count, 3);
        assert!(config.is_clear());
    }

    #[test]
    fn config_json_roundtrip() {
        let config = WatermarkConfig::new(vec!["alpha".into(), "beta".into()])
            .with_degree(-25)
            .with_gaps(120.0, 200.0);

        let json = config.to_json().unwrap();
        assert!(json.contains("\"fontSize\""));
        assert!(json.contains("\"rowGap\""));

        let restored = WatermarkConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn partial_overwrite_leaves_trailing_slots_untouched() {
        let slots = SharedSlots::new();
        slots.overwrite(&[
            WatermarkConfig::new(vec!["one".into()]),
            WatermarkConfig::new(vec!["two".into()]).with_degree(15),
        ]);

        let before = slots.get(1).unwrap();
        slots.overwrite(&[WatermarkConfig::new(vec!["replaced".into()])]);

        assert_eq!(slots.get(0).unwrap().labels, vec!["replaced".to_string()]);
        assert_eq!(slots.get(1).unwrap(), before);
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let slots = SharedSlots::new();
        let snap = slots.snapshot();
        assert_eq!(snap.len(), SLOT_COUNT);

        slots.overwrite(&[WatermarkConfig::new(vec!["later".into()])]);
        assert!(snap[0].is_clear());
    }
}
