//! tilemark: Tiled text watermark overlays for raster surfaces
//!
//! This crate computes and paints a repeating, rotated, tiled text overlay
//! ("watermark") onto rectangular raster surfaces, either live host-owned
//! drawing targets or static bitmaps, and keeps every overlay synchronized with a
//! small set of shared configuration slots that can be updated atomically
//! from one call.
//!
//! # Example
//!
//! ```
//! use tilemark::{TargetKind, WatermarkConfig, WatermarkRegistry};
//!
//! let mut registry = WatermarkRegistry::new();
//! registry.register_target_kind(TargetKind::new("report-screen"));
//!
//! // Update the shared slots; every attached target is invalidated and
//! // repaints against the new content on its next paint cycle.
//! registry.refresh(&[
//!     WatermarkConfig::new(vec!["ACME Corp".into(), "user 1024".into()])
//!         .with_degree(-25),
//! ]);
//!
//! // Remove all watermarks again.
//! registry.clear();
//! assert!(!registry.is_high_contrast_text_enabled_fastly());
//! ```
//!
//! # Architecture
//!
//! - [`plan`] is the pure tiling engine: canvas size + config + font
//!   metrics in, positioned rotated text blocks out.
//! - [`WatermarkConfig`] values live in shared slots owned by the
//!   [`WatermarkRegistry`]; markers read the slots through a shared handle,
//!   so a refresh is visible everywhere without re-binding.
//! - [`MarkerStack`] is the overlay attached to one target; it repaints
//!   through the host's [`RasterSurface`] and reports the first result per
//!   invalidation cycle through a one-shot callback.
//! - [`LifecycleTracker`] counts foreground targets and fires the
//!   edge-triggered signals that drive attach and capability re-checks.
//!
//! Hosts implement [`MarkTarget`] for their drawable surfaces and
//! [`RasterSurface`] for their pixel backend; the `bitmap` feature ships a
//! ready-made [`BitmapSurface`] over `image` and `fontdue`.

mod config;
mod error;
mod layout;
mod lifecycle;
mod marker;
mod registry;
mod surface;

#[cfg(feature = "bitmap")]
mod raster;

pub use config::{
    Argb, DEFAULT_COLUMN_COUNT, DEFAULT_ROW_COUNT, SLOT_COUNT, SharedSlots, WatermarkConfig,
};
pub use error::{CapabilityError, ListenerError, SurfaceError};
pub use layout::{DrawCommand, LINE_GAP, PlacedTextBlock, plan};
pub use lifecycle::{LifecycleListener, LifecycleTracker};
pub use marker::{BASE_OPACITY, LayerMode, Marker, MarkerStack, PaintCallback, PaintState};
pub use registry::{
    CapabilityProbe, DEFAULT_BITMAP_COLUMN_GAP, DEFAULT_BITMAP_ROW_GAP, MarkTarget, TargetKind,
    WatermarkRegistry,
};
pub use surface::{LineMetrics, RasterSurface, TextMeasure};

#[cfg(feature = "bitmap")]
pub use raster::{BitmapSurface, TileFont};
