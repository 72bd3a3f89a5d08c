//! Error types for the watermark core.
//!
//! The paint path itself never propagates errors past the surface boundary;
//! failures there are folded into the boolean paint result. These types cover
//! the seams where a host collaborator can fail.

use thiserror::Error;

/// A failure while measuring or drawing on a raster surface.
///
/// Surfaces report these from `draw_text`/`clear`; the marker converts them
/// into a `false` paint result rather than letting them escape the paint
/// callback.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The surface could not draw the requested text run.
    #[error("failed to draw text {text:?}: {reason}")]
    Draw { text: String, reason: String },

    /// The surface could not be reset to its base contents.
    #[error("failed to clear surface: {0}")]
    Clear(String),

    /// No font is available to rasterize text with.
    #[error("no usable font: {0}")]
    Font(String),
}

/// The host's accessibility-capability lookup failed.
///
/// Treated as "capability disabled": logged once, cached as `false`, and not
/// retried until an explicit re-query.
#[derive(Debug, Error)]
#[error("capability query failed: {0}")]
pub struct CapabilityError(pub String);

/// Boxed error type for host-supplied lifecycle listeners and activators.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
