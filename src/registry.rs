//! Process-wide watermark state and fan-out.
//!
//! [`WatermarkRegistry`] owns the canonical shared config slots, the
//! included/excluded target-kind sets, and the weak lists of currently
//! marked targets. A host constructs one registry at startup (no ambient
//! singleton), attaches targets as they are created, and calls
//! [`refresh`](WatermarkRegistry::refresh) whenever the watermark content
//! changes; the registry copies the new values into the shared slots and
//! invalidates every live target so its next host paint re-runs the layout
//! engine against the updated slots.
//!
//! Targets are held as `Weak` references: the registry is never the reason a
//! target outlives its natural lifetime, and dead or terminal entries are
//! pruned lazily during the next invalidation pass.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::config::{SLOT_COUNT, SharedSlots, WatermarkConfig};
use crate::error::CapabilityError;
use crate::marker::{LayerMode, MarkerStack};
use crate::surface::RasterSurface;

// ============================================================================
// Collaborator traits
// ============================================================================

/// Opaque comparable identity for a target "class".
///
/// Used for the registered/excluded sets; two targets of the same kind share
/// eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKind(String);

impl TargetKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A host-owned drawable surface eligible to carry a watermark overlay.
///
/// The registry holds these weakly and re-checks liveness (`upgrade` plus
/// [`is_terminated`](Self::is_terminated)) before every access.
pub trait MarkTarget {
    fn kind(&self) -> TargetKind;

    /// True once the target has entered a terminal lifecycle state and must
    /// no longer be painted. Raw containers typically never report this.
    fn is_terminated(&self) -> bool {
        false
    }

    /// Asks the host to schedule a repaint of this target's overlay.
    fn request_repaint(&self) {}
}

/// Host accessibility lookup for the high-contrast-text setting.
///
/// Queried once and cached; a failed query is logged and cached as `false`
/// so it is not retried every frame. Re-queried only through
/// [`WatermarkRegistry::revalidate_contrast_mode`].
pub trait CapabilityProbe {
    fn is_high_contrast_text_enabled(&self) -> Result<bool, CapabilityError>;
}

/// Probe for hosts without an accessibility surface.
struct NoContrastCapability;

impl CapabilityProbe for NoContrastCapability {
    fn is_high_contrast_text_enabled(&self) -> Result<bool, CapabilityError> {
        Ok(false)
    }
}

// ============================================================================
// WatermarkRegistry
// ============================================================================

/// Default bitmap-path row gap, in pixels.
pub const DEFAULT_BITMAP_ROW_GAP: f32 = 120.0;

/// Default bitmap-path column gap, in pixels.
pub const DEFAULT_BITMAP_COLUMN_GAP: f32 = 200.0;

struct TargetRecord {
    target: Weak<dyn MarkTarget>,
    stack: MarkerStack,
}

/// Process-wide watermark registry.
pub struct WatermarkRegistry {
    /// Watermark every target regardless of the registered set (the
    /// excluded set still wins).
    pub mark_all_targets: bool,

    included: HashSet<TargetKind>,
    excluded: HashSet<TargetKind>,
    slots: Arc<SharedSlots>,
    targets: Vec<TargetRecord>,
    containers: Vec<TargetRecord>,
    probe: Box<dyn CapabilityProbe>,
    high_contrast: Option<bool>,
}

impl Default for WatermarkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkRegistry {
    /// A registry with no accessibility probe (high contrast treated as off).
    pub fn new() -> Self {
        Self::with_capability_probe(Box::new(NoContrastCapability))
    }

    /// A registry that resolves the high-contrast-text capability through
    /// the given probe.
    pub fn with_capability_probe(probe: Box<dyn CapabilityProbe>) -> Self {
        Self {
            mark_all_targets: false,
            included: HashSet::new(),
            excluded: HashSet::new(),
            slots: SharedSlots::new(),
            targets: Vec::new(),
            containers: Vec::new(),
            probe,
            high_contrast: None,
        }
    }

    /// The canonical shared slot set every marker reads from.
    pub fn slots(&self) -> &Arc<SharedSlots> {
        &self.slots
    }

    // ---- Target-kind sets ----

    /// Registers a kind to be watermarked. Idempotent.
    pub fn register_target_kind(&mut self, kind: TargetKind) -> bool {
        self.included.insert(kind)
    }

    /// Excludes a kind from watermarking. Overrides both the registered set
    /// and `mark_all_targets`. Idempotent.
    pub fn exclude_target_kind(&mut self, kind: TargetKind) -> bool {
        self.excluded.insert(kind)
    }

    pub fn is_registered(&self, kind: &TargetKind) -> bool {
        self.included.contains(kind)
    }

    pub fn is_excluded(&self, kind: &TargetKind) -> bool {
        self.excluded.contains(kind)
    }

    // ---- Refresh protocol ----

    /// Copies the supplied configs into the canonical slots, then
    /// invalidates every live target.
    ///
    /// Only slots `0..min(configs.len(), SLOT_COUNT)` are overwritten; a
    /// shorter list is a partial refresh that leaves trailing slots as they
    /// were. Slot objects are never replaced, so bound surfaces observe the
    /// change without re-binding.
    pub fn refresh(&mut self, configs: &[WatermarkConfig]) {
        tracing::debug!(supplied = configs.len(), "refreshing watermark slots");
        self.slots.overwrite(configs);
        self.invalidate_all();
    }

    /// Clears every watermark: a full refresh with empty label sets.
    pub fn clear(&mut self) {
        self.refresh(&vec![WatermarkConfig::default(); SLOT_COUNT]);
    }

    // ---- Attachment ----

    /// Attaches an overlay to an eligible target.
    ///
    /// Eligibility is `(mark_all_targets || registered) && !excluded`; an
    /// ineligible target is a no-op, as is a second attach of the same
    /// target. Returns true if an overlay was newly created.
    pub fn attach(&mut self, target: &Arc<dyn MarkTarget>) -> bool {
        let kind = target.kind();
        if !(self.mark_all_targets || self.is_registered(&kind)) || self.is_excluded(&kind) {
            return false;
        }
        if self.is_marked(target) {
            return false;
        }

        tracing::debug!(kind = %kind, "attaching watermark overlay");
        let stack = self.build_stack();
        self.targets.push(TargetRecord {
            target: Arc::downgrade(target),
            stack,
        });
        target.request_repaint();
        true
    }

    /// Attaches an overlay to a raw container, bypassing the eligibility
    /// sets. Containers are tracked in their own weak list.
    pub fn attach_to_container(&mut self, container: &Arc<dyn MarkTarget>) -> bool {
        if self.is_marked(container) {
            return false;
        }

        let stack = self.build_stack();
        self.containers.push(TargetRecord {
            target: Arc::downgrade(container),
            stack,
        });
        container.request_repaint();
        true
    }

    /// True if an overlay has already been attached to this target or
    /// container.
    pub fn is_marked(&self, target: &Arc<dyn MarkTarget>) -> bool {
        let probe = Arc::downgrade(target);
        self.targets
            .iter()
            .chain(&self.containers)
            .any(|rec| Weak::ptr_eq(&rec.target, &probe))
    }

    /// The overlay container attached to a target, for wiring completion
    /// callbacks. `None` if the target was never attached (or has been
    /// pruned).
    pub fn marker_stack_mut(&mut self, target: &Arc<dyn MarkTarget>) -> Option<&mut MarkerStack> {
        let probe = Arc::downgrade(target);
        self.targets
            .iter_mut()
            .chain(&mut self.containers)
            .find(|rec| Weak::ptr_eq(&rec.target, &probe))
            .map(|rec| &mut rec.stack)
    }

    // ---- Painting ----

    /// Runs one full draw pass for a target's overlay. Called by the host
    /// from its paint cycle. Returns `None` for unattached targets.
    pub fn paint<S: RasterSurface>(
        &mut self,
        target: &Arc<dyn MarkTarget>,
        surface: &mut S,
    ) -> Option<bool> {
        Some(self.marker_stack_mut(target)?.paint(surface))
    }

    /// Renders the current watermark onto a same-size copy of `source`.
    ///
    /// The source pixels are drawn first, then every canonical slot is laid
    /// out and painted on top with the supplied gap overrides (defaults 120
    /// and 200 pixels). The live target lists are untouched.
    #[cfg(feature = "bitmap")]
    pub fn render_to_bitmap(
        &self,
        source: &image::RgbaImage,
        font: &crate::raster::TileFont,
        row_gap: Option<f32>,
        column_gap: Option<f32>,
    ) -> image::RgbaImage {
        let row_gap = row_gap.unwrap_or(DEFAULT_BITMAP_ROW_GAP);
        let column_gap = column_gap.unwrap_or(DEFAULT_BITMAP_COLUMN_GAP);

        let mut surface = crate::raster::BitmapSurface::over(source.clone(), font.clone());
        for mut config in self.slots.snapshot() {
            config.row_gap = Some(row_gap);
            config.column_gap = Some(column_gap);
            crate::marker::draw_config(&mut surface, &config, 1.0);
        }
        surface.into_image()
    }

    // ---- Capability cache ----

    /// Non-blocking cached read of the high-contrast-text capability.
    /// `false` until the first real query resolves it.
    pub fn is_high_contrast_text_enabled_fastly(&self) -> bool {
        self.high_contrast.unwrap_or(false)
    }

    /// Re-queries the capability; if the cached value changed, rebuilds
    /// every overlay's layering and invalidates all live targets so the new
    /// policy takes effect on the next paint. Intended to be driven from the
    /// foreground-reentry signal.
    pub fn revalidate_contrast_mode(&mut self) {
        let fresh = self.query_probe();
        if self.high_contrast != Some(fresh) {
            tracing::info!(high_contrast = fresh, "contrast capability changed, relayout");
            self.high_contrast = Some(fresh);
            self.invalidate_all();
        }
    }

    fn contrast_enabled(&mut self) -> bool {
        match self.high_contrast {
            Some(cached) => cached,
            None => {
                let value = self.query_probe();
                self.high_contrast = Some(value);
                value
            }
        }
    }

    fn query_probe(&self) -> bool {
        match self.probe.is_high_contrast_text_enabled() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("treating high-contrast text as disabled: {err}");
                false
            }
        }
    }

    fn layer_mode(&mut self) -> LayerMode {
        if self.contrast_enabled() {
            LayerMode::PerSlot
        } else {
            LayerMode::Combined
        }
    }

    fn build_stack(&mut self) -> MarkerStack {
        let mode = self.layer_mode();
        MarkerStack::new(&self.slots, mode)
    }

    // ---- Invalidation ----

    /// Walks both weak lists: prunes dead or terminal entries, resets every
    /// surviving stack's paint state, rebuilds stacks whose layering mode no
    /// longer matches the cached capability, and requests repaints.
    fn invalidate_all(&mut self) {
        let mode = self.layer_mode();
        let mut live = Vec::new();

        // Terminal-state checks apply to real targets only; containers are
        // pruned purely on reachability.
        prune_and_reset(&mut self.targets, &self.slots, mode, true, &mut live);
        prune_and_reset(&mut self.containers, &self.slots, mode, false, &mut live);

        // Repaints go out after the lists have settled, so a reentrant
        // host callback never observes a half-pruned registry.
        for target in live {
            target.request_repaint();
        }
    }
}

fn prune_and_reset(
    records: &mut Vec<TargetRecord>,
    slots: &Arc<SharedSlots>,
    mode: LayerMode,
    check_terminal: bool,
    live: &mut Vec<Arc<dyn MarkTarget>>,
) {
    records.retain_mut(|rec| match rec.target.upgrade() {
        Some(target) if !(check_terminal && target.is_terminated()) => {
            if rec.stack.mode() != mode {
                rec.stack = MarkerStack::new(slots, mode);
            }
            rec.stack.invalidate();
            live.push(target);
            true
        }
        _ => false,
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Argb;
    use crate::error::SurfaceError;
    use crate::marker::PaintState;
    use crate::surface::{LineMetrics, TextMeasure};
    use std::cell::Cell;
    use std::rc::Rc;

    struct TestTarget {
        kind: TargetKind,
        terminated: Cell<bool>,
        repaints: Cell<usize>,
    }

    impl TestTarget {
        fn arc(kind: &str) -> Arc<TestTarget> {
            Arc::new(TestTarget {
                kind: TargetKind::new(kind),
                terminated: Cell::new(false),
                repaints: Cell::new(0),
            })
        }
    }

    impl MarkTarget for TestTarget {
        fn kind(&self) -> TargetKind {
            self.kind.clone()
        }

        fn is_terminated(&self) -> bool {
            self.terminated.get()
        }

        fn request_repaint(&self) {
            self.repaints.set(self.repaints.get() + 1);
        }
    }

    fn as_dyn(target: &Arc<TestTarget>) -> Arc<dyn MarkTarget> {
        Arc::clone(target) as Arc<dyn MarkTarget>
    }

    #[derive(Default)]
    struct CountingSurface {
        drawn: usize,
        cleared: usize,
    }

    impl TextMeasure for CountingSurface {
        fn measure_text(&self, text: &str, _font_size: u32) -> f32 {
            text.chars().count() as f32 * 6.0
        }

        fn line_metrics(&self, _font_size: u32) -> LineMetrics {
            LineMetrics {
                ascent: 40.0,
                descent: 10.0,
                line_spacing: 60.0,
            }
        }
    }

    impl RasterSurface for CountingSurface {
        fn width(&self) -> u32 {
            640
        }

        fn height(&self) -> u32 {
            480
        }

        fn clear(&mut self) -> Result<(), SurfaceError> {
            self.cleared += 1;
            self.drawn = 0;
            Ok(())
        }

        fn push_rotation(&mut self, _degrees: f32, _px: f32, _py: f32) {}

        fn pop_rotation(&mut self) {}

        fn draw_text(
            &mut self,
            _text: &str,
            _x: f32,
            _y: f32,
            _color: Argb,
            _font_size: u32,
        ) -> Result<(), SurfaceError> {
            self.drawn += 1;
            Ok(())
        }
    }

    struct FixedProbe {
        value: Rc<Cell<bool>>,
        failing: bool,
        queries: Rc<Cell<usize>>,
    }

    impl FixedProbe {
        fn boxed(value: bool) -> Box<FixedProbe> {
            Box::new(FixedProbe {
                value: Rc::new(Cell::new(value)),
                failing: false,
                queries: Rc::default(),
            })
        }
    }

    impl CapabilityProbe for FixedProbe {
        fn is_high_contrast_text_enabled(&self) -> Result<bool, CapabilityError> {
            self.queries.set(self.queries.get() + 1);
            if self.failing {
                Err(CapabilityError("settings store unavailable".into()))
            } else {
                Ok(self.value.get())
            }
        }
    }

    #[test]
    fn kind_sets_are_idempotent() {
        let mut registry = WatermarkRegistry::new();
        let kind = TargetKind::new("report");

        assert!(registry.register_target_kind(kind.clone()));
        assert!(!registry.register_target_kind(kind.clone()));
        assert!(registry.is_registered(&kind));

        assert!(registry.exclude_target_kind(kind.clone()));
        assert!(!registry.exclude_target_kind(kind.clone()));
        assert!(registry.is_excluded(&kind));
    }

    #[test]
    fn unregistered_target_attach_is_a_noop() {
        let mut registry = WatermarkRegistry::new();
        let target = TestTarget::arc("settings");

        assert!(!registry.attach(&as_dyn(&target)));
        assert!(!registry.is_marked(&as_dyn(&target)));
        assert_eq!(target.repaints.get(), 0);
    }

    #[test]
    fn excluded_kind_beats_mark_all() {
        let mut registry = WatermarkRegistry::new();
        registry.mark_all_targets = true;
        registry.exclude_target_kind(TargetKind::new("login"));

        let excluded = TestTarget::arc("login");
        let other = TestTarget::arc("home");

        assert!(!registry.attach(&as_dyn(&excluded)));
        assert!(registry.attach(&as_dyn(&other)));
    }

    #[test]
    fn attach_is_idempotent_per_target() {
        let mut registry = WatermarkRegistry::new();
        registry.register_target_kind(TargetKind::new("home"));

        let target = TestTarget::arc("home");
        assert!(registry.attach(&as_dyn(&target)));
        assert!(!registry.attach(&as_dyn(&target)));
        assert_eq!(target.repaints.get(), 1);
    }

    #[test]
    fn container_attach_skips_eligibility() {
        let mut registry = WatermarkRegistry::new();
        let container = TestTarget::arc("embedded-panel");

        assert!(registry.attach_to_container(&as_dyn(&container)));
        assert!(registry.is_marked(&as_dyn(&container)));
    }

    #[test]
    fn refresh_updates_slots_and_requests_repaints() {
        let mut registry = WatermarkRegistry::new();
        registry.mark_all_targets = true;

        let target = TestTarget::arc("home");
        registry.attach(&as_dyn(&target));

        registry.refresh(&[WatermarkConfig::new(vec!["secret".into()])]);
        assert_eq!(registry.slots().get(0).unwrap().labels, vec!["secret"]);
        assert_eq!(target.repaints.get(), 2); // attach + refresh
    }

    #[test]
    fn partial_refresh_leaves_trailing_slot_untouched() {
        let mut registry = WatermarkRegistry::new();
        registry.refresh(&[
            WatermarkConfig::new(vec!["one".into()]),
            WatermarkConfig::new(vec!["two".into()]).with_degree(12),
        ]);
        let second = registry.slots().get(1).unwrap();

        registry.refresh(&[WatermarkConfig::new(vec!["updated".into()])]);
        assert_eq!(registry.slots().get(1).unwrap(), second);
    }

    #[test]
    fn refresh_rearms_completion_and_paint_reports_once() {
        let mut registry = WatermarkRegistry::new();
        registry.mark_all_targets = true;

        let target = TestTarget::arc("home");
        let handle = as_dyn(&target);
        registry.attach(&handle);
        registry.refresh(&[WatermarkConfig::new(vec!["mark".into()])]);

        let mut surface = CountingSurface::default();
        registry.paint(&handle, &mut surface).unwrap();
        registry.paint(&handle, &mut surface).unwrap();

        let stack = registry.marker_stack_mut(&handle).unwrap();
        assert_eq!(stack.markers()[0].state(), PaintState::Success);

        // Refresh resets the cached result to unknown.
        registry.refresh(&[WatermarkConfig::new(vec!["mark".into()])]);
        let stack = registry.marker_stack_mut(&handle).unwrap();
        assert_eq!(stack.markers()[0].state(), PaintState::Unknown);
    }

    #[test]
    fn clear_then_paint_draws_nothing() {
        let mut registry = WatermarkRegistry::new();
        registry.mark_all_targets = true;

        let target = TestTarget::arc("home");
        let handle = as_dyn(&target);
        registry.refresh(&[WatermarkConfig::new(vec!["mark".into()])]);
        registry.attach(&handle);
        registry.clear();

        let mut surface = CountingSurface::default();
        assert_eq!(registry.paint(&handle, &mut surface), Some(true));
        assert_eq!(surface.cleared, 1);
        assert_eq!(surface.drawn, 0);
    }

    #[test]
    fn dead_and_terminal_targets_are_pruned_lazily() {
        let mut registry = WatermarkRegistry::new();
        registry.mark_all_targets = true;

        let dropped = TestTarget::arc("home");
        let terminal = TestTarget::arc("detail");
        let survivor = TestTarget::arc("feed");
        registry.attach(&as_dyn(&dropped));
        registry.attach(&as_dyn(&terminal));
        registry.attach(&as_dyn(&survivor));
        assert_eq!(registry.targets.len(), 3);

        terminal.terminated.set(true);
        let dropped_handle = as_dyn(&dropped);
        drop(dropped);
        drop(dropped_handle);

        registry.refresh(&[]);
        assert_eq!(registry.targets.len(), 1);
        assert!(registry.is_marked(&as_dyn(&survivor)));
    }

    #[test]
    fn high_contrast_builds_per_slot_stacks() {
        let mut registry = WatermarkRegistry::with_capability_probe(FixedProbe::boxed(true));
        registry.mark_all_targets = true;

        let target = TestTarget::arc("home");
        let handle = as_dyn(&target);
        registry.attach(&handle);

        let stack = registry.marker_stack_mut(&handle).unwrap();
        assert_eq!(stack.mode(), LayerMode::PerSlot);
        assert_eq!(stack.markers().len(), SLOT_COUNT);
        assert!(registry.is_high_contrast_text_enabled_fastly());
    }

    #[test]
    fn capability_is_queried_once_and_failure_caches_false() {
        let queries = Rc::new(Cell::new(0));
        let probe = FixedProbe {
            value: Rc::new(Cell::new(true)),
            failing: true,
            queries: Rc::clone(&queries),
        };
        let mut registry = WatermarkRegistry::with_capability_probe(Box::new(probe));
        registry.mark_all_targets = true;

        let first = TestTarget::arc("a");
        let second = TestTarget::arc("b");
        registry.attach(&as_dyn(&first));
        registry.attach(&as_dyn(&second));

        assert!(!registry.is_high_contrast_text_enabled_fastly());
        // One failed query, cached; not retried on the second attach.
        assert_eq!(queries.get(), 1);
    }

    #[test]
    fn revalidate_rebuilds_stacks_when_capability_flips() {
        let probe = FixedProbe::boxed(false);
        let flag = Rc::clone(&probe.value);
        let mut registry = WatermarkRegistry::with_capability_probe(probe);
        registry.mark_all_targets = true;

        let target = TestTarget::arc("home");
        let handle = as_dyn(&target);
        registry.attach(&handle);
        assert_eq!(
            registry.marker_stack_mut(&handle).unwrap().mode(),
            LayerMode::Combined
        );

        flag.set(true);
        registry.revalidate_contrast_mode();
        assert_eq!(
            registry.marker_stack_mut(&handle).unwrap().mode(),
            LayerMode::PerSlot
        );
        // Unchanged value is a no-op.
        registry.revalidate_contrast_mode();
        assert_eq!(target.repaints.get(), 2); // attach + rebuild
    }
}
