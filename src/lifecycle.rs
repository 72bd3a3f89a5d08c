//! Foreground lifecycle tracking.
//!
//! [`LifecycleTracker`] counts active foreground targets from the host's
//! lifecycle events and fires edge-triggered "entered foreground" /
//! "entered background" listeners. The counting moves on the *started*
//! event rather than *resumed*: a target can be started and finished
//! without ever resuming (e.g. launched from a notification), and the count
//! must still balance.
//!
//! The foreground-reentry signal is the intended trigger for
//! [`WatermarkRegistry::revalidate_contrast_mode`]: register a listener
//! that re-checks the capability and the overlays relayout if the host
//! setting changed while the app was backgrounded.

use std::sync::{Arc, Weak};

use crate::error::ListenerError;
use crate::registry::{MarkTarget, TargetKind, WatermarkRegistry};

/// A host-supplied listener for foreground/background transitions.
///
/// Fallible on purpose: a failing listener is logged and the remaining
/// listeners still run.
pub type LifecycleListener = Box<dyn FnMut() -> Result<(), ListenerError>>;

/// Counts foreground targets and drives attach + foreground notifications.
pub struct LifecycleTracker {
    foreground_count: i32,
    previous_count: i32,

    main_kind: Option<TargetKind>,
    main_target: Option<Weak<dyn MarkTarget>>,
    current_target: Option<Weak<dyn MarkTarget>>,

    on_enter_foreground: Vec<LifecycleListener>,
    on_enter_background: Vec<LifecycleListener>,

    /// Host hook to raise the main target when no live instance exists.
    activator: Option<Box<dyn FnMut() -> Result<(), ListenerError>>>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self {
            foreground_count: 0,
            previous_count: 0,
            main_kind: None,
            main_target: None,
            current_target: None,
            on_enter_foreground: Vec::new(),
            on_enter_background: Vec::new(),
            activator: None,
        }
    }

    /// Declares which target kind is the application's main entry target.
    pub fn set_main_kind(&mut self, kind: TargetKind) {
        self.main_kind = Some(kind);
    }

    /// Installs the platform hook used by
    /// [`bring_main_target_to_front`](Self::bring_main_target_to_front).
    pub fn set_activator(&mut self, activator: Box<dyn FnMut() -> Result<(), ListenerError>>) {
        self.activator = Some(activator);
    }

    pub fn add_on_enter_foreground(&mut self, listener: LifecycleListener) {
        self.on_enter_foreground.push(listener);
    }

    pub fn add_on_enter_background(&mut self, listener: LifecycleListener) {
        self.on_enter_background.push(listener);
    }

    // ---- Lifecycle events ----

    /// Target created: remember the main target and attach its watermark.
    pub fn on_target_created(
        &mut self,
        registry: &mut WatermarkRegistry,
        target: &Arc<dyn MarkTarget>,
    ) {
        tracing::info!(kind = %target.kind(), "target created");
        if self.main_kind.as_ref() == Some(&target.kind()) {
            self.main_target = Some(Arc::downgrade(target));
        }
        registry.attach(target);
    }

    /// Target started: snapshot the previous count, then count it in.
    pub fn on_target_started(&mut self, target: &Arc<dyn MarkTarget>) {
        self.previous_count = self.foreground_count;
        self.foreground_count += 1;
        tracing::info!(
            kind = %target.kind(),
            count = self.foreground_count,
            "target started"
        );
    }

    /// Target resumed: fires the enter-foreground listeners on the
    /// background-to-foreground edge (not on every resume).
    pub fn on_target_resumed(&mut self, target: &Arc<dyn MarkTarget>) {
        tracing::info!(kind = %target.kind(), "target resumed");
        self.current_target = Some(Arc::downgrade(target));

        if self.previous_count <= 0 && self.foreground_count > 0 {
            tracing::info!("app entered foreground");
            fire(&mut self.on_enter_foreground, "enter-foreground");
        }
    }

    /// Target stopped: count it out; fires the enter-background listeners
    /// when no foreground target remains.
    pub fn on_target_stopped(&mut self, target: &Arc<dyn MarkTarget>) {
        self.foreground_count -= 1;
        tracing::info!(
            kind = %target.kind(),
            count = self.foreground_count,
            "target stopped"
        );

        if self.foreground_count <= 0 {
            tracing::info!("app entered background");
            fire(&mut self.on_enter_background, "enter-background");
        }
    }

    /// Target destroyed: log only. Pruning of registry records stays lazy.
    pub fn on_target_destroyed(&mut self, target: &Arc<dyn MarkTarget>) {
        tracing::info!(kind = %target.kind(), "target destroyed");
    }

    // ---- State queries ----

    pub fn is_in_foreground(&self) -> bool {
        self.foreground_count > 0
    }

    pub fn is_in_background(&self) -> bool {
        !self.is_in_foreground()
    }

    /// The live main target, if it still exists and is not terminal.
    pub fn main_target(&self) -> Option<Arc<dyn MarkTarget>> {
        live(self.main_target.as_ref())
    }

    /// The most recently resumed target, if still live.
    pub fn current_target(&self) -> Option<Arc<dyn MarkTarget>> {
        live(self.current_target.as_ref())
    }

    /// Best-effort "bring the main target to front".
    ///
    /// Delegates to the host activator; a missing activator or a failing
    /// one is logged and otherwise a no-op. Never crashes the host.
    pub fn bring_main_target_to_front(&mut self) {
        match self.activator.as_mut() {
            Some(activator) => {
                if let Err(err) = activator() {
                    tracing::error!("failed to bring main target to front: {err}");
                }
            }
            None => tracing::debug!("no activator installed; cannot raise main target"),
        }
    }
}

fn live(weak: Option<&Weak<dyn MarkTarget>>) -> Option<Arc<dyn MarkTarget>> {
    weak?.upgrade().filter(|target| !target.is_terminated())
}

fn fire(listeners: &mut [LifecycleListener], event: &str) {
    for listener in listeners {
        if let Err(err) = listener() {
            tracing::error!("{event} listener failed: {err}");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
