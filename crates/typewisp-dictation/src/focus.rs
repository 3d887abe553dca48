//! Focus divergence detection.
//!
//! [`FocusGuard`] remembers the window that had focus when a session started
//! and reports the first focus change away from it. Further changes while
//! still away are part of the same episode and stay silent; coming back to
//! the target ends the episode.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use typewisp_core::types::WindowId;

use crate::capability::InputCapability;
use crate::events::{DictationEvent, EventSender};

#[derive(Debug, Clone, Default)]
pub struct FocusGuard {
    target: Option<WindowId>,
    diverged: bool,
}

impl FocusGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start guarding `target`. An unknown target (`None`) never diverges.
    pub fn arm(&mut self, target: Option<WindowId>) {
        self.target = target;
        self.diverged = false;
    }

    pub fn disarm(&mut self) {
        self.target = None;
        self.diverged = false;
    }

    pub fn target(&self) -> Option<&WindowId> {
        self.target.as_ref()
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged
    }

    /// Feed a focus change. Returns true exactly once per divergence episode.
    pub fn observe(&mut self, window: &WindowId) -> bool {
        let Some(target) = self.target.as_ref() else {
            return false;
        };
        if window == target {
            if self.diverged {
                tracing::debug!(window = %window, "Focus returned to target window");
            }
            self.diverged = false;
            return false;
        }
        if self.diverged {
            return false;
        }
        self.diverged = true;
        true
    }
}

/// Turn foreground-window polling into `FocusChanged` events.
///
/// For input backends that cannot push focus notifications. Only changes are
/// reported; the first poll establishes the baseline.
pub fn spawn_focus_poller(
    input: Arc<dyn InputCapability>,
    interval: Duration,
    events: EventSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = input.foreground_window();
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Focus poller started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let current = input.foreground_window();
            if current != last {
                if let Some(window) = current.clone() {
                    events.emit(DictationEvent::FocusChanged(window));
                }
                last = current;
            }
        }
        tracing::debug!("Focus poller stopped");
    })
}
