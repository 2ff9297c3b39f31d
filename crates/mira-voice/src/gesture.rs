//! Tap routing — one process-wide gesture toggles playback, gated by the
//! menu state and a short suppression window after the menu closes.

use crate::script::Script;
use crate::sequencer::Sequencer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// What a tap resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Menu open, suppression window active, or nothing speakable.
    Ignored,
    /// A playback session was started.
    Started,
    /// The active session was stopped.
    Stopped,
}

/// Routes the single tap gesture to the sequencer. The sequencer is injected
/// and its Idle/Playing state is read per tap; the router holds no playback
/// state of its own.
pub struct GestureRouter {
    sequencer: Arc<Sequencer>,
    menu_open: AtomicBool,
    suppress_until: Mutex<Option<Instant>>,
    suppress_window: Duration,
}

impl GestureRouter {
    /// How long after a menu close taps stay ignored, so the gesture that
    /// closed the menu cannot also toggle playback.
    pub const DEFAULT_SUPPRESS_WINDOW: Duration = Duration::from_millis(250);

    pub fn new(sequencer: Arc<Sequencer>) -> Self {
        Self {
            sequencer,
            menu_open: AtomicBool::new(false),
            suppress_until: Mutex::new(None),
            suppress_window: Self::DEFAULT_SUPPRESS_WINDOW,
        }
    }

    /// Override the suppression window (tests use a short one).
    pub fn with_suppress_window(mut self, window: Duration) -> Self {
        self.suppress_window = window;
        self
    }

    fn suppress_slot(&self) -> MutexGuard<'_, Option<Instant>> {
        self.suppress_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Route one tap: stop if a session is active, start one otherwise.
    pub fn tap(&self, script: &Script) -> TapOutcome {
        if self.menu_open.load(Ordering::SeqCst) {
            return TapOutcome::Ignored;
        }
        if let Some(until) = *self.suppress_slot() {
            if Instant::now() < until {
                debug!("tap suppressed after menu close");
                return TapOutcome::Ignored;
            }
        }

        if self.sequencer.is_active() {
            self.sequencer.stop();
            TapOutcome::Stopped
        } else if self.sequencer.start(script).is_some() {
            TapOutcome::Started
        } else {
            TapOutcome::Ignored
        }
    }

    /// Gate taps while the editor sheet is open. Does not stop playback.
    pub fn menu_opened(&self) {
        self.menu_open.store(true, Ordering::SeqCst);
    }

    /// Reopen the tap surface and arm the suppression window.
    pub fn menu_closed(&self) {
        self.menu_open.store(false, Ordering::SeqCst);
        *self.suppress_slot() = Some(Instant::now() + self.suppress_window);
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu_open.load(Ordering::SeqCst)
    }
}
