//! Script data model — ordered steps of text plus a post-speech delay.
//!
//! The script is what the menu editor mutates and what playback snapshots.
//! Blank steps stay in the script (the user can fill them in later) but are
//! excluded from playback snapshots.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One scripted line: text to speak, then a wait before the next line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Immutable id, assigned at creation. Random, never positional.
    pub id: Uuid,
    /// Line to synthesize. Blank text is kept but skipped at playback.
    pub text: String,
    /// Post-speech wait in seconds. Non-finite or negative counts as 0.
    #[serde(default)]
    pub delay: f64,
}

impl Step {
    /// New empty step with a fresh random id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            text: String::new(),
            delay: 0.0,
        }
    }

    /// Step with text and delay (random id).
    pub fn with_text(text: impl Into<String>, delay: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            delay,
        }
    }

    /// Whether the step has speakable (non-blank) text.
    pub fn is_speakable(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Post-speech wait, clamped: NaN or negative delays count as zero.
    pub fn wait(&self) -> Duration {
        if self.delay.is_finite() && self.delay > 0.0 {
            Duration::try_from_secs_f64(self.delay).unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::new()
    }
}

/// The ordered, persisted collection of steps. Order is playback order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Script with a single empty step — the startup fallback.
    pub fn with_default_step() -> Self {
        Self {
            steps: vec![Step::new()],
        }
    }

    /// Script from existing steps, preserving their order.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a new empty step and return its id.
    pub fn append(&mut self) -> Uuid {
        let step = Step::new();
        let id = step.id;
        self.steps.push(step);
        id
    }

    /// Patch a step's text and/or delay by id. Returns false for unknown ids.
    pub fn update(&mut self, id: Uuid, text: Option<String>, delay: Option<f64>) -> bool {
        match self.steps.iter_mut().find(|s| s.id == id) {
            Some(step) => {
                if let Some(text) = text {
                    step.text = text;
                }
                if let Some(delay) = delay {
                    step.delay = delay;
                }
                true
            }
            None => false,
        }
    }

    /// Delete a step by id. Returns false for unknown ids.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.steps.len();
        self.steps.retain(|s| s.id != id);
        self.steps.len() != before
    }

    /// Ordered snapshot of speakable steps for one playback session.
    /// The live script can be edited afterwards without touching the session.
    pub fn playable(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|s| s.is_speakable())
            .cloned()
            .collect()
    }
}
