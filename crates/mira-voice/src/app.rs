//! Application controller — owns the script, its persistence, and the
//! playback wiring (sequencer, gesture router, amplitude animator).
//!
//! This is the session owner the rest of the crate hangs off: the script is
//! loaded once at construction, every editor mutation is persisted, and the
//! sequencer's talking flag drives the animator's target.

use crate::gesture::{GestureRouter, TapOutcome};
use crate::pulse::{PulseAnimator, PulseConfig, VisualSink};
use crate::script::Script;
use crate::sequencer::{Sequencer, SequencerConfig, TalkingListener};
use crate::speech::SpeechClient;
use crate::store::ScriptStore;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub struct VoiceApp {
    script: Script,
    store: ScriptStore,
    sequencer: Arc<Sequencer>,
    router: GestureRouter,
    animator: Arc<PulseAnimator>,
}

impl VoiceApp {
    /// Load the persisted script (or the default single step) and wire the
    /// playback stack around the given speech client and visual sink.
    pub fn new(store: ScriptStore, speech: Arc<dyn SpeechClient>, sink: Arc<dyn VisualSink>) -> Self {
        Self::with_configs(
            store,
            speech,
            sink,
            SequencerConfig::default(),
            PulseConfig::default(),
        )
    }

    pub fn with_configs(
        store: ScriptStore,
        speech: Arc<dyn SpeechClient>,
        sink: Arc<dyn VisualSink>,
        sequencer_config: SequencerConfig,
        pulse_config: PulseConfig,
    ) -> Self {
        let script = store.load();
        let animator = Arc::new(PulseAnimator::new(pulse_config, sink));

        let on_talking: TalkingListener = {
            let animator = Arc::clone(&animator);
            Some(Arc::new(move |talking| animator.set_active(talking)))
        };
        let sequencer = Sequencer::new(sequencer_config, speech, on_talking);
        let router = GestureRouter::new(Arc::clone(&sequencer));

        Self {
            script,
            store,
            sequencer,
            router,
            animator,
        }
    }

    /// The single tap gesture over the main surface.
    pub fn tap(&self) -> TapOutcome {
        self.router.tap(&self.script)
    }

    pub fn open_menu(&self) {
        self.router.menu_opened();
    }

    pub fn close_menu(&self) {
        self.router.menu_closed();
    }

    /// Append a new empty step and persist. Returns the new step's id.
    pub fn add_step(&mut self) -> Uuid {
        let id = self.script.append();
        self.persist();
        id
    }

    /// Patch a step's text and/or delay and persist. False for unknown ids.
    pub fn update_step(&mut self, id: Uuid, text: Option<String>, delay: Option<f64>) -> bool {
        let hit = self.script.update(id, text, delay);
        if hit {
            self.persist();
        }
        hit
    }

    /// Delete a step and persist. False for unknown ids.
    pub fn delete_step(&mut self, id: Uuid) -> bool {
        let hit = self.script.remove(id);
        if hit {
            self.persist();
        }
        hit
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn sequencer(&self) -> &Arc<Sequencer> {
        &self.sequencer
    }

    pub fn animator(&self) -> &Arc<PulseAnimator> {
        &self.animator
    }

    pub fn is_talking(&self) -> bool {
        self.sequencer.is_talking()
    }

    /// Everything degrades silently here: a failed write is logged, the
    /// in-memory script stays authoritative, and the next mutation retries.
    fn persist(&self) {
        if let Err(e) = self.store.save(&self.script) {
            warn!("script persist failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::NullSink;
    use crate::speech::PlaceholderSpeech;

    fn app_at(path: std::path::PathBuf) -> VoiceApp {
        VoiceApp::new(
            ScriptStore::new(path),
            Arc::new(PlaceholderSpeech),
            Arc::new(NullSink),
        )
    }

    #[tokio::test]
    async fn editor_mutations_persist_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");

        let mut app = app_at(path.clone());
        assert_eq!(app.script().len(), 1); // startup fallback

        let id = app.add_step();
        assert!(app.update_step(id, Some("hello mira".into()), Some(0.5)));

        let reloaded = app_at(path);
        assert_eq!(reloaded.script().len(), 2);
        assert_eq!(reloaded.script().steps()[1].text, "hello mira");
        assert_eq!(reloaded.script().steps()[1].delay, 0.5);
    }

    #[tokio::test]
    async fn delete_persists_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");

        let mut app = app_at(path.clone());
        let id = app.add_step();
        assert!(app.delete_step(id));
        assert!(!app.delete_step(id));

        let reloaded = app_at(path);
        assert_eq!(reloaded.script().len(), 1);
    }

    #[tokio::test]
    async fn tap_on_default_script_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_at(dir.path().join("script.json"));
        // The default script has one blank step; nothing to speak.
        assert_eq!(app.tap(), TapOutcome::Ignored);
    }
}
