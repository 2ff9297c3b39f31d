//! Playback sequencer — one cancellable session over the script at a time.
//!
//! Speak, wait the step's delay, repeat. The cancel flag is checked at every
//! step boundary, and a drop guard clears `running`/`talking` on every exit
//! path, so the flags can never be left stuck after a session dies.

use crate::script::Script;
use crate::speech::SpeechClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Optional callback invoked on every talking transition. The animator hooks
/// in here to restart its frame loop.
pub type TalkingListener = Option<Arc<dyn Fn(bool) + Send + Sync>>;

/// Configuration for playback sessions.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Voice passed to the speech client for every line.
    pub voice: String,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
        }
    }
}

/// Drives the script one step at a time; at most one session runs at once.
pub struct Sequencer {
    config: SequencerConfig,
    speech: Arc<dyn SpeechClient>,
    running: AtomicBool,
    cancel: AtomicBool,
    talking: AtomicBool,
    on_talking: TalkingListener,
}

/// Clears `running` and `talking` when the session task exits, whatever the
/// exit path (completion, cancel break, task abort).
struct SessionGuard(Arc<Sequencer>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.set_talking(false);
    }
}

impl Sequencer {
    pub fn new(
        config: SequencerConfig,
        speech: Arc<dyn SpeechClient>,
        on_talking: TalkingListener,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            speech,
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            talking: AtomicBool::new(false),
            on_talking,
        })
    }

    /// True only while a line is actively being spoken.
    pub fn is_talking(&self) -> bool {
        self.talking.load(Ordering::SeqCst)
    }

    /// Whether a session is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Playing vs Idle, as the gesture router sees it.
    pub fn is_active(&self) -> bool {
        self.is_running() || self.is_talking()
    }

    fn set_talking(&self, on: bool) {
        self.talking.store(on, Ordering::SeqCst);
        if let Some(cb) = &self.on_talking {
            cb(on);
        }
    }

    /// Start one session over the script's speakable steps.
    ///
    /// No-op when a session is already running or nothing is speakable.
    /// Returns the session task handle so callers may await completion;
    /// dropping it detaches the session.
    pub fn start(self: &Arc<Self>, script: &Script) -> Option<JoinHandle<()>> {
        if self.is_running() {
            debug!("session already running; ignoring start");
            return None;
        }
        let steps = script.playable();
        if steps.is_empty() {
            debug!("nothing speakable; not starting");
            return None;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("session already running; ignoring start");
            return None;
        }
        self.cancel.store(false, Ordering::SeqCst);

        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _guard = SessionGuard(Arc::clone(&this));
            info!("session started: {} steps", steps.len());
            for step in &steps {
                if this.cancel.load(Ordering::SeqCst) {
                    break;
                }
                this.set_talking(true);
                this.speech.speak(&step.text, &this.config.voice).await;
                this.set_talking(false);
                if this.cancel.load(Ordering::SeqCst) {
                    break;
                }
                let wait = step.wait();
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            debug!("session ended");
        }))
    }

    /// Cancel the session: halt audio and clear talking immediately, without
    /// waiting for the in-flight speak to resolve. Safe to call when idle.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.speech.halt();
        self.set_talking(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Step;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Records spoken lines; each line takes `per_line` of wall clock.
    struct RecordingSpeech {
        spoken: Mutex<Vec<String>>,
        per_line: Duration,
    }

    impl RecordingSpeech {
        fn new(per_line: Duration) -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                per_line,
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechClient for RecordingSpeech {
        async fn speak(&self, text: &str, _voice: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
            tokio::time::sleep(self.per_line).await;
        }

        fn halt(&self) {}
    }

    #[tokio::test]
    async fn speaks_in_order_skipping_blanks_and_their_delays() {
        let speech = RecordingSpeech::new(Duration::from_millis(5));
        let seq = Sequencer::new(SequencerConfig::default(), speech.clone(), None);
        let script = Script::from_steps(vec![
            Step::with_text("a", 0.05),
            Step::with_text("", 5.0),
            Step::with_text("b", 0.0),
        ]);

        let handle = seq.start(&script).expect("session should start");
        // Completes well under the blank step's 5s delay, because that step
        // (and its delay) is never part of the session.
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert_eq!(speech.spoken(), vec!["a", "b"]);
        assert!(!seq.is_running());
        assert!(!seq.is_talking());
    }

    #[tokio::test]
    async fn second_start_is_a_no_op_while_running() {
        let speech = RecordingSpeech::new(Duration::from_millis(50));
        let seq = Sequencer::new(SequencerConfig::default(), speech.clone(), None);
        let script = Script::from_steps(vec![Step::with_text("only", 0.0)]);

        let first = seq.start(&script).expect("first start");
        assert!(seq.start(&script).is_none());

        first.await.unwrap();
        assert_eq!(speech.spoken(), vec!["only"]);
    }

    #[tokio::test]
    async fn empty_snapshot_does_not_start() {
        let speech = RecordingSpeech::new(Duration::ZERO);
        let seq = Sequencer::new(SequencerConfig::default(), speech, None);
        let script = Script::from_steps(vec![Step::with_text("   ", 1.0)]);
        assert!(seq.start(&script).is_none());
        assert!(!seq.is_running());
    }

    #[tokio::test]
    async fn stop_while_idle_is_safe() {
        let speech = RecordingSpeech::new(Duration::ZERO);
        let seq = Sequencer::new(SequencerConfig::default(), speech, None);
        seq.stop();
        assert!(!seq.is_running());
        assert!(!seq.is_talking());
    }

    #[tokio::test]
    async fn stop_clears_talking_and_breaks_the_loop() {
        let speech = RecordingSpeech::new(Duration::from_millis(40));
        let seq = Sequencer::new(SequencerConfig::default(), speech.clone(), None);
        let script = Script::from_steps(vec![
            Step::with_text("one", 0.0),
            Step::with_text("two", 0.0),
            Step::with_text("three", 0.0),
        ]);

        let handle = seq.start(&script).expect("session");
        tokio::time::sleep(Duration::from_millis(10)).await;
        seq.stop();
        assert!(!seq.is_talking());

        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        // The first line was in flight when stop landed; later lines never ran.
        assert!(speech.spoken().len() < 3);
        assert!(!seq.is_running());
    }

    #[tokio::test]
    async fn a_failed_line_never_halts_the_sequence() {
        /// Speech client whose synthesis "fails" for one line: per contract
        /// the failure is swallowed and speak resolves immediately.
        struct FlakySpeech {
            spoken: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl SpeechClient for FlakySpeech {
            async fn speak(&self, text: &str, _voice: &str) {
                if text == "fail" {
                    // Swallowed synthesis failure: resolve as a zero-duration line.
                    return;
                }
                self.spoken.lock().unwrap().push(text.to_string());
            }

            fn halt(&self) {}
        }

        let speech = Arc::new(FlakySpeech {
            spoken: Mutex::new(Vec::new()),
        });
        let seq = Sequencer::new(SequencerConfig::default(), speech.clone(), None);
        let script = Script::from_steps(vec![
            Step::with_text("before", 0.0),
            Step::with_text("fail", 0.01),
            Step::with_text("after", 0.0),
        ]);

        seq.start(&script).expect("session").await.unwrap();
        assert_eq!(*speech.spoken.lock().unwrap(), vec!["before", "after"]);
    }

    #[tokio::test]
    async fn talking_listener_sees_transitions() {
        let transitions: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
        let listener: TalkingListener = {
            let transitions = Arc::clone(&transitions);
            Some(Arc::new(move |on| transitions.lock().unwrap().push(on)))
        };

        let speech = RecordingSpeech::new(Duration::from_millis(5));
        let seq = Sequencer::new(SequencerConfig::default(), speech, listener);
        let script = Script::from_steps(vec![Step::with_text("hi", 0.0)]);

        seq.start(&script).expect("session").await.unwrap();
        let seen = transitions.lock().unwrap().clone();
        // true for the line, false after it, and the guard's final false.
        assert!(seen.starts_with(&[true, false]));
        assert_eq!(seen.last(), Some(&false));
    }
}
