//! **Speech client** — remote synthesis plus the single-handle playback rule.
//!
//! `speak` resolves on natural end, playback error, and synthesis failure
//! alike, so the sequencer always advances. `halt` is the kill-switch. At
//! most one sink is live at a time; any new playback tears the previous one
//! down before starting.

use crate::error::{MiraError, MiraResult};
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Speaks one line at a time. Failures are logged and swallowed so the
/// caller's loop is a plain sequential walk over completions.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Speak one line and resolve when playback ends, naturally or not.
    async fn speak(&self, text: &str, voice: &str);

    /// Stop any active playback immediately and release the handle.
    fn halt(&self);
}

/// Placeholder client: logs and resolves immediately. No audio device or
/// gateway needed; use it to exercise the sequencer on headless machines.
#[derive(Debug, Default)]
pub struct PlaceholderSpeech;

#[async_trait]
impl SpeechClient for PlaceholderSpeech {
    async fn speak(&self, text: &str, voice: &str) {
        debug!("placeholder speak ({}): {}", voice, text);
    }

    fn halt(&self) {}
}

/// Client for the TTS gateway: posts `{text, voice, format}` and receives
/// audio bytes. The provider credential stays on the gateway side.
#[derive(Debug, Clone)]
pub struct SynthProxy {
    /// Full endpoint URL (e.g. http://127.0.0.1:8000/api/tts).
    pub endpoint: String,
    /// Container format requested from the gateway.
    pub format: String,
    client: reqwest::Client,
}

impl SynthProxy {
    /// Client for the given endpoint, mp3 format, 60s timeout.
    pub fn new(endpoint: impl Into<String>) -> MiraResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MiraError::Synth(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            format: "mp3".to_string(),
            client,
        })
    }

    /// Endpoint from MIRA_TTS_URL (default http://127.0.0.1:8000/api/tts).
    pub fn from_env() -> MiraResult<Self> {
        let endpoint = std::env::var("MIRA_TTS_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000/api/tts".to_string());
        Self::new(endpoint)
    }

    /// Request a different container format (e.g. "wav").
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Synthesize one line. Blank text short-circuits to empty audio; a
    /// non-success response becomes `MiraError::Synth` with the gateway's
    /// status and message.
    pub async fn synthesize(&self, text: &str, voice: &str) -> MiraResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "text": text,
            "voice": voice,
            "format": self.format,
        });
        let res = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| MiraError::Synth(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(MiraError::Synth(format!("gateway error {}: {}", status, body)));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| MiraError::Synth(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

type SinkSlot = Arc<Mutex<Option<Arc<Sink>>>>;

fn lock_slot(slot: &Mutex<Option<Arc<Sink>>>) -> MutexGuard<'_, Option<Arc<Sink>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum PlayerJob {
    Play {
        bytes: Vec<u8>,
        done: oneshot::Sender<()>,
    },
}

/// Playback engine owning the single active sink.
///
/// The rodio output stream is not `Send`, so it lives on a dedicated thread
/// and playback jobs arrive over a channel. The active sink is shared with
/// the struct so `stop` works from any task while the thread is blocked in
/// `sleep_until_end`.
pub struct VoicePlayer {
    job_tx: mpsc::UnboundedSender<PlayerJob>,
    current: SinkSlot,
}

impl VoicePlayer {
    /// Start the audio thread on the default output device.
    pub fn new() -> MiraResult<Self> {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<PlayerJob>();
        let current: SinkSlot = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let slot = Arc::clone(&current);
        std::thread::spawn(move || {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = ready_tx.send(Err(MiraError::Playback(e.to_string())));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));
            // The stream keeps the output device open; it must outlive every sink.
            let _stream = stream;

            info!("audio thread ready for speech playback");
            while let Some(job) = job_rx.blocking_recv() {
                let PlayerJob::Play { bytes, done } = job;
                match start_sink(&handle, &slot, bytes) {
                    Ok(sink) => {
                        // Blocks until the audio drains or stop() clears the sink.
                        sink.sleep_until_end();
                        release_if_current(&slot, &sink);
                    }
                    Err(e) => warn!("playback failed: {}", e),
                }
                let _ = done.send(());
            }
            debug!("audio thread ended");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { job_tx, current }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MiraError::Playback(
                "audio thread exited before init".to_string(),
            )),
        }
    }

    /// Queue audio bytes and resolve when playback finishes. Empty payloads
    /// and decode/device failures resolve immediately.
    pub async fn play(&self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .job_tx
            .send(PlayerJob::Play {
                bytes,
                done: done_tx,
            })
            .is_err()
        {
            warn!("audio thread gone; dropping playback");
            return;
        }
        let _ = done_rx.await;
    }

    /// Halt the active sink and release it. Safe when nothing is playing.
    pub fn stop(&self) {
        if let Some(sink) = lock_slot(&self.current).take() {
            sink.stop();
        }
    }

    /// Whether a sink is currently owned (playing or pending).
    pub fn is_playing(&self) -> bool {
        lock_slot(&self.current).is_some()
    }
}

/// Tear down any previous sink, then decode and start the new one.
/// Enforces the at-most-one-active-audio invariant at the single place
/// sinks are created.
fn start_sink(handle: &OutputStreamHandle, slot: &SinkSlot, bytes: Vec<u8>) -> MiraResult<Arc<Sink>> {
    if let Some(prev) = lock_slot(slot).take() {
        prev.stop();
    }
    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|e| MiraError::Playback(format!("decode failed: {}", e)))?;
    let sink = Sink::try_new(handle).map_err(|e| MiraError::Playback(e.to_string()))?;
    sink.append(source.convert_samples::<f32>());
    let sink = Arc::new(sink);
    *lock_slot(slot) = Some(Arc::clone(&sink));
    Ok(sink)
}

fn release_if_current(slot: &SinkSlot, sink: &Arc<Sink>) {
    let mut current = lock_slot(slot);
    if let Some(active) = current.as_ref() {
        if Arc::ptr_eq(active, sink) {
            *current = None;
        }
    }
}

/// Production client: gateway synthesis plus local playback.
///
/// A generation counter guards the resumption point after the synthesis
/// await: `halt` bumps it, so a response arriving after a stop is discarded
/// instead of reviving audio for a cancelled session.
pub struct RemoteSpeech {
    synth: SynthProxy,
    player: VoicePlayer,
    generation: AtomicU64,
}

impl RemoteSpeech {
    pub fn new(synth: SynthProxy, player: VoicePlayer) -> Self {
        Self {
            synth,
            player,
            generation: AtomicU64::new(0),
        }
    }

    /// Build from environment: MIRA_TTS_URL plus the default output device.
    pub fn from_env() -> MiraResult<Self> {
        Ok(Self::new(SynthProxy::from_env()?, VoicePlayer::new()?))
    }
}

#[async_trait]
impl SpeechClient for RemoteSpeech {
    async fn speak(&self, text: &str, voice: &str) {
        // Tear down any previous handle before issuing a new request.
        self.player.stop();
        let generation = self.generation.load(Ordering::SeqCst);

        let bytes = match self.synth.synthesize(text, voice).await {
            Ok(b) => b,
            Err(e) => {
                warn!("synthesis failed, skipping line: {}", e);
                return;
            }
        };
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("discarding synthesis response from a halted session");
            return;
        }
        self.player.play(bytes).await;
    }

    fn halt(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.player.stop();
    }
}
