//! Script Demo — load (or seed) a script and play it once.
//!
//! Uses `RemoteSpeech` when MIRA_TTS_URL points at a running gateway and an
//! audio output device exists, else falls back to `PlaceholderSpeech` so the
//! sequencing and pulse loop can be watched headless.
//!
//! Set OPENAI_API_KEY on the gateway side (never here) to hear Mira speak.

use mira_voice::{
    NullSink, PlaceholderSpeech, RemoteSpeech, ScriptStore, SpeechClient, TapOutcome, VoiceApp,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let speech: Arc<dyn SpeechClient> = match RemoteSpeech::from_env() {
        Ok(s) => {
            info!("Using RemoteSpeech (gateway at MIRA_TTS_URL).");
            Arc::new(s)
        }
        Err(e) => {
            info!("Using PlaceholderSpeech ({}).", e);
            Arc::new(PlaceholderSpeech)
        }
    };

    let mut app = VoiceApp::new(ScriptStore::open_default(), speech, Arc::new(NullSink));

    if app.script().playable().is_empty() {
        info!("Seeding a starter script (edit {:?} to change it).", ScriptStore::default_path());
        let a = app.add_step();
        app.update_step(a, Some("Hi, I'm Mira.".into()), Some(0.5));
        let b = app.add_step();
        app.update_step(b, Some("Tap anywhere to stop me.".into()), Some(0.0));
    }

    info!("Tap: starting playback of {} steps.", app.script().playable().len());
    match app.tap() {
        TapOutcome::Started => {}
        outcome => {
            info!("Tap did not start playback: {:?}", outcome);
            return Ok(());
        }
    }

    // Wait for the session to finish (a second tap would stop it early).
    while app.sequencer().is_active() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    info!("Session complete.");
    Ok(())
}
