//! # Mira Voice — scripted voice playback
//!
//! One tap toggles playback of a short, user-authored script: each line is
//! synthesized by a remote TTS gateway, played locally, and mirrored by a
//! pulsing visual that follows the talking state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         VoiceApp                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//! │  │ GestureRouter│ → │  Sequencer   │ → │ SpeechClient │     │
//! │  │ (tap toggle) │   │ (one session)│   │ (synth+play) │     │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘     │
//! │                            │ talking                        │
//! │  ┌──────────────┐   ┌──────▼───────┐                        │
//! │  │ ScriptStore  │   │ PulseAnimator│ → VisualSink           │
//! │  │ (JSON slot)  │   │ (frame loop) │                        │
//! │  └──────────────┘   └──────────────┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod error;
pub mod gesture;
pub mod pulse;
pub mod script;
pub mod sequencer;
pub mod speech;
pub mod store;

pub use app::VoiceApp;
pub use error::{MiraError, MiraResult};
pub use gesture::{GestureRouter, TapOutcome};
pub use pulse::{displacement, NullSink, PulseAnimator, PulseConfig, PulseState, VisualSink};
pub use script::{Script, Step};
pub use sequencer::{Sequencer, SequencerConfig, TalkingListener};
pub use speech::{PlaceholderSpeech, RemoteSpeech, SpeechClient, SynthProxy, VoicePlayer};
pub use store::ScriptStore;
