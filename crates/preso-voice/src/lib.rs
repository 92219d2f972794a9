//! # preso-voice - narration audio for the presentation player
//!
//! Synthesizes narration with a VOICEVOX engine, plays it through a single
//! shared audio output, and keeps the avatar's mouth moving while it plays.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     SpeechPlayer                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌─────────────┐  │
//! │  │  TtsBackend  │ → │ AudioOutput  │ → │  Lip-sync   │  │
//! │  │  (VOICEVOX)  │   │   (rodio)    │   │  (avatar)   │  │
//! │  └──────────────┘   └──────────────┘   └─────────────┘  │
//! │          ↑ cancellation / pause gate (RunHandle)         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod speech;
pub mod voice_output;
pub mod voicevox;

pub use error::{VoiceError, VoiceResult};
pub use speech::{SpeakOutcome, SpeechPlayer};
pub use voice_output::{
    default_output, wav_duration, AudioOutput, OutputState, RodioOutput, SilentOutput,
};
pub use voicevox::{apply_params, PlaceholderTts, Speaker, SpeakerStyle, TtsBackend, VoicevoxTts};
