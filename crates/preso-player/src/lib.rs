//! # preso-player - scripted, avatar-narrated presentations
//!
//! Plays a [`preso_core::Script`] cue by cue: each cue puts a slide image or
//! video on a [`SlideDisplay`], then speaks its narration through
//! [`preso_voice::SpeechPlayer`] while inline stage directions drive the
//! avatar.
//!
//! ```text
//! PresoPlayer ── PlaybackControl (state, pause gate, cancel token)
//!     │
//!     └─ CueRunner ── resolve media ──> SlideDisplay
//!            │
//!            └─ Narrator ── text ──> SpeechPlayer ──> AudioOutput
//!                      └─── tags ──> Avatar
//! ```

pub mod actions;
pub mod display;
pub mod error;
pub mod narration;
pub mod player;
pub mod resolver;

pub use actions::{effect_of, ActionEffect};
pub use display::{FolderDisplay, ShowOptions, SlideDisplay};
pub use error::{DisplayError, PlayerError, PlayerResult};
pub use narration::Narrator;
pub use player::{PlayerEvent, PresoPlayer};
pub use resolver::{image_candidates, plan_narration, CueRunner, MediaOutcome, NarrationPlan};
