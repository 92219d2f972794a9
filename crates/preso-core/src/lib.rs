//! preso-core: presentation script model, inline stage directions, player
//! configuration, and the playback control primitives shared by the voice
//! and player crates.

pub mod avatar;
pub mod config;
pub mod control;
pub mod error;
pub mod inline;
pub mod library;
pub mod script;

pub use avatar::{Avatar, AvatarError, Gesture, TracingAvatar};
pub use config::PresoConfig;
pub use control::{CancelToken, PlaybackControl, PlayerState, RunHandle};
pub use error::{ConfigError, ScriptError, ScriptResult};
pub use inline::{parse_inline, speakable_text, Action, ActionTag, InlineTokens, Token};
pub use library::{is_image_name, is_video_name, list_media, unique_media_name};
pub use script::{Cue, Emotion, NarrationItem, Script, ScriptDefaults, TtsParams, VideoWait};
