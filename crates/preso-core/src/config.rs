//! Player configuration.
//!
//! | Key (env `PRESO__<KEY>`) | Default | Description |
//! |-----|---------|-------------|
//! | voicevox_url | `http://127.0.0.1:50021` | VOICEVOX engine base URL. |
//! | synthesis_timeout_secs | 30 | Upper bound for one synthesis request. |
//! | media_timeout_secs | 10 | Upper bound for loading one still image. |
//! | slides_dir | `public/slides` | Directory holding slide images and videos. |
//! | script_path | `public/script.json` | Script file. |
//! | default_speaker_id | 1 | Speaker when neither cue nor script sets one. |
//! | lip_sync_fps | 60 | Lip-sync and playback polling rate. |
//! | slide_name_prefix | `スライド` | Localized base name tried for numbered slides. |
//! | video_fallback_secs | 5 | Console display: assumed length of a video. |
//!
//! Environment keys use `__` after the prefix too, e.g. `PRESO__VOICEVOX_URL`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresoConfig {
    pub voicevox_url: String,
    pub synthesis_timeout_secs: u64,
    pub media_timeout_secs: u64,
    pub slides_dir: String,
    pub script_path: String,
    pub default_speaker_id: u32,
    pub lip_sync_fps: u32,
    pub slide_name_prefix: String,
    pub video_fallback_secs: u64,
}

impl Default for PresoConfig {
    fn default() -> Self {
        Self {
            voicevox_url: "http://127.0.0.1:50021".to_string(),
            synthesis_timeout_secs: 30,
            media_timeout_secs: 10,
            slides_dir: "public/slides".to_string(),
            script_path: "public/script.json".to_string(),
            default_speaker_id: 1,
            lip_sync_fps: 60,
            slide_name_prefix: "スライド".to_string(),
            video_fallback_secs: 5,
        }
    }
}

impl PresoConfig {
    /// Load config from file and environment. Precedence: `PRESO__*` env vars >
    /// file at `PRESO_CONFIG` (default `config/preso.toml`) > defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("PRESO_CONFIG").unwrap_or_else(|_| "config/preso.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same layering as [`PresoConfig::load`] with an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let d = PresoConfig::default();
        let builder = config::Config::builder()
            .set_default("voicevox_url", d.voicevox_url)?
            .set_default("synthesis_timeout_secs", d.synthesis_timeout_secs as i64)?
            .set_default("media_timeout_secs", d.media_timeout_secs as i64)?
            .set_default("slides_dir", d.slides_dir)?
            .set_default("script_path", d.script_path)?
            .set_default("default_speaker_id", d.default_speaker_id as i64)?
            .set_default("lip_sync_fps", d.lip_sync_fps as i64)?
            .set_default("slide_name_prefix", d.slide_name_prefix)?
            .set_default("video_fallback_secs", d.video_fallback_secs as i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("PRESO").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs.max(1))
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs.max(1))
    }

    /// Interval between lip-sync updates.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.lip_sync_fps.clamp(1, 240)))
    }
}
