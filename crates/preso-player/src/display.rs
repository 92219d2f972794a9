//! The slide display capability and a folder-backed implementation.
//!
//! A display shows one still image or video at a time. The player asks it to
//! show media, waits on its video clock for narration triggers, and ducks its
//! volume under speech.

use crate::error::DisplayError;
use preso_core::{is_video_name, PresoConfig};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowOptions {
    /// For videos: resolve `show` only once playback has ended.
    pub wait_for_end: bool,
}

#[async_trait::async_trait]
pub trait SlideDisplay: Send + Sync {
    /// Show an image or video by file name. Resolves when the media is on
    /// screen, or when the video ended if `wait_for_end` is set.
    async fn show(&self, name: &str, options: ShowOptions) -> Result<(), DisplayError>;

    /// True while the current media is a video.
    fn is_video_active(&self) -> bool;

    /// Resolves once the active video reaches `secs` (or ends). Returns at
    /// once when no video is active or the position was already reached.
    async fn wait_until_playback_time(&self, secs: f64);

    /// Video volume in `0.0..=1.0`.
    fn video_volume(&self) -> f32;

    fn set_video_volume(&self, volume: f32);

    /// Caption for the current cue.
    fn set_subtitle(&self, _text: &str) {}
}

#[derive(Debug, Clone, Copy)]
struct VideoClock {
    started: Instant,
    length: Duration,
}

impl VideoClock {
    fn remaining_until(&self, secs: f64) -> Duration {
        let target = Duration::try_from_secs_f64(secs.max(0.0))
            .unwrap_or(Duration::MAX)
            .min(self.length);
        target.saturating_sub(self.started.elapsed())
    }
}

#[derive(Debug)]
struct Screen {
    current: Option<String>,
    video: Option<VideoClock>,
    volume: f32,
}

/// Display over a slides directory without a window. A file must exist to be
/// shown; videos run on a simulated clock of fixed length.
#[derive(Debug)]
pub struct FolderDisplay {
    root: PathBuf,
    video_length: Duration,
    screen: Mutex<Screen>,
}

impl FolderDisplay {
    pub fn new(root: impl Into<PathBuf>, video_length: Duration) -> Self {
        Self {
            root: root.into(),
            video_length,
            screen: Mutex::new(Screen {
                current: None,
                video: None,
                volume: 1.0,
            }),
        }
    }

    pub fn from_config(config: &PresoConfig) -> Self {
        Self::new(
            &config.slides_dir,
            Duration::from_secs(config.video_fallback_secs),
        )
    }

    /// Name of the media currently on screen.
    pub fn current(&self) -> Option<String> {
        self.screen().current.clone()
    }

    fn screen(&self) -> MutexGuard<'_, Screen> {
        self.screen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl SlideDisplay for FolderDisplay {
    async fn show(&self, name: &str, options: ShowOptions) -> Result<(), DisplayError> {
        let path = self.root.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                debug!(path = %path.display(), "no such media file");
                return Err(DisplayError::NotFound(name.to_string()));
            }
        }

        if !is_video_name(name) {
            let mut screen = self.screen();
            screen.current = Some(name.to_string());
            screen.video = None;
            info!(media = name, "slide shown");
            return Ok(());
        }

        {
            let mut screen = self.screen();
            screen.current = Some(name.to_string());
            screen.video = Some(VideoClock {
                started: Instant::now(),
                length: self.video_length,
            });
        }
        info!(media = name, wait_for_end = options.wait_for_end, "video started");
        if options.wait_for_end {
            tokio::time::sleep(self.video_length).await;
            info!(media = name, "video ended");
        }
        Ok(())
    }

    fn is_video_active(&self) -> bool {
        self.screen().video.is_some()
    }

    async fn wait_until_playback_time(&self, secs: f64) {
        let video = self.screen().video;
        let Some(clock) = video else {
            return;
        };
        let remaining = clock.remaining_until(secs);
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
    }

    fn video_volume(&self) -> f32 {
        self.screen().volume
    }

    fn set_video_volume(&self, volume: f32) {
        self.screen().volume = volume.clamp(0.0, 1.0);
    }

    fn set_subtitle(&self, text: &str) {
        if !text.trim().is_empty() {
            info!(subtitle = text, "subtitle");
        }
    }
}
