//! The avatar capability consumed by the player.
//!
//! Rendering, skeletal posing and tweening live behind this trait. The player
//! only issues commands and never reads anything back.

use crate::script::Emotion;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Named gestures an avatar can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Nod,
    WaveLeft,
    WaveRight,
    PointLeft,
    PointRight,
    Bow,
    LookSlide,
    LookAudience,
    Present,
    OpenArms,
    Emphasize,
    Agree,
    Disagree,
    Think,
}

#[derive(Error, Debug)]
#[error("gesture {gesture:?} failed: {message}")]
pub struct AvatarError {
    pub gesture: Gesture,
    pub message: String,
}

impl AvatarError {
    pub fn new(gesture: Gesture, message: impl Into<String>) -> Self {
        Self {
            gesture,
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait Avatar: Send + Sync {
    fn set_emotion(&self, emotion: Emotion);

    fn set_speaking(&self, speaking: bool);

    /// Mouth open weight in `0.0..=1.0`.
    fn set_mouth_weight(&self, weight: f32);

    /// Start a gesture and return at once; the avatar finishes it on its own.
    fn trigger(&self, gesture: Gesture, duration: Option<Duration>) -> Result<(), AvatarError>;

    /// Perform a gesture; resolves once it has completed and the pose is restored.
    async fn gesture(
        &self,
        gesture: Gesture,
        duration: Option<Duration>,
    ) -> Result<(), AvatarError>;
}

/// Headless avatar that logs every command. Gestures take their requested time.
#[derive(Debug, Default)]
pub struct TracingAvatar;

#[async_trait::async_trait]
impl Avatar for TracingAvatar {
    fn set_emotion(&self, emotion: Emotion) {
        info!(emotion = emotion.as_str(), "avatar emotion");
    }

    fn set_speaking(&self, speaking: bool) {
        tracing::debug!(speaking, "avatar speaking");
    }

    fn set_mouth_weight(&self, weight: f32) {
        tracing::trace!(weight, "avatar mouth");
    }

    fn trigger(&self, gesture: Gesture, duration: Option<Duration>) -> Result<(), AvatarError> {
        info!(?gesture, ?duration, "avatar gesture started");
        Ok(())
    }

    async fn gesture(
        &self,
        gesture: Gesture,
        duration: Option<Duration>,
    ) -> Result<(), AvatarError> {
        info!(?gesture, ?duration, "avatar gesture");
        if let Some(duration) = duration {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}
