//! Speech segment player: synthesize one piece of narration, play it through
//! the shared output, and drive the avatar's mouth while it plays.

use crate::voice_output::{AudioOutput, OutputState};
use crate::voicevox::TtsBackend;
use preso_core::{Avatar, RunHandle, TtsParams};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// How a call to [`SpeechPlayer::speak`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Audio played to its natural end.
    Completed,
    /// Synthesis or playback start failed; nothing was played.
    Failed,
    /// The run was cancelled before or during playback.
    Cancelled,
}

/// Lower bound of the lip-sync weight while audio is audible.
const MOUTH_MIN: f32 = 0.4;

pub struct SpeechPlayer {
    tts: Arc<dyn TtsBackend>,
    output: Arc<dyn AudioOutput>,
    avatar: Arc<dyn Avatar>,
    frame: Duration,
    // one segment owns the output at a time
    lease: Mutex<()>,
}

impl SpeechPlayer {
    pub fn new(
        tts: Arc<dyn TtsBackend>,
        output: Arc<dyn AudioOutput>,
        avatar: Arc<dyn Avatar>,
        frame: Duration,
    ) -> Self {
        Self {
            tts,
            output,
            avatar,
            frame: frame.max(Duration::from_millis(1)),
            lease: Mutex::new(()),
        }
    }

    /// Speak one text segment. Failures are logged and reported as
    /// [`SpeakOutcome::Failed`]; they never abort the caller.
    pub async fn speak(
        &self,
        text: &str,
        speaker_id: u32,
        params: &TtsParams,
        run: &RunHandle,
    ) -> SpeakOutcome {
        let _lease = self.lease.lock().await;

        if run.is_cancelled() {
            return SpeakOutcome::Cancelled;
        }
        let audio = match self.tts.synthesize(text, speaker_id, params).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(error = %e, speaker_id, "speech synthesis failed; skipping segment");
                self.avatar.set_speaking(false);
                return SpeakOutcome::Failed;
            }
        };

        // a pause during synthesis holds the new clip until resume
        run.wait_if_paused().await;
        if run.is_cancelled() {
            return SpeakOutcome::Cancelled;
        }

        if let Err(e) = self.output.start(&audio) {
            warn!(error = %e, "audio playback failed to start; skipping segment");
            self.avatar.set_speaking(false);
            return SpeakOutcome::Failed;
        }
        self.avatar.set_speaking(true);
        debug!(speaker_id, chars = text.chars().count(), "narration playing");

        let outcome = self.track_until_end(run).await;
        self.avatar.set_mouth_weight(0.0);
        self.avatar.set_speaking(false);
        outcome
    }

    /// Lip-sync loop, one update per frame until the clip ends or the run is
    /// cancelled.
    async fn track_until_end(&self, run: &RunHandle) -> SpeakOutcome {
        let mut ticker = tokio::time::interval(self.frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = run.cancelled() => {
                    self.output.stop();
                    return SpeakOutcome::Cancelled;
                }
            }
            match self.output.state() {
                OutputState::Playing => {
                    let weight = rand::thread_rng().gen_range(MOUTH_MIN..=1.0);
                    self.avatar.set_mouth_weight(weight);
                }
                OutputState::Paused => self.avatar.set_mouth_weight(0.0),
                OutputState::Idle => return SpeakOutcome::Completed,
            }
        }
    }
}
