//! Playback controller: walks a script's cues in order under
//! play / pause / resume / stop / restart.

use crate::display::SlideDisplay;
use crate::error::PlayerResult;
use crate::narration::Narrator;
use crate::resolver::CueRunner;
use chrono::{DateTime, Utc};
use preso_core::{Avatar, PlaybackControl, PlayerState, PresoConfig, RunHandle, Script};
use preso_voice::{AudioOutput, OutputState, SpeechPlayer, TtsBackend};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Events published by the player
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Started {
        timestamp: DateTime<Utc>,
        start_index: usize,
        cue_count: usize,
    },

    /// A cue began (before its media is shown)
    CueStarted {
        timestamp: DateTime<Utc>,
        index: usize,
        slide: u32,
    },

    Paused {
        timestamp: DateTime<Utc>,
    },

    Resumed {
        timestamp: DateTime<Utc>,
    },

    Stopped {
        timestamp: DateTime<Utc>,
    },

    /// The last cue completed
    Finished {
        timestamp: DateTime<Utc>,
    },

    /// The run aborted on an error
    Failed {
        timestamp: DateTime<Utc>,
        index: usize,
        message: String,
    },
}

pub struct PresoPlayer {
    control: Arc<PlaybackControl>,
    runner: CueRunner,
    avatar: Arc<dyn Avatar>,
    output: Arc<dyn AudioOutput>,
    // held by the loop of the run in progress
    run_lock: tokio::sync::Mutex<()>,
    event_tx: mpsc::UnboundedSender<PlayerEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<PlayerEvent>>>,
}

impl PresoPlayer {
    pub fn new(
        avatar: Arc<dyn Avatar>,
        display: Arc<dyn SlideDisplay>,
        tts: Arc<dyn TtsBackend>,
        output: Arc<dyn AudioOutput>,
        config: &PresoConfig,
    ) -> Self {
        let speech = Arc::new(SpeechPlayer::new(
            tts,
            output.clone(),
            avatar.clone(),
            config.frame_interval(),
        ));
        let runner = CueRunner::new(
            display,
            Narrator::new(speech, avatar.clone()),
            config.slide_name_prefix.clone(),
            config.media_timeout(),
        );
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            control: Arc::new(PlaybackControl::new()),
            runner,
            avatar,
            output,
            run_lock: tokio::sync::Mutex::new(()),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Take the event receiver. Only the first call gets it.
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<PlayerEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    pub fn state(&self) -> PlayerState {
        self.control.state()
    }

    /// Index of the cue being played (0 when idle).
    pub fn current_cue(&self) -> usize {
        self.control.current_cue()
    }

    /// Play `script` from cue `start_index`, stopping any run in progress
    /// first. Resolves when the run ends: all cues done, stopped, or aborted
    /// by an error. The player is `Idle` afterwards in every case.
    pub async fn play(
        &self,
        script: &Script,
        speaker_id: u32,
        start_index: usize,
    ) -> PlayerResult<()> {
        self.stop();
        // the stopped loop lets go of this once it has unwound
        let _running = self.run_lock.lock().await;

        let token = self.control.begin_run(start_index);
        let run = RunHandle::new(self.control.clone(), token.clone());
        self.emit(PlayerEvent::Started {
            timestamp: Utc::now(),
            start_index,
            cue_count: script.cues.len(),
        });

        let mut result = Ok(());
        for (index, cue) in script.cues.iter().enumerate().skip(start_index) {
            if run.is_cancelled() {
                break;
            }
            run.wait_if_paused().await;
            if !self.control.enter_cue(&token, index) {
                break;
            }
            self.emit(PlayerEvent::CueStarted {
                timestamp: Utc::now(),
                index,
                slide: cue.slide,
            });
            debug!(index, slide = cue.slide, "cue started");

            if let Err(e) = self.runner.run_cue(script, cue, speaker_id, &run).await {
                error!(index, error = %e, "playback aborted");
                self.emit(PlayerEvent::Failed {
                    timestamp: Utc::now(),
                    index,
                    message: e.to_string(),
                });
                result = Err(e);
                break;
            }
        }

        self.avatar.set_speaking(false);
        self.avatar.set_mouth_weight(0.0);
        if self.control.finish_run(&token) && result.is_ok() {
            info!(title = %script.title, "presentation finished");
            self.emit(PlayerEvent::Finished {
                timestamp: Utc::now(),
            });
        }
        result
    }

    /// Playing -> Paused. No-op in any other state.
    pub fn pause(&self) -> bool {
        if !self.control.pause() {
            return false;
        }
        self.output.pause();
        self.avatar.set_speaking(false);
        self.emit(PlayerEvent::Paused {
            timestamp: Utc::now(),
        });
        true
    }

    /// Paused -> Playing. No-op in any other state.
    pub fn resume(&self) -> bool {
        if !self.control.resume() {
            return false;
        }
        let held = self.output.state() == OutputState::Paused;
        self.output.resume();
        if held {
            self.avatar.set_speaking(true);
        }
        self.emit(PlayerEvent::Resumed {
            timestamp: Utc::now(),
        });
        true
    }

    /// Playing|Paused -> Idle. No-op when already idle.
    pub fn stop(&self) -> bool {
        if !self.control.stop() {
            return false;
        }
        self.output.stop();
        self.avatar.set_mouth_weight(0.0);
        self.avatar.set_speaking(false);
        self.emit(PlayerEvent::Stopped {
            timestamp: Utc::now(),
        });
        true
    }

    /// Stop, then play from the first cue.
    pub async fn restart(&self, script: &Script, speaker_id: u32) -> PlayerResult<()> {
        self.stop();
        self.play(script, speaker_id, 0).await
    }

    fn emit(&self, event: PlayerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("player event dropped; receiver closed");
        }
    }
}
