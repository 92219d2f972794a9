//! Playback control primitives: the run state machine, per-run cancellation
//! and the pause gate.
//!
//! `PlaybackControl` is the only place run state changes. The state lives in
//! a `tokio::sync::watch` channel so anything blocked on the pause gate wakes
//! as soon as `resume` or `stop` moves the state off `Paused`.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

/// Externally visible player state. `stop` is a transition back to `Idle`,
/// not a held state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, PlayerState::Idle)
    }
}

/// Cooperative cancellation flag scoped to one `play()` run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn same_run(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

#[derive(Debug, Default)]
struct RunSlot {
    token: Option<CancelToken>,
    current_cue: usize,
}

/// Run state of one player instance.
#[derive(Debug)]
pub struct PlaybackControl {
    state: watch::Sender<PlayerState>,
    run: Mutex<RunSlot>,
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackControl {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(PlayerState::Idle);
        Self {
            state,
            run: Mutex::new(RunSlot::default()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        // never held across an await, so poisoning only follows a panic in here
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    pub fn current_cue(&self) -> usize {
        self.slot().current_cue
    }

    /// Record that `token`'s run moved to cue `index`. Ignored for a run that
    /// has already been stopped or replaced.
    pub fn enter_cue(&self, token: &CancelToken, index: usize) -> bool {
        let mut slot = self.slot();
        match &slot.token {
            Some(current) if current.same_run(token) && !token.is_cancelled() => {
                slot.current_cue = index;
                true
            }
            _ => false,
        }
    }

    /// Idle -> Playing with a fresh cancellation token.
    pub fn begin_run(&self, start_index: usize) -> CancelToken {
        let token = CancelToken::new();
        {
            let mut slot = self.slot();
            slot.token = Some(token.clone());
            slot.current_cue = start_index;
        }
        self.state.send_replace(PlayerState::Playing);
        info!(start_index, "playback started");
        token
    }

    /// Playing -> Paused. Returns false (and changes nothing) otherwise.
    pub fn pause(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s == PlayerState::Playing {
                *s = PlayerState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            info!("playback paused");
        }
        changed
    }

    /// Paused -> Playing; releases the pause gate.
    pub fn resume(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s == PlayerState::Paused {
                *s = PlayerState::Playing;
                true
            } else {
                false
            }
        });
        if changed {
            info!("playback resumed");
        }
        changed
    }

    /// Playing|Paused -> Idle: cancels the run, releases the pause gate and
    /// rewinds the cue index.
    pub fn stop(&self) -> bool {
        if !self.state().is_active() {
            return false;
        }
        let token = {
            let mut slot = self.slot();
            slot.current_cue = 0;
            slot.token.take()
        };
        if let Some(token) = token {
            token.cancel();
        }
        self.state.send_replace(PlayerState::Idle);
        info!("playback stopped");
        true
    }

    /// End of a run. Only resets state if `token` still owns the control, so a
    /// stale loop cannot clobber a newer run.
    pub fn finish_run(&self, token: &CancelToken) -> bool {
        {
            let mut slot = self.slot();
            match &slot.token {
                Some(current) if current.same_run(token) => {
                    slot.token = None;
                    slot.current_cue = 0;
                }
                _ => return false,
            }
        }
        self.state.send_replace(PlayerState::Idle);
        debug!("playback run finished");
        true
    }

    /// The pause gate: returns immediately unless paused, otherwise blocks
    /// until `resume` or `stop` (or cancellation of `token`).
    pub async fn wait_if_paused(&self, token: &CancelToken) {
        let mut rx = self.state.subscribe();
        if *rx.borrow_and_update() != PlayerState::Paused {
            return;
        }
        debug!("pause gate engaged");
        tokio::select! {
            _ = rx.wait_for(|s| *s != PlayerState::Paused) => {}
            _ = token.cancelled() => {}
        }
        debug!("pause gate released");
    }
}

/// What a running cue sees of the controller: its cancellation token and the
/// pause gate.
#[derive(Debug, Clone)]
pub struct RunHandle {
    control: Arc<PlaybackControl>,
    token: CancelToken,
}

impl RunHandle {
    pub fn new(control: Arc<PlaybackControl>, token: CancelToken) -> Self {
        Self { control, token }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub async fn wait_if_paused(&self) {
        self.control.wait_if_paused(&self.token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pause_and_resume_only_from_matching_state() {
        let control = PlaybackControl::new();
        assert!(!control.pause());
        assert!(!control.resume());
        assert!(!control.stop());
        assert_eq!(control.state(), PlayerState::Idle);

        let _token = control.begin_run(2);
        assert_eq!(control.current_cue(), 2);
        assert!(!control.resume());
        assert!(control.pause());
        assert!(!control.pause());
        assert_eq!(control.state(), PlayerState::Paused);
        assert!(control.resume());
        assert_eq!(control.state(), PlayerState::Playing);
    }

    #[test]
    fn stop_cancels_and_rewinds() {
        let control = PlaybackControl::new();
        let token = control.begin_run(3);
        assert!(control.stop());
        assert!(token.is_cancelled());
        assert_eq!(control.current_cue(), 0);
        assert_eq!(control.state(), PlayerState::Idle);
    }

    #[test]
    fn stale_run_cannot_reset_newer_run() {
        let control = PlaybackControl::new();
        let old = control.begin_run(0);
        control.stop();
        let new = control.begin_run(0);
        assert!(!control.enter_cue(&old, 4));
        assert!(control.enter_cue(&new, 1));
        assert_eq!(control.current_cue(), 1);
        assert!(!control.finish_run(&old));
        assert_eq!(control.state(), PlayerState::Playing);
        assert!(control.finish_run(&new));
        assert_eq!(control.state(), PlayerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_releases_on_resume() {
        let control = Arc::new(PlaybackControl::new());
        let token = control.begin_run(0);
        control.pause();
        let waiter = {
            let control = Arc::clone(&control);
            let token = token.clone();
            tokio::spawn(async move { control.wait_if_paused(&token).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        control.resume();
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn gate_releases_on_stop() {
        let control = Arc::new(PlaybackControl::new());
        let token = control.begin_run(0);
        control.pause();
        let waiter = {
            let control = Arc::clone(&control);
            let token = token.clone();
            tokio::spawn(async move {
                control.wait_if_paused(&token).await;
                token.is_cancelled()
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        control.stop();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn gate_is_open_when_not_paused() {
        let control = PlaybackControl::new();
        let token = control.begin_run(0);
        control.wait_if_paused(&token).await;
        token.cancel();
        token.cancelled().await;
    }
}
