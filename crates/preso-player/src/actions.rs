//! Inline stage directions mapped onto avatar effects.

use preso_core::{Action, ActionTag, Avatar, Emotion, Gesture, RunHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What an inline action does to the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEffect {
    /// Play a gesture. `awaited` gestures hold the narration until they end;
    /// the rest are started and left to run.
    Gesture {
        gesture: Gesture,
        default_ms: Option<u64>,
        awaited: bool,
    },
    Emotion(Emotion),
    /// Hold the narration for the tag's duration.
    Wait,
}

pub fn effect_of(action: Action) -> ActionEffect {
    let started = |gesture, ms| ActionEffect::Gesture {
        gesture,
        default_ms: ms,
        awaited: false,
    };
    let awaited = |gesture, ms| ActionEffect::Gesture {
        gesture,
        default_ms: Some(ms),
        awaited: true,
    };
    match action {
        Action::Nod => started(Gesture::Nod, Some(400)),
        Action::Wave | Action::WaveR => started(Gesture::WaveRight, Some(900)),
        Action::WaveL => started(Gesture::WaveLeft, Some(900)),
        Action::PointR => started(Gesture::PointRight, Some(800)),
        Action::PointL => started(Gesture::PointLeft, Some(800)),
        Action::Bow => started(Gesture::Bow, Some(600)),
        Action::LookSlide => started(Gesture::LookSlide, Some(1000)),
        Action::LookAudience => started(Gesture::LookAudience, None),
        Action::Happy => ActionEffect::Emotion(Emotion::Happy),
        Action::Angry => ActionEffect::Emotion(Emotion::Angry),
        Action::Surprised => ActionEffect::Emotion(Emotion::Surprised),
        Action::Neutral => ActionEffect::Emotion(Emotion::Neutral),
        Action::Sad => ActionEffect::Emotion(Emotion::Sad),
        Action::Wait => ActionEffect::Wait,
        Action::Present => awaited(Gesture::Present, 1200),
        Action::OpenArms => awaited(Gesture::OpenArms, 900),
        Action::Emphasize => awaited(Gesture::Emphasize, 600),
        Action::Agree => awaited(Gesture::Agree, 800),
        Action::Disagree => awaited(Gesture::Disagree, 800),
        Action::Think => awaited(Gesture::Think, 800),
    }
}

/// Carry out one inline action. Gesture failures are logged and swallowed so
/// the narration continues. A `wait` ends early when the run is cancelled.
pub async fn perform(avatar: &Arc<dyn Avatar>, tag: &ActionTag, run: &RunHandle) {
    match effect_of(tag.action) {
        ActionEffect::Emotion(emotion) => avatar.set_emotion(emotion),
        ActionEffect::Wait => {
            let Some(ms) = tag.duration_ms.filter(|ms| *ms > 0) else {
                return;
            };
            debug!(ms, "inline wait");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(u64::from(ms))) => {}
                _ = run.cancelled() => {}
            }
        }
        ActionEffect::Gesture {
            gesture,
            default_ms,
            awaited,
        } => {
            let duration = tag
                .duration_ms
                .map(u64::from)
                .or(default_ms)
                .map(Duration::from_millis);
            let result = if awaited {
                avatar.gesture(gesture, duration).await
            } else {
                avatar.trigger(gesture, duration)
            };
            if let Err(e) = result {
                warn!(error = %e, tag = %tag.raw, "inline action failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_has_an_effect() {
        let gestures = Action::ALL
            .iter()
            .filter(|a| matches!(effect_of(**a), ActionEffect::Gesture { .. }))
            .count();
        let emotions = Action::ALL
            .iter()
            .filter(|a| matches!(effect_of(**a), ActionEffect::Emotion(_)))
            .count();
        assert_eq!(gestures, 15);
        assert_eq!(emotions, 5);
        assert_eq!(effect_of(Action::Wait), ActionEffect::Wait);
    }

    #[test]
    fn wave_is_right_handed_and_started() {
        assert_eq!(
            effect_of(Action::Wave),
            ActionEffect::Gesture {
                gesture: Gesture::WaveRight,
                default_ms: Some(900),
                awaited: false,
            }
        );
        assert_eq!(
            effect_of(Action::LookAudience),
            ActionEffect::Gesture {
                gesture: Gesture::LookAudience,
                default_ms: None,
                awaited: false,
            }
        );
    }

    #[test]
    fn presentation_gestures_are_awaited() {
        for action in [
            Action::Present,
            Action::OpenArms,
            Action::Emphasize,
            Action::Agree,
            Action::Disagree,
            Action::Think,
        ] {
            assert!(matches!(
                effect_of(action),
                ActionEffect::Gesture { awaited: true, .. }
            ));
        }
    }
}
