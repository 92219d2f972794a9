//! Speaks narration text with its inline stage directions.

use crate::actions;
use preso_core::{parse_inline, speakable_text, Avatar, RunHandle, Token, TtsParams};
use preso_voice::SpeechPlayer;
use std::sync::Arc;
use tracing::trace;

pub struct Narrator {
    speech: Arc<SpeechPlayer>,
    avatar: Arc<dyn Avatar>,
}

impl Narrator {
    pub fn new(speech: Arc<SpeechPlayer>, avatar: Arc<dyn Avatar>) -> Self {
        Self { speech, avatar }
    }

    pub fn avatar(&self) -> &Arc<dyn Avatar> {
        &self.avatar
    }

    /// Walk the text's segments in order: text is spoken, tags act on the
    /// avatar. Each segment passes the pause gate first and nothing runs
    /// after cancellation.
    pub async fn speak_segments(
        &self,
        text: &str,
        speaker_id: u32,
        params: &TtsParams,
        run: &RunHandle,
    ) {
        for token in parse_inline(text) {
            run.wait_if_paused().await;
            if run.is_cancelled() {
                return;
            }
            match token {
                Token::Action(tag) => {
                    trace!(action = %tag.action, "inline action");
                    actions::perform(&self.avatar, &tag, run).await;
                }
                Token::Text(text) => {
                    let line = speakable_text(&text);
                    if line.is_empty() {
                        continue;
                    }
                    self.speech.speak(&line, speaker_id, params, run).await;
                }
            }
        }
    }
}
