//! Cue resolution: which media a cue shows, and how its narration is
//! scheduled against that media.

use crate::display::{ShowOptions, SlideDisplay};
use crate::error::{DisplayError, PlayerError, PlayerResult};
use crate::narration::Narrator;
use preso_core::{
    is_image_name, is_video_name, Cue, NarrationItem, RunHandle, Script, TtsParams, VideoWait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Extensions tried, in order, for a slide without an explicit image file.
pub const CANDIDATE_EXTENSIONS: [&str; 6] = [".png", ".PNG", ".jpg", ".JPG", ".jpeg", ".JPEG"];

/// Video volume ceiling while narration speaks over it.
pub const DUCK_CEILING: f32 = 0.25;

/// What ended up on screen for a cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    Image { name: String },
    /// `waited` is true when `show` returned only after the video ended.
    Video { name: String, waited: bool },
}

/// A cue's video file: `video`, or an `image` that names a video.
pub fn cue_video(cue: &Cue) -> Option<&str> {
    fn set(s: &Option<String>) -> Option<&str> {
        s.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
    set(&cue.video).or_else(|| set(&cue.image).filter(|name| is_video_name(name)))
}

/// Image file names to try for a cue, in order, without duplicates.
pub fn image_candidates(cue: &Cue, prefix: &str) -> Vec<String> {
    let given = cue.image.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(name) = given.filter(|name| is_image_name(name)) {
        return vec![name.to_string()];
    }
    let bases = match given {
        Some(name) => vec![name.to_string()],
        None => vec![
            cue.slide.to_string(),
            format!("{:02}", cue.slide),
            format!("{prefix}{}", cue.slide),
        ],
    };
    let mut out: Vec<String> = Vec::with_capacity(bases.len() * CANDIDATE_EXTENSIONS.len());
    for base in &bases {
        for ext in CANDIDATE_EXTENSIONS {
            let name = format!("{base}{ext}");
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

/// How a cue's narration is scheduled.
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationPlan<'a> {
    /// Time-coded items in ascending trigger order.
    Timed(Vec<&'a NarrationItem>),
    /// Subtitle spoken once the video has ended.
    AfterVideo(&'a str),
    /// Subtitle spoken as soon as the media is up.
    Immediate(&'a str),
    Silent,
}

pub fn plan_narration<'a>(cue: &'a Cue, media: &MediaOutcome) -> NarrationPlan<'a> {
    let items = cue.narration_items();
    if !items.is_empty() {
        let mut ordered: Vec<&NarrationItem> = items.iter().collect();
        // stable: equal triggers keep authoring order
        ordered.sort_by(|a, b| a.trigger_secs().total_cmp(&b.trigger_secs()));
        return NarrationPlan::Timed(ordered);
    }
    let subtitle = cue.subtitle_text();
    if subtitle.trim().is_empty() {
        return NarrationPlan::Silent;
    }
    match media {
        MediaOutcome::Video { waited, .. } if *waited || cue.video_wait() == VideoWait::End => {
            NarrationPlan::AfterVideo(subtitle)
        }
        _ => NarrationPlan::Immediate(subtitle),
    }
}

/// Runs single cues against the display and narrator.
pub struct CueRunner {
    display: Arc<dyn SlideDisplay>,
    narrator: Narrator,
    slide_prefix: String,
    media_timeout: Duration,
}

impl CueRunner {
    pub fn new(
        display: Arc<dyn SlideDisplay>,
        narrator: Narrator,
        slide_prefix: impl Into<String>,
        media_timeout: Duration,
    ) -> Self {
        Self {
            display,
            narrator,
            slide_prefix: slide_prefix.into(),
            media_timeout,
        }
    }

    /// Show the cue's media, then speak its narration. Returns `Ok` early when
    /// the run is cancelled.
    pub async fn run_cue(
        &self,
        script: &Script,
        cue: &Cue,
        fallback_speaker: u32,
        run: &RunHandle,
    ) -> PlayerResult<()> {
        let Some(media) = self.resolve_media(cue, run).await? else {
            return Ok(());
        };

        let avatar = self.narrator.avatar();
        if let Some(emotion) = cue.emotion {
            avatar.set_emotion(emotion);
        }
        self.display.set_subtitle(cue.subtitle_text());

        let speaker = script.cue_speaker(cue, fallback_speaker);
        let tts = script.cue_tts(cue);
        match plan_narration(cue, &media) {
            NarrationPlan::Timed(items) => {
                self.run_timed(cue, &items, speaker, &tts, run).await;
            }
            NarrationPlan::AfterVideo(text) | NarrationPlan::Immediate(text) => {
                self.narrator.speak_segments(text, speaker, &tts, run).await;
            }
            NarrationPlan::Silent => debug!(slide = cue.slide, "cue has no narration"),
        }
        Ok(())
    }

    /// Put the cue's media on screen. `None` means the run was cancelled
    /// while waiting on the display.
    pub async fn resolve_media(
        &self,
        cue: &Cue,
        run: &RunHandle,
    ) -> PlayerResult<Option<MediaOutcome>> {
        if let Some(name) = cue_video(cue) {
            let wait_for_end = cue.video_wait() == VideoWait::End;
            let shown = tokio::select! {
                shown = self.display.show(name, ShowOptions { wait_for_end }) => shown,
                _ = run.cancelled() => return Ok(None),
            };
            return match shown {
                Ok(()) => Ok(Some(MediaOutcome::Video {
                    name: name.to_string(),
                    waited: wait_for_end,
                })),
                Err(DisplayError::NotFound(_)) => {
                    error!(slide = cue.slide, media = name, "video not found");
                    Err(PlayerError::MediaNotFound {
                        slide: cue.slide,
                        tried: vec![name.to_string()],
                    })
                }
                Err(e) => {
                    error!(slide = cue.slide, media = name, error = %e, "video failed to load");
                    Err(e.into())
                }
            };
        }

        let candidates = image_candidates(cue, &self.slide_prefix);
        for name in &candidates {
            if run.is_cancelled() {
                return Ok(None);
            }
            let shown = tokio::time::timeout(
                self.media_timeout,
                self.display.show(name, ShowOptions::default()),
            )
            .await
            .unwrap_or_else(|_| Err(DisplayError::Timeout(name.clone())));
            match shown {
                Ok(()) => {
                    info!(slide = cue.slide, media = %name, "slide resolved");
                    return Ok(Some(MediaOutcome::Image { name: name.clone() }));
                }
                Err(DisplayError::NotFound(_)) => debug!(media = %name, "candidate missing"),
                Err(e) => warn!(media = %name, error = %e, "candidate failed to load"),
            }
        }
        error!(slide = cue.slide, tried = candidates.len(), "no slide image found");
        Err(PlayerError::MediaNotFound {
            slide: cue.slide,
            tried: candidates,
        })
    }

    async fn run_timed(
        &self,
        cue: &Cue,
        items: &[&NarrationItem],
        speaker: u32,
        tts: &TtsParams,
        run: &RunHandle,
    ) {
        let avatar = self.narrator.avatar();
        for item in items {
            run.wait_if_paused().await;
            if run.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = self.display.wait_until_playback_time(item.trigger_secs()) => {}
                _ = run.cancelled() => return,
            }
            if let Some(emotion) = item.emotion {
                avatar.set_emotion(emotion);
            }

            let restore = (cue.ducks_video() && self.display.is_video_active()).then(|| {
                let volume = self.display.video_volume();
                self.display.set_video_volume(volume.min(DUCK_CEILING));
                volume
            });
            let item_speaker = item.speaker_id.unwrap_or(speaker);
            let item_tts = tts.merged_opt(item.tts.as_ref());
            self.narrator
                .speak_segments(&item.text, item_speaker, &item_tts, run)
                .await;
            if let Some(volume) = restore {
                self.display.set_video_volume(volume);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(at: f64, text: &str) -> NarrationItem {
        NarrationItem {
            at: Some(at),
            text: text.to_string(),
            ..Default::default()
        }
    }

    fn image() -> MediaOutcome {
        MediaOutcome::Image { name: "1.png".into() }
    }

    #[test]
    fn numbered_slide_candidates() {
        let cue = Cue {
            slide: 3,
            ..Default::default()
        };
        let names = image_candidates(&cue, "スライド");
        assert_eq!(names.len(), 18);
        assert_eq!(&names[..2], &["3.png", "3.PNG"]);
        assert_eq!(names[6], "03.png");
        assert_eq!(names[12], "スライド3.png");
        assert_eq!(names[17], "スライド3.JPEG");
    }

    #[test]
    fn two_digit_slides_do_not_repeat_candidates() {
        let cue = Cue {
            slide: 12,
            ..Default::default()
        };
        let names = image_candidates(&cue, "slide");
        assert_eq!(names.len(), 12);
        assert_eq!(names[6], "slide12.png");
    }

    #[test]
    fn explicit_image_names() {
        assert_eq!(image_candidates(&Cue::image(1, "cover.JPG"), "x"), vec!["cover.JPG"]);
        let bare = image_candidates(&Cue::image(1, "cover"), "x");
        assert_eq!(bare.first().map(String::as_str), Some("cover.png"));
        assert_eq!(bare.len(), 6);
    }

    #[test]
    fn video_detection() {
        assert_eq!(cue_video(&Cue::image(1, "clip.MOV")), Some("clip.MOV"));
        assert_eq!(cue_video(&Cue::image(1, "a.png")), None);
        let cue = Cue {
            video: Some("  ".into()),
            ..Cue::image(1, "a.png")
        };
        assert_eq!(cue_video(&cue), None);
        assert_eq!(
            cue_video(&Cue::video(1, "b.webm", VideoWait::End)),
            Some("b.webm")
        );
    }

    #[test]
    fn narration_items_are_stably_ordered() {
        let cue = Cue::image(1, "1.png").with_subtitle("ignored").with_narration(vec![
            item(5.0, "five"),
            item(1.0, "one-a"),
            item(3.0, "three"),
            item(1.0, "one-b"),
            NarrationItem {
                at: Some(-2.0),
                text: "negative".into(),
                ..Default::default()
            },
        ]);
        let NarrationPlan::Timed(items) = plan_narration(&cue, &image()) else {
            panic!("expected timed narration");
        };
        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["negative", "one-a", "one-b", "three", "five"]);
    }

    #[test]
    fn subtitle_timing_follows_the_media() {
        let video_end = Cue::video(1, "a.mp4", VideoWait::End).with_subtitle("after");
        let waited = MediaOutcome::Video {
            name: "a.mp4".into(),
            waited: true,
        };
        assert_eq!(plan_narration(&video_end, &waited), NarrationPlan::AfterVideo("after"));

        let video_now = Cue::video(1, "a.mp4", VideoWait::Immediate).with_subtitle("over");
        let running = MediaOutcome::Video {
            name: "a.mp4".into(),
            waited: false,
        };
        assert_eq!(plan_narration(&video_now, &running), NarrationPlan::Immediate("over"));

        let still = Cue::image(1, "1.png").with_subtitle("hello");
        assert_eq!(plan_narration(&still, &image()), NarrationPlan::Immediate("hello"));
    }

    #[test]
    fn blank_subtitle_is_silent() {
        let cue = Cue::image(1, "1.png").with_subtitle("  \n ");
        assert_eq!(plan_narration(&cue, &image()), NarrationPlan::Silent);
        assert_eq!(plan_narration(&Cue::image(1, "1.png"), &image()), NarrationPlan::Silent);
    }
}
