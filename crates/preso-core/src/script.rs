//! Presentation script model (`script.json`).
//!
//! A script is an ordered list of cues. Each cue shows one slide (image or
//! video) and speaks either its flat `subtitle` or a list of time-coded
//! narration items tied to the video position. Keys are camelCase on disk and
//! absent optional fields are omitted when saving.

use crate::error::{ScriptError, ScriptResult};
use crate::library::is_video_name;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_title() -> String {
    "Presentation".to_string()
}

/// Avatar facial expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Angry,
    Sad,
    Surprised,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Surprised => "surprised",
        }
    }
}

/// When a cue's flat subtitle is spoken relative to its video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoWait {
    /// Speak right away, over the running video.
    #[default]
    #[serde(rename = "none")]
    Immediate,
    /// Speak once the video has ended.
    #[serde(rename = "end")]
    End,
}

/// VOICEVOX synthesis parameters. Every field is optional; absent fields
/// inherit from the next broader scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intonation_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_scale: Option<f64>,
}

impl TtsParams {
    /// Shallow field-by-field override: fields set in `over` win.
    pub fn merged(&self, over: &TtsParams) -> TtsParams {
        TtsParams {
            speed_scale: over.speed_scale.or(self.speed_scale),
            pitch_scale: over.pitch_scale.or(self.pitch_scale),
            intonation_scale: over.intonation_scale.or(self.intonation_scale),
            volume_scale: over.volume_scale.or(self.volume_scale),
        }
    }

    /// Merge an optional override (a cue or narration item without `tts`).
    pub fn merged_opt(&self, over: Option<&TtsParams>) -> TtsParams {
        match over {
            Some(over) => self.merged(over),
            None => *self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.speed_scale.is_none()
            && self.pitch_scale.is_none()
            && self.intonation_scale.is_none()
            && self.volume_scale.is_none()
    }
}

/// A spoken line triggered at a position of the cue's video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationItem {
    /// Seconds into the video; absent or 0 means immediately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsParams>,
}

impl NarrationItem {
    /// Trigger offset clamped to `>= 0`.
    pub fn trigger_secs(&self) -> f64 {
        self.at.unwrap_or(0.0).max(0.0)
    }
}

/// One step of the presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Slide number. A display hint only; duplicates are allowed.
    #[serde(default)]
    pub slide: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_wait: Option<VideoWait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<Vec<NarrationItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duck_video: Option<bool>,
}

impl Cue {
    pub fn image(slide: u32, name: impl Into<String>) -> Self {
        Self {
            slide,
            image: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn video(slide: u32, name: impl Into<String>, wait: VideoWait) -> Self {
        Self {
            slide,
            video: Some(name.into()),
            video_wait: Some(wait),
            ..Default::default()
        }
    }

    pub fn with_subtitle(mut self, text: impl Into<String>) -> Self {
        self.subtitle = Some(text.into());
        self
    }

    pub fn with_narration(mut self, items: Vec<NarrationItem>) -> Self {
        self.narration = Some(items);
        self
    }

    pub fn video_wait(&self) -> VideoWait {
        self.video_wait.unwrap_or_default()
    }

    pub fn subtitle_text(&self) -> &str {
        self.subtitle.as_deref().unwrap_or("")
    }

    pub fn narration_items(&self) -> &[NarrationItem] {
        self.narration.as_deref().unwrap_or(&[])
    }

    pub fn ducks_video(&self) -> bool {
        self.duck_video.unwrap_or(false)
    }

    /// True when the cue names some media to show.
    pub fn has_media(&self) -> bool {
        let set = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.image) || set(&self.video)
    }
}

/// Script-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<u32>,
    #[serde(default)]
    pub tts: TtsParams,
}

/// A full presentation script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub defaults: ScriptDefaults,
    pub cues: Vec<Cue>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            title: default_title(),
            defaults: ScriptDefaults::default(),
            cues: Vec::new(),
        }
    }
}

impl Script {
    pub fn from_json(text: &str) -> ScriptResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> ScriptResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a script from disk.
    pub fn load(path: impl AsRef<Path>) -> ScriptResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Write the script as pretty JSON, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> ScriptResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        info!(cues = self.cues.len(), path = %path.display(), "script saved");
        Ok(())
    }

    /// Fill in authoring defaults so every cue carries explicit values.
    pub fn normalized(&self) -> Script {
        let tts = &self.defaults.tts;
        Script {
            title: self.title.clone(),
            defaults: ScriptDefaults {
                speaker_id: Some(self.defaults.speaker_id.unwrap_or(1)),
                tts: TtsParams {
                    speed_scale: Some(tts.speed_scale.unwrap_or(1.0)),
                    pitch_scale: Some(tts.pitch_scale.unwrap_or(0.0)),
                    intonation_scale: Some(tts.intonation_scale.unwrap_or(1.0)),
                    volume_scale: Some(tts.volume_scale.unwrap_or(1.0)),
                },
            },
            cues: self
                .cues
                .iter()
                .map(|c| Cue {
                    subtitle: Some(c.subtitle.clone().unwrap_or_default()),
                    emotion: Some(c.emotion.unwrap_or_default()),
                    video_wait: Some(c.video_wait()),
                    duck_video: Some(c.ducks_video()),
                    ..c.clone()
                })
                .collect(),
        }
    }

    /// Checks that the script can be played from the start.
    pub fn validate(&self) -> ScriptResult<()> {
        let Some(first) = self.cues.first() else {
            return Err(ScriptError::Invalid("script has no cues".to_string()));
        };
        if !first.has_media() {
            return Err(ScriptError::Invalid(
                "the first cue needs an image or a video".to_string(),
            ));
        }
        Ok(())
    }

    /// Speaker for a cue: cue override, then script default, then `fallback`.
    pub fn cue_speaker(&self, cue: &Cue, fallback: u32) -> u32 {
        cue.speaker_id
            .or(self.defaults.speaker_id)
            .unwrap_or(fallback)
    }

    /// TTS params for a cue: script defaults overridden by the cue.
    pub fn cue_tts(&self, cue: &Cue) -> TtsParams {
        self.defaults.tts.merged_opt(cue.tts.as_ref())
    }

    /// Append one cue per uploaded media file, numbering slides after the
    /// highest existing slide number. Videos wait for their end.
    pub fn append_media<S: AsRef<str>>(&mut self, names: &[S]) {
        let next = self.cues.iter().map(|c| c.slide).max().unwrap_or(0) + 1;
        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let slide = next + i as u32;
            let cue = if is_video_name(name) {
                Cue::video(slide, name, VideoWait::End)
            } else {
                Cue::image(slide, name)
            };
            self.cues.push(cue.with_subtitle(""));
        }
    }

    /// Built-in three-cue demo used when no script file exists.
    pub fn demo() -> Script {
        Script {
            title: "Demo presentation".to_string(),
            defaults: ScriptDefaults {
                speaker_id: Some(1),
                tts: TtsParams {
                    speed_scale: Some(1.0),
                    pitch_scale: Some(0.0),
                    intonation_scale: Some(1.0),
                    volume_scale: Some(1.6),
                },
            },
            cues: vec![
                Cue {
                    emotion: Some(Emotion::Neutral),
                    ..Cue::image(1, "01.png")
                        .with_subtitle("Welcome. {bow}\nThank you for joining today. {nod}")
                },
                Cue {
                    emotion: Some(Emotion::Happy),
                    ..Cue::image(2, "02.png").with_subtitle("Here is today's agenda. {pointR}")
                },
                Cue::video(3, "intro.mp4", VideoWait::End)
                    .with_subtitle("The video has finished, so let's continue. {waveR}"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tts_merge_is_field_by_field() {
        let defaults = TtsParams {
            speed_scale: Some(1.0),
            ..Default::default()
        };
        let cue = TtsParams {
            pitch_scale: Some(0.2),
            ..Default::default()
        };
        let item = TtsParams {
            speed_scale: Some(1.5),
            ..Default::default()
        };
        let effective = defaults.merged(&cue).merged(&item);
        assert_eq!(
            effective,
            TtsParams {
                speed_scale: Some(1.5),
                pitch_scale: Some(0.2),
                ..Default::default()
            }
        );
    }

    #[test]
    fn parses_camel_case_and_nulls() {
        let json = r#"{
            "title": "t",
            "defaults": { "speakerId": 3, "tts": { "speedScale": 1.2 } },
            "cues": [
                { "slide": 1, "image": null, "video": "a.mp4", "videoWait": "end",
                  "duckVideo": true,
                  "narration": [ { "at": 2.5, "text": "hi {nod}", "emotion": "happy" } ] }
            ]
        }"#;
        let script = Script::from_json(json).unwrap();
        assert_eq!(script.defaults.speaker_id, Some(3));
        let cue = &script.cues[0];
        assert_eq!(cue.image, None);
        assert_eq!(cue.video_wait(), VideoWait::End);
        assert!(cue.ducks_video());
        assert_eq!(cue.narration_items()[0].emotion, Some(Emotion::Happy));
        assert_eq!(cue.narration_items()[0].trigger_secs(), 2.5);
    }

    #[test]
    fn missing_cues_is_rejected() {
        assert!(Script::from_json(r#"{ "title": "x" }"#).is_err());
    }

    #[test]
    fn normalized_round_trip_is_stable() {
        let mut script = Script::demo();
        script.cues.push(Cue {
            narration: Some(vec![NarrationItem {
                at: Some(1.0),
                text: "a".into(),
                ..Default::default()
            }]),
            ..Cue::video(4, "b.webm", VideoWait::Immediate)
        });
        let normalized = script.normalized();
        let json = normalized.to_json_pretty().unwrap();
        let reloaded = Script::from_json(&json).unwrap();
        assert_eq!(reloaded, normalized);
        assert_eq!(reloaded.normalized(), normalized);
    }

    #[test]
    fn normalized_fills_defaults() {
        let script = Script {
            cues: vec![Cue::image(1, "a.png")],
            ..Default::default()
        };
        let n = script.normalized();
        assert_eq!(n.defaults.speaker_id, Some(1));
        assert_eq!(n.defaults.tts.pitch_scale, Some(0.0));
        assert_eq!(n.cues[0].subtitle.as_deref(), Some(""));
        assert_eq!(n.cues[0].emotion, Some(Emotion::Neutral));
        assert_eq!(n.cues[0].video_wait, Some(VideoWait::Immediate));
        assert_eq!(n.cues[0].duck_video, Some(false));
    }

    #[test]
    fn validate_requires_cues_and_first_media() {
        assert!(Script::default().validate().is_err());
        let no_media = Script {
            cues: vec![Cue::default().with_subtitle("hi")],
            ..Default::default()
        };
        assert!(matches!(no_media.validate(), Err(ScriptError::Invalid(_))));
        assert!(Script::demo().validate().is_ok());
    }

    #[test]
    fn speaker_falls_back_through_scopes() {
        let mut script = Script::default();
        let mut cue = Cue::image(1, "a.png");
        assert_eq!(script.cue_speaker(&cue, 7), 7);
        script.defaults.speaker_id = Some(3);
        assert_eq!(script.cue_speaker(&cue, 7), 3);
        cue.speaker_id = Some(46);
        assert_eq!(script.cue_speaker(&cue, 7), 46);
    }

    #[test]
    fn append_media_numbers_after_highest_slide() {
        let mut script = Script {
            cues: vec![Cue::image(4, "a.png"), Cue::image(2, "b.png")],
            ..Default::default()
        };
        script.append_media(&["c.png", "clip.MOV"]);
        assert_eq!(script.cues[2].slide, 5);
        assert_eq!(script.cues[2].image.as_deref(), Some("c.png"));
        assert_eq!(script.cues[3].slide, 6);
        assert_eq!(script.cues[3].video.as_deref(), Some("clip.MOV"));
        assert_eq!(script.cues[3].video_wait(), VideoWait::End);
    }
}
