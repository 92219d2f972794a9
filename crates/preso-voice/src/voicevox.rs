//! Speech synthesis backends.
//!
//! [`VoicevoxTts`] talks to a VOICEVOX engine in two steps: `POST
//! /audio_query` builds a synthesis query for the text and speaker, the
//! script's TTS parameters are written over it, and `POST /synthesis` turns
//! the query into WAV bytes.

use crate::error::{VoiceError, VoiceResult};
use preso_core::TtsParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Backend that turns text into audio bytes (WAV).
#[async_trait::async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize text for a speaker. An empty vec means nothing to play.
    async fn synthesize(
        &self,
        text: &str,
        speaker_id: u32,
        params: &TtsParams,
    ) -> VoiceResult<Vec<u8>>;
}

/// Placeholder TTS: returns empty audio so nothing plays.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

#[async_trait::async_trait]
impl TtsBackend for PlaceholderTts {
    async fn synthesize(
        &self,
        _text: &str,
        _speaker_id: u32,
        _params: &TtsParams,
    ) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// A VOICEVOX style (the id is what scripts call `speakerId`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerStyle {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    #[serde(default)]
    pub styles: Vec<SpeakerStyle>,
}

impl Speaker {
    /// Speakers offered when the engine cannot be reached.
    pub fn fallback() -> Vec<Speaker> {
        let one = |name: &str, id: u32| Speaker {
            name: name.to_string(),
            styles: vec![SpeakerStyle {
                id,
                name: "ノーマル".to_string(),
            }],
        };
        vec![one("四国めたん", 1), one("ずんだもん", 3), one("春日部つむぎ", 46)]
    }
}

/// Write the set fields of `params` over a VOICEVOX audio query.
pub fn apply_params(query: &mut serde_json::Value, params: &TtsParams) {
    let Some(obj) = query.as_object_mut() else {
        return;
    };
    let fields = [
        ("speedScale", params.speed_scale),
        ("pitchScale", params.pitch_scale),
        ("intonationScale", params.intonation_scale),
        ("volumeScale", params.volume_scale),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            obj.insert(key.to_string(), serde_json::json!(v));
        }
    }
}

/// VOICEVOX engine client.
#[derive(Debug, Clone)]
pub struct VoicevoxTts {
    /// Base URL without trailing slash (e.g. http://127.0.0.1:50021).
    pub base_url: String,
    client: reqwest::Client,
}

impl VoicevoxTts {
    /// Create a client; `timeout` bounds each HTTP request.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build from the player configuration.
    pub fn from_config(config: &preso_core::PresoConfig) -> VoiceResult<Self> {
        Self::new(config.voicevox_url.clone(), config.synthesis_timeout())
    }

    /// List the speakers and styles the engine offers.
    pub async fn speakers(&self) -> VoiceResult<Vec<Speaker>> {
        let url = format!("{}/speakers", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(VoiceError::Tts(format!("speakers: {}", res.status())));
        }
        Ok(res.json().await?)
    }

    async fn audio_query(&self, text: &str, speaker_id: u32) -> VoiceResult<serde_json::Value> {
        let url = format!("{}/audio_query", self.base_url);
        let speaker = speaker_id.to_string();
        let res = self
            .client
            .post(&url)
            .query(&[("speaker", speaker.as_str()), ("text", text)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("audio_query {}: {}", status, body)));
        }
        Ok(res.json().await?)
    }
}

#[async_trait::async_trait]
impl TtsBackend for VoicevoxTts {
    async fn synthesize(
        &self,
        text: &str,
        speaker_id: u32,
        params: &TtsParams,
    ) -> VoiceResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut query = self.audio_query(text, speaker_id).await?;
        apply_params(&mut query, params);

        let url = format!("{}/synthesis", self.base_url);
        let res = self
            .client
            .post(&url)
            .query(&[("speaker", speaker_id)])
            .json(&query)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("synthesis {}: {}", status, body)));
        }
        let bytes = res.bytes().await?;
        debug!(speaker_id, bytes = bytes.len(), "synthesized narration");
        Ok(bytes.to_vec())
    }
}
