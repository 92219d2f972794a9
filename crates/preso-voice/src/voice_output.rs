//! Narration audio output: the single device narration plays through.
//!
//! [`RodioOutput`] plays synthesized WAV on the default device through a
//! fresh `rodio::Sink` per clip. The output stream is not `Send` on every
//! platform, so it is owned by a dedicated thread that keeps it alive for as
//! long as the output exists. [`SilentOutput`] keeps the same timing without a device.

use crate::error::{VoiceError, VoiceResult};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// What the output is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Nothing loaded, or the loaded sound has ended or was stopped.
    Idle,
    Playing,
    Paused,
}

/// The shared audio output resource.
pub trait AudioOutput: Send + Sync {
    /// Replace whatever is loaded with `bytes` and start playing. Failing here
    /// means playback could not start.
    fn start(&self, bytes: &[u8]) -> VoiceResult<()>;

    fn pause(&self);

    fn resume(&self);

    /// Stop playback immediately and drop the loaded sound.
    fn stop(&self);

    fn state(&self) -> OutputState;
}

type SinkFactory = Box<dyn Fn() -> VoiceResult<Sink> + Send + Sync>;

/// Plays narration on the default output device.
///
/// Every clip gets its own `Sink`. A stopped sink is never reused, so
/// starting a clip never waits on the one it replaces.
pub struct RodioOutput {
    new_sink: SinkFactory,
    current: Mutex<Option<Sink>>,
    // dropping this ends the thread that owns the output stream
    _keepalive: Option<mpsc::Sender<()>>,
}

impl RodioOutput {
    /// Open the default output device.
    pub fn new() -> VoiceResult<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<VoiceResult<OutputStreamHandle>>();
        let (keep_tx, keep_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("preso-audio".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        // blocks until the owning RodioOutput is dropped
                        let _ = keep_rx.recv();
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                }
            })?;

        let handle = ready_rx
            .recv()
            .map_err(|_| VoiceError::Playback("audio thread exited during setup".to_string()))??;
        info!("VoiceOutput: output stream ready for narration playback");
        let mut output = Self::with_sink_factory(move || Ok(Sink::try_new(&handle)?));
        output._keepalive = Some(keep_tx);
        Ok(output)
    }

    fn with_sink_factory(
        new_sink: impl Fn() -> VoiceResult<Sink> + Send + Sync + 'static,
    ) -> Self {
        Self {
            new_sink: Box::new(new_sink),
            current: Mutex::new(None),
            _keepalive: None,
        }
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Option<Sink>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AudioOutput for RodioOutput {
    fn start(&self, bytes: &[u8]) -> VoiceResult<()> {
        if let Some(old) = self.current().take() {
            old.stop();
        }
        if bytes.is_empty() {
            return Ok(());
        }
        let source = rodio::Decoder::new(Cursor::new(bytes.to_vec()))?;
        let sink = (self.new_sink)()?;
        sink.append(source.convert_samples::<f32>());
        sink.play();
        if let Some(old) = self.current().replace(sink) {
            old.stop();
        }
        Ok(())
    }

    fn pause(&self) {
        if let Some(sink) = self.current().as_ref() {
            sink.pause();
        }
    }

    fn resume(&self) {
        if let Some(sink) = self.current().as_ref() {
            sink.play();
        }
    }

    fn stop(&self) {
        if let Some(sink) = self.current().take() {
            sink.stop();
        }
    }

    fn state(&self) -> OutputState {
        match self.current().as_ref() {
            None => OutputState::Idle,
            Some(sink) if sink.empty() => OutputState::Idle,
            Some(sink) if sink.is_paused() => OutputState::Paused,
            Some(_) => OutputState::Playing,
        }
    }
}

/// Duration of a PCM WAV clip, read from its header.
pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    if bytes.len() < 44 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    let byte_rate = u32::from_le_bytes(bytes[28..32].try_into().ok()?);
    if byte_rate == 0 {
        return None;
    }
    let data = (bytes.len() - 44) as f64;
    Some(Duration::from_secs_f64(data / f64::from(byte_rate)))
}

#[derive(Debug, Default)]
struct Clip {
    length: Duration,
    played: Duration,
    resumed_at: Option<Instant>,
}

impl Clip {
    fn position(&self) -> Duration {
        self.played + self.resumed_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Output without a device: a clip "plays" for its WAV length (or
/// `len / fallback_byte_rate` for headerless bytes) on the tokio clock.
#[derive(Debug)]
pub struct SilentOutput {
    fallback_byte_rate: u32,
    clip: Mutex<Option<Clip>>,
}

impl Default for SilentOutput {
    fn default() -> Self {
        // 24 kHz, 16-bit mono: what VOICEVOX produces
        Self::with_fallback_rate(48_000)
    }
}

impl SilentOutput {
    pub fn with_fallback_rate(bytes_per_sec: u32) -> Self {
        Self {
            fallback_byte_rate: bytes_per_sec.max(1),
            clip: Mutex::new(None),
        }
    }

    fn clip(&self) -> std::sync::MutexGuard<'_, Option<Clip>> {
        self.clip.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AudioOutput for SilentOutput {
    fn start(&self, bytes: &[u8]) -> VoiceResult<()> {
        let length = wav_duration(bytes).unwrap_or_else(|| {
            Duration::from_secs_f64(bytes.len() as f64 / f64::from(self.fallback_byte_rate))
        });
        *self.clip() = (!bytes.is_empty()).then(|| Clip {
            length,
            played: Duration::ZERO,
            resumed_at: Some(Instant::now()),
        });
        Ok(())
    }

    fn pause(&self) {
        if let Some(clip) = self.clip().as_mut() {
            if let Some(t) = clip.resumed_at.take() {
                clip.played += t.elapsed();
            }
        }
    }

    fn resume(&self) {
        if let Some(clip) = self.clip().as_mut() {
            if clip.resumed_at.is_none() && clip.played < clip.length {
                clip.resumed_at = Some(Instant::now());
            }
        }
    }

    fn stop(&self) {
        *self.clip() = None;
    }

    fn state(&self) -> OutputState {
        match self.clip().as_ref() {
            None => OutputState::Idle,
            Some(clip) if clip.position() >= clip.length => OutputState::Idle,
            Some(clip) if clip.resumed_at.is_none() => OutputState::Paused,
            Some(_) => OutputState::Playing,
        }
    }
}

/// Open the device output, falling back to [`SilentOutput`] when no device is
/// available (CI, headless hosts).
pub fn default_output() -> Arc<dyn AudioOutput> {
    match RodioOutput::new() {
        Ok(out) => Arc::new(out),
        Err(e) => {
            warn!(error = %e, "no audio device; narration will play silently");
            Arc::new(SilentOutput::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(data_len: usize, byte_rate: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; 44 + data_len];
        bytes[0..4].copy_from_slice(b"RIFF");
        bytes[8..12].copy_from_slice(b"WAVE");
        bytes[28..32].copy_from_slice(&byte_rate.to_le_bytes());
        bytes
    }

    #[test]
    fn reads_wav_length() {
        assert_eq!(wav_duration(&wav(48_000, 48_000)), Some(Duration::from_secs(1)));
        assert_eq!(wav_duration(b"not a wav"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_output_tracks_time_and_pause() {
        let out = SilentOutput::with_fallback_rate(1000);
        assert_eq!(out.state(), OutputState::Idle);
        out.start(&[0u8; 100]).unwrap(); // 100ms
        assert_eq!(out.state(), OutputState::Playing);

        tokio::time::sleep(Duration::from_millis(60)).await;
        out.pause();
        assert_eq!(out.state(), OutputState::Paused);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(out.state(), OutputState::Paused);

        out.resume();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(out.state(), OutputState::Idle);
    }

    fn pcm_wav(samples: usize) -> Vec<u8> {
        let data_len = (samples * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + samples * 2);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&24_000u32.to_le_bytes());
        bytes.extend_from_slice(&48_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + samples * 2, 0);
        bytes
    }

    // Idle sinks have no mixer draining them: appending to a stopped one
    // that still holds a sound would wait forever.
    fn undrained_output() -> RodioOutput {
        RodioOutput::with_sink_factory(|| Ok(Sink::new_idle().0))
    }

    #[test]
    fn restarting_after_stop_returns_immediately() {
        let out = undrained_output();
        out.start(&pcm_wav(2_400)).unwrap();
        assert_eq!(out.state(), OutputState::Playing);
        out.stop();
        assert_eq!(out.state(), OutputState::Idle);

        out.start(&pcm_wav(2_400)).unwrap();
        assert_eq!(out.state(), OutputState::Playing);
        out.start(&pcm_wav(2_400)).unwrap();
        assert_eq!(out.state(), OutputState::Playing);
    }

    #[test]
    fn device_output_pause_resume_and_empty_clip() {
        let out = undrained_output();
        out.start(&pcm_wav(2_400)).unwrap();
        out.pause();
        assert_eq!(out.state(), OutputState::Paused);
        out.resume();
        assert_eq!(out.state(), OutputState::Playing);

        out.start(&[]).unwrap();
        assert_eq!(out.state(), OutputState::Idle);
        assert!(out.start(b"not audio").is_err());
        assert_eq!(out.state(), OutputState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_output_stop_and_empty() {
        let out = SilentOutput::default();
        out.start(&[]).unwrap();
        assert_eq!(out.state(), OutputState::Idle);
        out.start(&wav(48_000, 48_000)).unwrap();
        assert_eq!(out.state(), OutputState::Playing);
        out.stop();
        assert_eq!(out.state(), OutputState::Idle);
    }
}
