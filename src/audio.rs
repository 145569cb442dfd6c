use crate::config::AudioConfig;
use crate::events::SceneEvent;
use crate::host::HostContext;
use crate::platform::AudioOutput;
use crate::session::WeakSession;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioCueSettings {
    pub volume: f32,
    pub looped: bool,
}

impl AudioCueSettings {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self { volume: config.volume.clamp(0.0, 1.0), looped: config.looped }
    }
}

/// A decoded-once sound. Playback re-decodes from the retained bytes.
#[derive(Clone)]
pub struct SoundClip {
    pub label: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Option<Duration>,
    bytes: Rc<[u8]>,
}

impl SoundClip {
    pub fn decode(label: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let label = label.into();
        let decoder =
            Decoder::new(Cursor::new(bytes.clone())).with_context(|| format!("Failed to decode audio '{label}'"))?;
        Ok(Self {
            sample_rate: decoder.sample_rate(),
            channels: decoder.channels(),
            duration: decoder.total_duration(),
            bytes: Rc::from(bytes),
            label,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Default output device through rodio. The device is opened lazily on the first cue.
pub struct RodioOutput {
    stream: RefCell<Option<(OutputStream, OutputStreamHandle)>>,
    capacity: usize,
    recent: RefCell<VecDeque<String>>,
}

impl RodioOutput {
    pub fn new(capacity: usize) -> Self {
        Self { stream: RefCell::new(None), capacity: capacity.max(1), recent: RefCell::new(VecDeque::new()) }
    }

    pub fn recent_cues(&self) -> Vec<String> {
        self.recent.borrow().iter().cloned().collect()
    }

    fn handle(&self) -> Result<OutputStreamHandle> {
        let mut stream = self.stream.borrow_mut();
        if stream.is_none() {
            *stream = Some(OutputStream::try_default().context("No audio output device")?);
        }
        match stream.as_ref() {
            Some((_, handle)) => Ok(handle.clone()),
            None => anyhow::bail!("Audio output stream unavailable"),
        }
    }

    fn push_recent(&self, label: &str) {
        let mut recent = self.recent.borrow_mut();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(label.to_string());
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, clip: &SoundClip, settings: &AudioCueSettings) -> Result<()> {
        let handle = self.handle()?;
        let sink = Sink::try_new(&handle).context("Failed to create audio sink")?;
        let source = Decoder::new(Cursor::new(clip.bytes().to_vec()))
            .with_context(|| format!("Failed to decode audio '{}'", clip.label))?;
        sink.set_volume(settings.volume);
        if settings.looped {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }
        sink.detach();
        self.push_recent(&clip.label);
        Ok(())
    }
}

/// Fetches, decodes and plays the configured cue for a session. Every failure is logged and
/// reported; none of them affects the scene. A cue that resolves after its session closed is
/// dropped silently.
pub async fn play_cue(session: WeakSession, ctx: Rc<HostContext>) {
    let config = ctx.config().audio.clone();
    let cue = config.cue_path.clone();
    let assets = ctx.platform().assets.clone();
    let bytes = match assets.fetch(&cue).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Sound cue '{cue}' could not be loaded: {err:#}");
            ctx.emit(SceneEvent::AudioCueFailed { cue, reason: format!("{err:#}") });
            return;
        }
    };
    let clip = match SoundClip::decode(cue.clone(), bytes) {
        Ok(clip) => clip,
        Err(err) => {
            warn!("{err:#}");
            ctx.emit(SceneEvent::AudioCueFailed { cue, reason: format!("{err:#}") });
            return;
        }
    };
    let Some(handle) = session.upgrade_live() else {
        debug!("Dropping sound cue for closed session {}", session.id());
        return;
    };
    let Some(output) = ctx.platform().audio.clone() else {
        info!("No audio output; sound cue '{cue}' decoded but not played");
        return;
    };
    match output.play(&clip, &AudioCueSettings::from_config(&config)) {
        Ok(()) => {
            info!("Playing '{cue}' at volume {:.2}", config.volume);
            ctx.emit(SceneEvent::AudioCueStarted { session: handle.id(), cue });
        }
        Err(err) => {
            warn!("Sound cue '{cue}' failed to play: {err:#}");
            ctx.emit(SceneEvent::AudioCueFailed { cue, reason: format!("{err:#}") });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16-bit mono PCM WAV with `samples` zeroed frames.
    fn silent_wav(samples: u32) -> Vec<u8> {
        let data_len = samples * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8000u32.to_le_bytes());
        out.extend_from_slice(&16000u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    #[test]
    fn decodes_wav_metadata() {
        let clip = SoundClip::decode("sound.wav", silent_wav(800)).expect("wav decodes");
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.channels, 1);
        assert!(!clip.bytes().is_empty());
    }

    #[test]
    fn rejects_non_audio() {
        assert!(SoundClip::decode("sound.wav", b"nope".to_vec()).is_err());
    }

    #[test]
    fn recent_cues_keep_the_newest() {
        let output = RodioOutput::new(2);
        for label in ["a.wav", "b.wav", "c.wav"] {
            output.push_recent(label);
        }
        assert_eq!(output.recent_cues(), vec!["b.wav".to_string(), "c.wav".to_string()]);
    }

    #[test]
    fn settings_clamp_volume() {
        let config = AudioConfig { volume: 3.0, ..AudioConfig::default() };
        let settings = AudioCueSettings::from_config(&config);
        assert_eq!(settings.volume, 1.0);
        assert!(!settings.looped);
    }
}
