//! Microphone capture
//!
//! Records one utterance at a time and hands it over as 16 kHz mono WAV.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::service::AudioPayload;
use crate::{Error, Result};

/// Capture rate the backend transcribes at
pub const SAMPLE_RATE: u32 = 16_000;

/// Shortest utterance worth submitting (a quarter second)
pub const MIN_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize / 4;

/// The default input device, recording on demand
pub struct Microphone {
    config: StreamConfig,
    recorded: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl Microphone {
    /// Check that a usable input device exists
    ///
    /// # Errors
    ///
    /// Returns `Error::Capture` if there is no mono 16 kHz capable input
    pub fn open() -> Result<Self> {
        let device = input_device()?;
        let config = mono_config(&device)?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "microphone ready"
        );

        Ok(Self {
            config,
            recorded: Arc::default(),
            stream: None,
        })
    }

    /// Begin a fresh utterance; no-op if already recording
    ///
    /// # Errors
    ///
    /// Returns `Error::Capture` if the input stream cannot be started
    pub fn begin(&mut self) -> Result<()> {
        if self.is_recording() {
            return Ok(());
        }
        self.discard();

        let recorded = Arc::clone(&self.recorded);
        let stream = input_device()?
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut samples) = recorded.lock() {
                        samples.extend_from_slice(data);
                    }
                },
                |e| tracing::error!(error = %e, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Capture(e.to_string()))?;
        stream.play().map_err(|e| Error::Capture(e.to_string()))?;

        self.stream = Some(stream);
        tracing::debug!("recording utterance");
        Ok(())
    }

    /// Stop recording and encode what was heard
    ///
    /// # Errors
    ///
    /// Returns `Error::Capture` if the utterance is too short or cannot be encoded
    pub fn finish(&mut self) -> Result<AudioPayload> {
        self.halt();
        let samples = self.drain();

        if samples.len() < MIN_UTTERANCE_SAMPLES {
            return Err(Error::Capture(format!(
                "utterance too short ({} ms)",
                samples.len() * 1000 / SAMPLE_RATE as usize
            )));
        }

        tracing::debug!(samples = samples.len(), "utterance recorded");
        encode_wav(&samples).map_err(|e| Error::Capture(e.user_message()))
    }

    /// Stop recording and throw the utterance away
    pub fn abandon(&mut self) {
        self.halt();
        self.discard();
    }

    /// Samples recorded since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.recorded
            .lock()
            .map(|mut samples| std::mem::take(&mut *samples))
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    fn halt(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("recording stopped");
        }
    }

    fn discard(&self) {
        if let Ok(mut samples) = self.recorded.lock() {
            samples.clear();
        }
    }
}

fn input_device() -> Result<Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| Error::Capture("no input device available".to_string()))
}

fn mono_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(SAMPLE_RATE);
    device
        .supported_input_configs()
        .map_err(|e| Error::Capture(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Capture("no mono 16 kHz input config".to_string()))
}

/// Encode mono samples as 16-bit PCM WAV at [`SAMPLE_RATE`]
///
/// # Errors
///
/// Returns `Error::Audio` if the WAV writer fails
pub fn encode_wav(samples: &[f32]) -> Result<AudioPayload> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| Error::Audio(e.to_string());

    let mut out = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut out, spec).map_err(wav_err)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample)).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(AudioPayload::new(out.into_inner()))
}

#[allow(clippy::cast_possible_truncation)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Root-mean-square level of a block of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}
