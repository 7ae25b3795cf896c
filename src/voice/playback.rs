//! Speaker output for the assistant's voice

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use rubato::{FftFixedIn, Resampler};

use crate::playback::PlaybackSink;
use crate::service::AudioPayload;
use crate::{Error, Result};

/// Rate replies are rendered at; the backend's MP3 speech is 24 kHz
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Extra time past the clip length before the device is abandoned
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Lets the device flush its final buffer before the stream is dropped
const TAIL: Duration = Duration::from_millis(100);

/// The default output device
pub struct Speaker {
    device: Device,
    config: StreamConfig,
}

impl Speaker {
    /// Open the default output device in mono, or stereo when mono is unsupported
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if no output device can play 24 kHz
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let config = [1, 2]
            .into_iter()
            .find_map(|channels| output_config(&device, channels))
            .ok_or_else(|| Error::Audio("no 24 kHz output config".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "speaker ready"
        );
        Ok(Self { device, config })
    }

    /// Decode an MP3 reply and play it to the end
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if decoding or the output stream fails
    pub fn play_mp3(&self, mp3: &[u8]) -> Result<()> {
        self.play_pcm(decode_mp3(mp3)?)
    }

    /// Play mono samples at [`PLAYBACK_SAMPLE_RATE`], blocking until drained
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` if the output stream fails
    pub fn play_pcm(&self, pcm: Vec<f32>) -> Result<()> {
        if pcm.is_empty() {
            return Ok(());
        }

        let frames = pcm.len();
        let channels = usize::from(self.config.channels);
        let pcm = Arc::new(pcm);
        let cursor = Arc::new(AtomicUsize::new(0));
        let drained = Arc::new(AtomicBool::new(false));

        let stream = {
            let (pcm, cursor, drained) = (Arc::clone(&pcm), Arc::clone(&cursor), Arc::clone(&drained));
            self.device
                .build_output_stream(
                    &self.config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut at = cursor.load(Ordering::Relaxed);
                        for frame in out.chunks_mut(channels) {
                            let value = pcm.get(at).copied().unwrap_or(0.0);
                            frame.fill(value);
                            at = (at + 1).min(pcm.len());
                        }
                        cursor.store(at, Ordering::Relaxed);
                        if at >= pcm.len() {
                            drained.store(true, Ordering::Release);
                        }
                    },
                    |e| tracing::error!(error = %e, "speaker stream error"),
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let deadline = Instant::now() + clip_length(frames) + DRAIN_GRACE;
        while !drained.load(Ordering::Acquire) {
            if Instant::now() > deadline {
                tracing::warn!(frames, "speaker did not drain in time");
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        std::thread::sleep(TAIL);

        drop(stream);
        tracing::debug!(frames, "reply played");
        Ok(())
    }
}

fn output_config(device: &Device, channels: u16) -> Option<StreamConfig> {
    let rate = SampleRate(PLAYBACK_SAMPLE_RATE);
    device
        .supported_output_configs()
        .ok()?
        .find(|c| c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .map(|c| c.with_sample_rate(rate).config())
}

fn clip_length(frames: usize) -> Duration {
    Duration::from_millis(frames as u64 * 1000 / u64::from(PLAYBACK_SAMPLE_RATE))
}

/// Plays assistant replies through the default speakers
///
/// The device is opened per reply on a blocking thread, so no audio handle is
/// held across await points.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerSink;

#[async_trait]
impl PlaybackSink for SpeakerSink {
    async fn play(&self, audio: AudioPayload) -> Result<()> {
        tokio::task::spawn_blocking(move || Speaker::open()?.play_mp3(audio.as_bytes()))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

/// Mono sine wave at the playback rate, for the speaker check
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn sine_tone(frequency: f32, duration: Duration, amplitude: f32) -> Vec<f32> {
    let rate = PLAYBACK_SAMPLE_RATE as f32;
    let step = std::f32::consts::TAU * frequency / rate;
    (0..(rate * duration.as_secs_f32()) as usize)
        .map(|n| amplitude * (step * n as f32).sin())
        .collect()
}

/// Decode MP3 into mono samples at [`PLAYBACK_SAMPLE_RATE`], averaging stereo channels
///
/// # Errors
///
/// Returns `Error::Audio` if the stream is not valid MP3 or cannot be resampled
pub fn decode_mp3(mp3: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut pcm = Vec::new();
    let mut rate = None;

    loop {
        let frame = match decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("invalid reply audio: {e}"))),
        };
        let frame_rate = u32::try_from(frame.sample_rate).unwrap_or(PLAYBACK_SAMPLE_RATE);
        match rate {
            None => rate = Some(frame_rate),
            Some(first) if first != frame_rate => {
                tracing::warn!(first, frame_rate, "reply audio changes sample rate mid-stream");
            }
            Some(_) => {}
        }
        let channels = frame.channels.max(1);
        pcm.extend(frame.data.chunks(channels).map(mixdown));
    }

    match rate {
        Some(from) if from != PLAYBACK_SAMPLE_RATE => {
            tracing::debug!(from, to = PLAYBACK_SAMPLE_RATE, "resampling reply audio");
            resample(&pcm, from, PLAYBACK_SAMPLE_RATE)
        }
        _ => Ok(pcm),
    }
}

/// Resample mono audio, keeping the duration
///
/// # Errors
///
/// Returns `Error::Audio` if either rate is unusable
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample(pcm: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || pcm.is_empty() {
        return Ok(pcm.to_vec());
    }

    let mut resampler = FftFixedIn::<f64>::new(from as usize, to as usize, 1024, 2, 1)
        .map_err(|e| Error::Audio(format!("failed to create resampler: {e}")))?;
    let chunk_size = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let wanted = (pcm.len() as u64 * u64::from(to) / u64::from(from)) as usize;

    let input: Vec<f64> = pcm.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::with_capacity(wanted + delay + chunk_size);
    let mut offset = 0;

    // The tail is zero-padded until the delayed output covers the whole clip
    while output.len() < wanted + delay {
        let mut chunk = vec![0.0; chunk_size];
        if offset < input.len() {
            let end = (offset + chunk_size).min(input.len());
            chunk[..end - offset].copy_from_slice(&input[offset..end]);
        }
        offset += chunk_size;

        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Audio(format!("resampling failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output[delay..delay + wanted].iter().map(|&s| s as f32).collect())
}

#[allow(clippy::cast_precision_loss)]
fn mixdown(frame: &[i16]) -> f32 {
    let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
    sum / frame.len() as f32
}
