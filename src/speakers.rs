//! Output devices backed by the system's speakers or headphones.
//!
//! # Basic Usage
//!
//! ```no_run
//! use std::path::Path;
//! use bgmloop::speakers::SpeakersFactory;
//! use bgmloop::PlaybackEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PlaybackEngine::builder(SpeakersFactory::new()).build()?;
//! engine.play(None, Some(Path::new("music/title_loop.wav")))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Device Selection
//!
//! ```no_run
//! use bgmloop::speakers::{available_outputs, SpeakersFactory};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let outputs = available_outputs()?;
//! for (i, output) in outputs.iter().enumerate() {
//!     println!("output {i}: {output}");
//! }
//!
//! let factory = SpeakersFactory::new()
//!     .with_device_name(outputs[1].clone())
//!     .with_buffer_size(1024);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use dasp_sample::{FromSample, Sample as _};

use crate::common::{AudioFormat, ChannelCount, Sample, SampleRate};
use crate::device::{DeviceError, DeviceFactory, DeviceState, OutputDevice};
use crate::source::{self, Source};

/// Names of the output devices available on the system.
pub fn available_outputs() -> Result<Vec<String>, DeviceError> {
    let devices = cpal::default_host()
        .output_devices()
        .map_err(|err| DeviceError::Backend(err.to_string()))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// Opens a [`Speakers`] device for every playback session.
#[derive(Debug, Clone, Default)]
pub struct SpeakersFactory {
    device_name: Option<String>,
    buffer_size: Option<u32>,
}

impl SpeakersFactory {
    /// Plays on the default output device with the backend's buffer size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plays on the output device called `name`, see [`available_outputs`].
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Asks the backend for a fixed buffer of `frames` frames.
    ///
    /// Smaller buffers lower the latency of pause and volume changes but
    /// risk underruns.
    pub fn with_buffer_size(mut self, frames: u32) -> Self {
        self.buffer_size = Some(frames);
        self
    }

    fn find_device(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();
        let Some(name) = &self.device_name else {
            return host.default_output_device().ok_or(DeviceError::NoDevice);
        };

        host.output_devices()
            .map_err(|err| DeviceError::Backend(err.to_string()))?
            .find(|device| device.name().is_ok_and(|n| &n == name))
            .ok_or_else(|| DeviceError::NotFound(name.clone()))
    }
}

impl DeviceFactory for SpeakersFactory {
    fn create(&mut self) -> Result<Box<dyn OutputDevice>, DeviceError> {
        let device = self.find_device()?;
        tracing::debug!(device = ?device.name().ok(), "acquired output device");
        Ok(Box::new(Speakers {
            device,
            buffer_size: self.buffer_size,
            stream: None,
            volume: Arc::new(AtomicF32::new(1.0)),
            state: DeviceState::Stopped,
        }))
    }
}

/// An output stream on a cpal device.
///
/// The stream callback pulls from the bound source, pads a short read with
/// silence and converts to whatever sample type the device wants. Sources
/// whose channel count or sample rate the device does not support are
/// converted to the device's default format.
pub struct Speakers {
    device: cpal::Device,
    buffer_size: Option<u32>,
    stream: Option<cpal::Stream>,
    volume: Arc<AtomicF32>,
    state: DeviceState,
}

impl fmt::Debug for Speakers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Speakers")
            .field(
                "device",
                &self.device.name().unwrap_or_else(|_| "unknown".to_string()),
            )
            .field("state", &self.state)
            .field("volume", &self.volume())
            .finish()
    }
}

impl Speakers {
    /// Picks a config playing `format` as is, or the device's default config
    /// if no supported config matches.
    fn stream_config(&self, format: AudioFormat) -> Result<cpal::SupportedStreamConfig, DeviceError> {
        if let Some(exact) = self.exact_config(format)? {
            return Ok(exact);
        }

        let fallback = self
            .device
            .default_output_config()
            .map_err(|err| DeviceError::Backend(err.to_string()))?;
        if !is_convertible(fallback.sample_format()) {
            return Err(DeviceError::UnsupportedFormat(format));
        }
        tracing::debug!(
            %format,
            channels = fallback.channels(),
            sample_rate = fallback.sample_rate().0,
            "device cannot play the stream format, converting"
        );
        Ok(fallback)
    }

    fn exact_config(
        &self,
        format: AudioFormat,
    ) -> Result<Option<cpal::SupportedStreamConfig>, DeviceError> {
        let rate = cpal::SampleRate(format.sample_rate.get());
        let mut supported: Vec<_> = self
            .device
            .supported_output_configs()
            .map_err(|err| DeviceError::Backend(err.to_string()))?
            .filter(|range| {
                range.channels() == format.channels.get()
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .collect();
        supported.sort_by(|a, b| b.cmp_default_heuristics(a));

        Ok(supported
            .into_iter()
            .find(|range| is_convertible(range.sample_format()))
            .map(|range| range.with_sample_rate(rate)))
    }

    fn build_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        mut source: Box<dyn Source>,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: cpal::SizedSample + FromSample<Sample>,
    {
        let volume = self.volume.clone();
        let mut scratch: Vec<Sample> = Vec::new();

        self.device.build_output_stream::<T, _, _>(
            config,
            move |data, _| {
                scratch.resize(data.len(), 0.0);
                let count = source.read(&mut scratch);
                scratch[count..].fill(0.0);

                let gain = volume.load(Ordering::Relaxed);
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = (sample * gain).to_sample();
                }
            },
            |err| tracing::error!("audio stream error: {err}"),
            None,
        )
    }
}

fn is_convertible(format: cpal::SampleFormat) -> bool {
    use cpal::SampleFormat as F;
    matches!(format, F::F32 | F::F64 | F::I16 | F::I32 | F::U8 | F::U16)
}

impl OutputDevice for Speakers {
    fn init(&mut self, source: Box<dyn Source>) -> Result<(), DeviceError> {
        self.stop();

        let format = source.format();
        let supported = self.stream_config(format)?;
        let (Some(sample_rate), Some(channels)) = (
            SampleRate::new(supported.sample_rate().0),
            ChannelCount::new(supported.channels()),
        ) else {
            return Err(DeviceError::UnsupportedFormat(format));
        };
        let source = source::adapt(source, AudioFormat::new(sample_rate, channels));
        let mut config = supported.config();
        if let Some(frames) = self.buffer_size {
            config.buffer_size = cpal::BufferSize::Fixed(frames);
        }

        use cpal::SampleFormat as F;
        let stream = match supported.sample_format() {
            F::F32 => self.build_stream::<f32>(&config, source),
            F::F64 => self.build_stream::<f64>(&config, source),
            F::I16 => self.build_stream::<i16>(&config, source),
            F::I32 => self.build_stream::<i32>(&config, source),
            F::U8 => self.build_stream::<u8>(&config, source),
            F::U16 => self.build_stream::<u16>(&config, source),
            _ => return Err(DeviceError::UnsupportedFormat(format)),
        }
        .map_err(|err| DeviceError::BuildStream(err.to_string()))?;

        // some backends start streams as soon as they are built
        stream
            .pause()
            .map_err(|err| DeviceError::Pause(err.to_string()))?;

        tracing::debug!(
            %format,
            sample_format = ?supported.sample_format(),
            "output stream built"
        );
        self.stream = Some(stream);
        self.state = DeviceState::Paused;
        Ok(())
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or(DeviceError::NotBound)?;
        stream
            .play()
            .map_err(|err| DeviceError::Play(err.to_string()))?;
        self.state = DeviceState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or(DeviceError::NotBound)?;
        stream
            .pause()
            .map_err(|err| DeviceError::Pause(err.to_string()))?;
        self.state = DeviceState::Paused;
        Ok(())
    }

    fn stop(&mut self) {
        // dropping the stream joins the callback
        self.stream = None;
        self.state = DeviceState::Stopped;
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), DeviceError> {
        self.volume.store(volume, Ordering::Relaxed);
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume.load(Ordering::Relaxed)
    }

    fn state(&self) -> DeviceState {
        self.state
    }
}
