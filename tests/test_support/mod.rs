#![allow(dead_code)]
/// in separate folder so its not ran as integration test
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bgmloop::buffer::SamplesBuffer;
use bgmloop::{
    ChannelCount, DeviceError, DeviceFactory, DeviceState, OutputDevice, PlaybackEngine,
    SampleRate, SegmentError, SegmentOpener, SegmentSource, Source,
};

pub fn channels(n: u16) -> ChannelCount {
    ChannelCount::new(n).unwrap()
}

pub fn rate(n: u32) -> SampleRate {
    SampleRate::new(n).unwrap()
}

/// `frames` frames whose samples count up from `start`, so every sample is unique.
pub fn ramp(channel_count: u16, sample_rate: u32, frames: usize, start: f32) -> SamplesBuffer {
    let samples: Vec<f32> = (0..frames * usize::from(channel_count))
        .map(|n| start + n as f32)
        .collect();
    SamplesBuffer::new(channels(channel_count), rate(sample_rate), samples)
}

pub fn constant(channel_count: u16, sample_rate: u32, frames: usize, value: f32) -> SamplesBuffer {
    let samples = vec![value; frames * usize::from(channel_count)];
    SamplesBuffer::new(channels(channel_count), rate(sample_rate), samples)
}

pub fn segment(buffer: SamplesBuffer) -> SegmentSource {
    SegmentSource::from_segment("mem", buffer)
}

/// Reads `samples` samples in chunks of at most `chunk`, the way a device callback would.
pub fn read_chunked(source: &mut impl Source, samples: usize, chunk: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples);
    let mut buf = vec![0.0; chunk];
    while out.len() < samples {
        let want = chunk.min(samples - out.len());
        let count = source.read(&mut buf[..want]);
        out.extend_from_slice(&buf[..count]);
        if count < want {
            break;
        }
    }
    out
}

/// Reads a segment from start to end.
pub fn read_all(mut source: SegmentSource) -> Vec<f32> {
    let mut out = Vec::new();
    let mut buf = [0.0; 1024];
    loop {
        let count = source.read(&mut buf);
        out.extend_from_slice(&buf[..count]);
        if count == 0 {
            return out;
        }
    }
}

/// Writes a 16 bit wave file whose samples count up from `start` (wrapping).
pub fn write_wav(
    dir: &Path,
    name: &str,
    channel_count: u16,
    sample_rate: u32,
    frames: usize,
    start: i16,
) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: channel_count,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for n in 0..frames * usize::from(channel_count) {
        writer.write_sample(start.wrapping_add(n as i16)).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Writes an Ogg Vorbis file holding `frames` frames of a sine at `freq` Hz.
pub fn write_ogg(
    dir: &Path,
    name: &str,
    channel_count: u8,
    sample_rate: u32,
    frames: usize,
    freq: f32,
) -> PathBuf {
    let path = dir.join(name);
    let file = std::io::BufWriter::new(std::fs::File::create(&path).unwrap());
    let mut encoder = vorbis_rs::VorbisEncoderBuilder::new(
        std::num::NonZeroU32::new(sample_rate).unwrap(),
        std::num::NonZeroU8::new(channel_count).unwrap(),
        file,
    )
    .unwrap()
    .build()
    .unwrap();

    let wave: Vec<f32> = (0..frames)
        .map(|n| 0.5 * (std::f32::consts::TAU * freq * n as f32 / sample_rate as f32).sin())
        .collect();
    // odd block size so blocks and pages do not line up with the length
    for block in wave.chunks(777) {
        let planar = vec![block; usize::from(channel_count)];
        encoder.encode_audio_block(&planar).unwrap();
    }
    encoder.finish().unwrap().into_inner().unwrap();
    path
}

/// Serves in-memory buffers by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    buffers: HashMap<PathBuf, SamplesBuffer>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, buffer: SamplesBuffer) -> Self {
        self.buffers.insert(PathBuf::from(path), buffer);
        self
    }
}

impl SegmentOpener for MemoryOpener {
    fn open(&self, path: &Path) -> Result<SegmentSource, SegmentError> {
        let buffer = self
            .buffers
            .get(path)
            .ok_or_else(|| SegmentError::NotFound(path.to_path_buf()))?;
        Ok(SegmentSource::from_segment(path, buffer.clone()))
    }
}

struct Slot {
    source: Option<Box<dyn Source>>,
    state: DeviceState,
    volume: f32,
}

struct ProbeInner {
    slot: Mutex<Slot>,
    live: AtomicUsize,
    created: AtomicUsize,
    fail_create: AtomicBool,
    fail_play: AtomicBool,
}

/// Watches the mock devices of one engine and pulls from them.
#[derive(Clone)]
pub struct Probe {
    inner: Arc<ProbeInner>,
}

impl Probe {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProbeInner {
                slot: Mutex::new(Slot {
                    source: None,
                    state: DeviceState::Stopped,
                    volume: 1.0,
                }),
                live: AtomicUsize::new(0),
                created: AtomicUsize::new(0),
                fail_create: AtomicBool::new(false),
                fail_play: AtomicBool::new(false),
            }),
        }
    }

    pub fn factory(&self) -> MockFactory {
        MockFactory {
            probe: self.clone(),
        }
    }

    /// Devices created and not yet dropped.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Devices created so far.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> DeviceState {
        self.inner.slot.lock().unwrap().state
    }

    pub fn volume(&self) -> f32 {
        self.inner.slot.lock().unwrap().volume
    }

    pub fn is_bound(&self) -> bool {
        self.inner.slot.lock().unwrap().source.is_some()
    }

    pub fn fail_create(&self, fail: bool) {
        self.inner.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_play(&self, fail: bool) {
        self.inner.fail_play.store(fail, Ordering::SeqCst);
    }

    /// Pulls `samples` samples if the device is playing, nothing otherwise.
    pub fn pull(&self, samples: usize) -> Vec<f32> {
        let mut slot = self.inner.slot.lock().unwrap();
        if slot.state != DeviceState::Playing {
            return Vec::new();
        }
        let Some(source) = slot.source.as_mut() else {
            return Vec::new();
        };
        read_chunked(source, samples, 256)
    }
}

pub struct MockFactory {
    probe: Probe,
}

impl DeviceFactory for MockFactory {
    fn create(&mut self) -> Result<Box<dyn OutputDevice>, DeviceError> {
        let inner = &self.probe.inner;
        if inner.fail_create.load(Ordering::SeqCst) {
            return Err(DeviceError::NoDevice);
        }
        inner.created.fetch_add(1, Ordering::SeqCst);
        inner.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDevice {
            probe: self.probe.clone(),
        }))
    }
}

pub struct MockDevice {
    probe: Probe,
}

impl MockDevice {
    fn slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.probe.inner.slot.lock().unwrap()
    }
}

impl OutputDevice for MockDevice {
    fn init(&mut self, source: Box<dyn Source>) -> Result<(), DeviceError> {
        let mut slot = self.slot();
        slot.source = Some(source);
        slot.state = DeviceState::Paused;
        Ok(())
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        if self.probe.inner.fail_play.load(Ordering::SeqCst) {
            return Err(DeviceError::Play("mock driver failure".to_string()));
        }
        let mut slot = self.slot();
        if slot.source.is_none() {
            return Err(DeviceError::NotBound);
        }
        slot.state = DeviceState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        let mut slot = self.slot();
        if slot.source.is_none() {
            return Err(DeviceError::NotBound);
        }
        slot.state = DeviceState::Paused;
        Ok(())
    }

    fn stop(&mut self) {
        let mut slot = self.slot();
        slot.source = None;
        slot.state = DeviceState::Stopped;
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), DeviceError> {
        self.slot().volume = volume;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.slot().volume
    }

    fn state(&self) -> DeviceState {
        self.slot().state
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.probe.inner.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An engine playing from `opener` on mock devices.
pub fn engine(opener: MemoryOpener) -> (PlaybackEngine, Probe) {
    let probe = Probe::new();
    let engine = PlaybackEngine::builder(probe.factory())
        .with_opener(opener)
        .build()
        .unwrap();
    (engine, probe)
}
