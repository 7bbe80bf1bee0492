//! Wave segments.

use std::io::{Read, Seek};

use dasp_sample::Sample as _;
use hound::{SampleFormat, WavReader};

use super::{SeekError, Segment, SegmentError};
use crate::common::{AudioFormat, ChannelCount, Sample, SampleEncoding, SampleRate};

/// Segment decoded from a RIFF wave file.
///
/// Supports 8, 16, 24 and 32 bit integer PCM and 32 bit float PCM. Length is
/// read from the header and seeking is frame exact.
pub struct WavSegment<R>
where
    R: Read + Seek,
{
    reader: WavReader<R>,
    format: AudioFormat,
    encoding: SampleEncoding,
    total_frames: u64,
    samples_read: u64,
    // Set after a decode error; cleared by a successful seek.
    failed: bool,
}

impl<R> WavSegment<R>
where
    R: Read + Seek,
{
    /// Attempts to decode the data as WAV.
    pub fn new(data: R) -> Result<Self, SegmentError> {
        let reader = WavReader::new(data)?;
        let spec = reader.spec();

        let encoding = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => SampleEncoding::Int(bits),
            (SampleFormat::Float, 32) => SampleEncoding::Float(32),
            (SampleFormat::Int, bits) => {
                return Err(SegmentError::UnsupportedEncoding(SampleEncoding::Int(bits)))
            }
            (SampleFormat::Float, bits) => {
                return Err(SegmentError::UnsupportedEncoding(SampleEncoding::Float(bits)))
            }
        };

        let (Some(sample_rate), Some(channels)) = (
            SampleRate::new(spec.sample_rate),
            ChannelCount::new(spec.channels),
        ) else {
            return Err(SegmentError::EmptyFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            });
        };

        Ok(Self {
            total_frames: u64::from(reader.duration()),
            reader,
            format: AudioFormat::new(sample_rate, channels),
            encoding,
            samples_read: 0,
            failed: false,
        })
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn fill<S, F>(&mut self, buf: &mut [Sample], convert: F) -> usize
    where
        S: hound::Sample,
        F: Fn(S) -> Sample,
    {
        let mut written = 0;
        for (slot, value) in buf.iter_mut().zip(self.reader.samples::<S>()) {
            match value {
                Ok(value) => {
                    *slot = convert(value);
                    written += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "wave decode error, ending segment early");
                    self.failed = true;
                    break;
                }
            }
        }
        written
    }
}

impl<R> Segment for WavSegment<R>
where
    R: Read + Seek + Send,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        self.format
    }

    #[inline]
    fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        if self.failed {
            return 0;
        }

        let written = match self.encoding {
            SampleEncoding::Float(_) => self.fill(buf, |value: f32| value),
            SampleEncoding::Int(8) => self.fill(buf, |value: i8| value.to_sample::<Sample>()),
            SampleEncoding::Int(16) => self.fill(buf, |value: i16| value.to_sample::<Sample>()),
            SampleEncoding::Int(24) => {
                self.fill(buf, |value: i32| (value << 8).to_sample::<Sample>())
            }
            _ => self.fill(buf, |value: i32| value.to_sample::<Sample>()),
        };
        self.samples_read += written as u64;
        written
    }

    #[inline]
    fn position(&self) -> u64 {
        self.format.frames_for_samples(self.samples_read)
    }

    #[inline]
    fn len(&self) -> Option<u64> {
        Some(self.total_frames)
    }

    fn seek(&mut self, frame: u64) -> Result<(), SeekError> {
        // saturate at the end of the segment
        let frame = frame.min(self.total_frames);
        self.reader.seek(frame as u32)?;
        self.samples_read = self.format.samples_for_frames(frame);
        self.failed = false;
        Ok(())
    }
}
