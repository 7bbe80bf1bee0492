//! A simple segment of samples coming from a buffer.
//!
//! The `SamplesBuffer` struct can be used to treat a list of values as a [`Segment`].
//!
//! # Example
//!
//! ```
//! use bgmloop::buffer::SamplesBuffer;
//! use bgmloop::nz;
//! let _ = SamplesBuffer::new(nz!(1), nz!(44100), vec![0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6]);
//! ```
//!

use std::sync::Arc;
use std::time::Duration;

use crate::common::{AudioFormat, ChannelCount, Sample, SampleEncoding, SampleRate};
use crate::segment::{SeekError, Segment};

/// A buffer of samples treated as a segment.
///
/// Cloning is cheap: clones share the sample data but have their own cursor.
#[derive(Debug, Clone)]
pub struct SamplesBuffer {
    data: Arc<[Sample]>,
    pos: usize,
    format: AudioFormat,
}

impl SamplesBuffer {
    /// Builds a new `SamplesBuffer` from interleaved samples.
    ///
    /// A trailing partial frame is kept and played, but does not count towards [`Segment::len`].
    pub fn new<D>(channels: ChannelCount, sample_rate: SampleRate, data: D) -> SamplesBuffer
    where
        D: Into<Vec<Sample>>,
    {
        let data: Vec<Sample> = data.into();
        SamplesBuffer {
            data: data.into(),
            pos: 0,
            format: AudioFormat::new(sample_rate, channels),
        }
    }

    /// Play time of the whole buffer.
    pub fn duration(&self) -> Duration {
        self.format
            .duration_of_frames(self.format.frames_for_samples(self.data.len() as u64))
    }

    /// The interleaved samples held by this buffer.
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.data
    }
}

impl Segment for SamplesBuffer {
    #[inline]
    fn format(&self) -> AudioFormat {
        self.format
    }

    #[inline]
    fn encoding(&self) -> SampleEncoding {
        SampleEncoding::Float(32)
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let remaining = &self.data[self.pos..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.pos += count;
        count
    }

    #[inline]
    fn position(&self) -> u64 {
        self.format.frames_for_samples(self.pos as u64)
    }

    #[inline]
    fn len(&self) -> Option<u64> {
        Some(self.format.frames_for_samples(self.data.len() as u64))
    }

    // this is fast because all the samples are in memory already
    // and due to the constant frame size we can jump to the right
    // sample directly
    #[inline]
    fn seek(&mut self, frame: u64) -> Result<(), SeekError> {
        let new_pos = self.format.samples_for_frames(frame) as usize;
        // saturate pos at the end of the buffer
        self.pos = new_pos.min(self.data.len());
        Ok(())
    }

    #[inline]
    fn has_data(&mut self) -> bool {
        self.pos < self.data.len()
    }
}
