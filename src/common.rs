use std::fmt;
use std::num::{NonZeroU16, NonZeroU32};
use std::time::Duration;

/// Stream sample rate (frames per second).
pub type SampleRate = NonZeroU32;

/// Number of channels in a stream.
pub type ChannelCount = NonZeroU16;

/// Represents value of a single sample.
///
/// Every segment is decoded to interleaved samples of this type before it is
/// handed to the output device.
pub type Sample = f32;

/// The decoded format of a stream: how many interleaved channels it has and
/// how many frames play per second.
///
/// Two streams can only be joined back to back when their formats are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Frames per second.
    pub sample_rate: SampleRate,
    /// Interleaved channels per frame.
    pub channels: ChannelCount,
}

impl AudioFormat {
    /// Creates a new format description.
    #[inline]
    pub const fn new(sample_rate: SampleRate, channels: ChannelCount) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of interleaved samples making up `frames` frames.
    #[inline]
    pub fn samples_for_frames(&self, frames: u64) -> u64 {
        frames * u64::from(self.channels.get())
    }

    /// Number of whole frames covered by `samples` interleaved samples.
    #[inline]
    pub fn frames_for_samples(&self, samples: u64) -> u64 {
        samples / u64::from(self.channels.get())
    }

    /// Number of whole frames that play during `duration`.
    #[inline]
    pub fn frames_for_duration(&self, duration: Duration) -> u64 {
        (duration.as_nanos() * u128::from(self.sample_rate.get()) / 1_000_000_000) as u64
    }

    /// Play time of `frames` frames.
    #[inline]
    pub fn duration_of_frames(&self, frames: u64) -> Duration {
        let rate = u64::from(self.sample_rate.get());
        let secs = frames / rate;
        let nanos = (frames % rate) * 1_000_000_000 / rate;
        Duration::new(secs, nanos as u32)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} ch", self.sample_rate, self.channels)
    }
}

/// How samples were stored in the file a segment was decoded from.
///
/// Informational only: it never takes part in format checks because every
/// encoding is converted to [`Sample`] while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Signed (or 8-bit unsigned) integer PCM with the given bit depth.
    Int(u16),
    /// IEEE float PCM with the given bit depth.
    Float(u16),
    /// Compressed Vorbis packets.
    Vorbis,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nz;

    #[test]
    fn frame_conversions() {
        let format = AudioFormat::new(nz!(44100), nz!(2));
        assert_eq!(format.samples_for_frames(10), 20);
        assert_eq!(format.frames_for_samples(21), 10);
        assert_eq!(format.frames_for_duration(Duration::from_secs(2)), 88200);
        assert_eq!(format.frames_for_duration(Duration::from_millis(10)), 441);
    }

    #[test]
    fn duration_of_frames() {
        let format = AudioFormat::new(nz!(1000), nz!(1));
        assert_eq!(format.duration_of_frames(1500), Duration::from_millis(1500));
        assert_eq!(format.duration_of_frames(0), Duration::ZERO);
    }

    #[test]
    fn display() {
        let format = AudioFormat::new(nz!(48000), nz!(2));
        assert_eq!(format.to_string(), "48000 Hz, 2 ch");
    }
}
