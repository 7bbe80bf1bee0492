//! Streams of samples and the filters that compose them.
//!
//! # The `Source` trait
//!
//! Anything the output device can pull from implements [`Source`]. A source
//! has a fixed [`AudioFormat`] and fills caller-provided buffers of
//! interleaved samples:
//!
//! - [`SegmentSource`] reads one decoded file and runs dry at its end.
//! - [`LoopStream`] restarts a segment whenever it runs dry, forever.
//! - [`IntroLoopStream`] plays an intro segment once, then a [`LoopStream`],
//!   joined at the exact sample boundary.
//! - [`FadeGate`] ramps the gain of another source up or down on request.
//! - [`Elapsed`] counts the frames that went through it.
//! - [`ChannelMapper`] and [`RateConverter`] adapt a source to a device
//!   that cannot play its format, see [`adapt`].
//!
//! A read that returns fewer samples than requested signals the end of the
//! stream. Looping streams never return short under normal operation.

use crate::common::{AudioFormat, Sample};
use crate::segment::SegmentSource;

pub use self::convert::{adapt, ChannelMapper, RateConverter};
pub use self::elapsed::{format_elapsed, Elapsed, ElapsedClock};
pub use self::fade::{FadeGate, FadeHandle, MAX_FADE_DURATION};
pub use self::intro_loop::{IntroLoopStream, Phase};
pub use self::looped::LoopStream;

mod convert;
mod elapsed;
mod fade;
mod intro_loop;
mod looped;

/// A stream of interleaved samples with a fixed format.
pub trait Source: Send {
    /// Format of the samples produced by [`Source::read`].
    fn format(&self) -> AudioFormat;

    /// Fills `buf` with the next samples and returns how many were written.
    ///
    /// A return value smaller than `buf.len()` means the stream has ended.
    /// Must not block and must not panic.
    fn read(&mut self, buf: &mut [Sample]) -> usize;
}

impl<S> Source for Box<S>
where
    S: Source + ?Sized,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> usize {
        (**self).read(buf)
    }
}

impl Source for SegmentSource {
    #[inline]
    fn format(&self) -> AudioFormat {
        SegmentSource::format(self)
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> usize {
        SegmentSource::read(self, buf)
    }
}

/// Error building a composed stream. Always raised before any sample is read.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The intro and loop segments decode to different formats.
    #[error("intro ({intro}) and loop ({looped}) segments have different formats")]
    FormatMismatch {
        /// Format of the intro segment.
        intro: AudioFormat,
        /// Format of the loop segment.
        looped: AudioFormat,
    },
    /// The loop segment holds no samples, looping it would never make progress.
    #[error("loop segment is empty")]
    EmptyLoop,
}

/// The stream handed to the output device for one playback session.
///
/// Either a bare loop or an intro followed by a loop.
#[derive(Debug)]
pub enum ComposedStream {
    /// A single segment repeated forever.
    Loop(LoopStream),
    /// An intro segment played once, then a loop.
    IntroLoop(IntroLoopStream),
}

impl ComposedStream {
    /// Which part of the music is currently being read.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Loop(_) => Phase::Loop,
            Self::IntroLoop(stream) => stream.phase(),
        }
    }
}

impl Source for ComposedStream {
    #[inline]
    fn format(&self) -> AudioFormat {
        match self {
            Self::Loop(stream) => stream.format(),
            Self::IntroLoop(stream) => stream.format(),
        }
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> usize {
        match self {
            Self::Loop(stream) => stream.read(buf),
            Self::IntroLoop(stream) => stream.read(buf),
        }
    }
}

/// Builds the stream for an optional intro and a loop segment.
///
/// Without an intro the result is a bare [`LoopStream`]. Fails if the loop
/// segment is empty or if the two segments have different formats.
pub fn compose(
    intro: Option<SegmentSource>,
    looped: SegmentSource,
) -> Result<ComposedStream, ComposeError> {
    let looped = LoopStream::new(looped)?;
    Ok(match intro {
        Some(intro) => ComposedStream::IntroLoop(IntroLoopStream::new(intro, looped)?),
        None => ComposedStream::Loop(looped),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SamplesBuffer;
    use crate::nz;

    fn segment(channels: u16, rate: u32, samples: Vec<f32>) -> SegmentSource {
        let channels = crate::ChannelCount::new(channels).unwrap();
        let rate = crate::SampleRate::new(rate).unwrap();
        SegmentSource::from_segment("mem", SamplesBuffer::new(channels, rate, samples))
    }

    #[test]
    fn compose_without_intro_is_bare_loop() {
        let stream = compose(None, segment(1, 10, vec![1.0, 2.0])).unwrap();
        assert!(matches!(stream, ComposedStream::Loop(_)));
        assert_eq!(stream.phase(), Phase::Loop);
        assert_eq!(stream.format(), AudioFormat::new(nz!(10), nz!(1)));
    }

    #[test]
    fn compose_with_intro_starts_in_intro() {
        let stream = compose(
            Some(segment(1, 10, vec![9.0])),
            segment(1, 10, vec![1.0, 2.0]),
        )
        .unwrap();
        assert!(matches!(stream, ComposedStream::IntroLoop(_)));
        assert_eq!(stream.phase(), Phase::Intro);
    }

    #[test]
    fn compose_rejects_empty_loop() {
        let err = compose(None, segment(2, 10, Vec::new())).unwrap_err();
        assert!(matches!(err, ComposeError::EmptyLoop));
    }

    #[test]
    fn compose_rejects_mismatched_formats() {
        let err = compose(
            Some(segment(2, 48000, vec![0.0; 4])),
            segment(2, 44100, vec![0.0; 4]),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::FormatMismatch { .. }));
    }
}
