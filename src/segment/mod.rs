//! Decoded audio segments.
//!
//! A segment is one file's worth of audio (an intro or a loop), decoded to
//! interleaved [`Sample`]s with a cursor that can be moved back to the start.
//! The codec is picked from the file extension:
//!
//! - `.wav` files are read with [`hound`] (feature `wav`).
//! - `.ogg` files are read with [`lewton`] (feature `vorbis`).
//!
//! [`SamplesBuffer`](crate::buffer::SamplesBuffer) is an in-memory segment
//! for audio that is already decoded.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use crate::common::{AudioFormat, Sample, SampleEncoding};

#[cfg(feature = "vorbis")]
pub mod vorbis;
#[cfg(feature = "wav")]
pub mod wav;

#[cfg(feature = "vorbis")]
pub use self::vorbis::VorbisSegment;
#[cfg(feature = "wav")]
pub use self::wav::WavSegment;

/// A decoder over a single audio file.
///
/// Reads never block and never fail: once the end of the data is reached
/// `read` returns fewer samples than requested, possibly zero.
pub trait Segment: Send {
    /// Format of the decoded samples.
    fn format(&self) -> AudioFormat;

    /// How the samples are stored in the underlying file.
    fn encoding(&self) -> SampleEncoding;

    /// Fills `buf` with the next interleaved samples and returns how many were written.
    fn read(&mut self, buf: &mut [Sample]) -> usize;

    /// Frames consumed so far.
    fn position(&self) -> u64;

    /// Total length in frames, `None` if the codec cannot tell without decoding everything.
    fn len(&self) -> Option<u64>;

    /// Moves the cursor to `frame`. Every segment supports seeking to frame 0.
    fn seek(&mut self, frame: u64) -> Result<(), SeekError>;

    /// Returns `true` if a read at the current position would produce samples.
    ///
    /// Implementations with an unknown length may decode ahead to answer.
    fn has_data(&mut self) -> bool {
        self.len().is_none_or(|len| self.position() < len)
    }
}

/// Error returned when moving a segment's cursor fails.
#[derive(Debug, thiserror::Error)]
pub enum SeekError {
    /// The codec cannot move to this frame.
    #[error("seeking to frame {frame} is not supported by this decoder")]
    NotSupported {
        /// Requested frame.
        frame: u64,
    },
    /// The underlying file could not be repositioned.
    #[error("could not reposition the underlying file")]
    Io(#[from] io::Error),
    /// Re-reading the stream headers after a rewind failed.
    #[error("could not restart the decoder")]
    Restart(#[source] Box<SegmentError>),
}

/// Error that can happen when opening a segment.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// The file does not exist.
    #[error("audio file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The file extension does not belong to a supported (or enabled) codec.
    #[error("unsupported audio format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    /// The file could not be read.
    #[error("could not read audio file")]
    Io(#[from] io::Error),
    /// The WAV reader rejected the file.
    #[cfg(feature = "wav")]
    #[error("invalid wave data")]
    Wav(#[from] hound::Error),
    /// The Vorbis reader rejected the file.
    #[cfg(feature = "vorbis")]
    #[error("invalid vorbis data")]
    Vorbis(#[from] lewton::VorbisError),
    /// The file is valid but stores samples in a layout that is not decoded.
    #[error("unsupported sample encoding: {0:?}")]
    UnsupportedEncoding(SampleEncoding),
    /// The file declares zero channels or a zero sample rate.
    #[error("audio file declares an empty format (rate {sample_rate}, channels {channels})")]
    EmptyFormat {
        /// Declared sample rate.
        sample_rate: u32,
        /// Declared channel count.
        channels: u16,
    },
}

/// The containers a segment can be opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// RIFF wave, uncompressed PCM.
    Wav,
    /// Ogg container with a Vorbis stream.
    Vorbis,
}

impl SegmentKind {
    /// Selects the container from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("wav") {
            Some(Self::Wav)
        } else if extension.eq_ignore_ascii_case("ogg") {
            Some(Self::Vorbis)
        } else {
            None
        }
    }
}

/// A decoded segment together with the path it was opened from.
///
/// The decoder is closed when this value is dropped.
pub struct SegmentSource {
    path: PathBuf,
    segment: Box<dyn Segment>,
}

impl SegmentSource {
    /// Opens `path`, choosing the decoder from its extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SegmentError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SegmentError::NotFound(path.to_path_buf()));
        }

        let segment: Box<dyn Segment> = match SegmentKind::from_path(path) {
            #[cfg(feature = "wav")]
            Some(SegmentKind::Wav) => {
                let file = BufReader::new(File::open(path)?);
                Box::new(wav::WavSegment::new(file)?)
            }
            #[cfg(feature = "vorbis")]
            Some(SegmentKind::Vorbis) => {
                let file = BufReader::new(File::open(path)?);
                Box::new(vorbis::VorbisSegment::new(file)?)
            }
            _ => return Err(SegmentError::UnsupportedFormat(path.to_path_buf())),
        };

        tracing::debug!(
            path = %path.display(),
            format = %segment.format(),
            frames = ?segment.len(),
            "opened segment"
        );
        Ok(Self::from_segment(path, segment))
    }

    /// Wraps an already constructed decoder.
    pub fn from_segment(path: impl Into<PathBuf>, segment: impl Into<Box<dyn Segment>>) -> Self {
        Self {
            path: path.into(),
            segment: segment.into(),
        }
    }

    /// Path the segment was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format of the decoded samples.
    #[inline]
    pub fn format(&self) -> AudioFormat {
        self.segment.format()
    }

    /// How the samples are stored in the file.
    #[inline]
    pub fn encoding(&self) -> SampleEncoding {
        self.segment.encoding()
    }

    /// Fills `buf` and returns how many samples were written. Short at the end of the data.
    #[inline]
    pub fn read(&mut self, buf: &mut [Sample]) -> usize {
        self.segment.read(buf)
    }

    /// Frames consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.segment.position()
    }

    /// Total length in frames, if known.
    #[inline]
    pub fn len(&self) -> Option<u64> {
        self.segment.len()
    }

    /// Returns `true` if the segment is known to hold no frames at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segment.len() == Some(0)
    }

    /// Moves the cursor to `frame`.
    #[inline]
    pub fn seek(&mut self, frame: u64) -> Result<(), SeekError> {
        self.segment.seek(frame)
    }

    /// Moves the cursor back to the first frame.
    #[inline]
    pub fn rewind(&mut self) -> Result<(), SeekError> {
        self.segment.seek(0)
    }

    /// Returns `true` once the cursor sits at (or past) the known end.
    ///
    /// Segments of unknown length only report exhaustion through a short read.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.segment
            .len()
            .is_some_and(|len| self.segment.position() >= len)
    }

    /// See [`Segment::has_data`].
    #[inline]
    pub fn has_data(&mut self) -> bool {
        self.segment.has_data()
    }
}

impl fmt::Debug for SegmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentSource")
            .field("path", &self.path)
            .field("format", &self.segment.format())
            .field("position", &self.segment.position())
            .field("len", &self.segment.len())
            .finish()
    }
}

impl<S> From<S> for Box<dyn Segment>
where
    S: Segment + 'static,
{
    fn from(segment: S) -> Self {
        Box::new(segment)
    }
}

/// Opens segments for the playback engine.
///
/// Injected into [`PlaybackEngine`](crate::PlaybackEngine) so callers can
/// supply decoders that do not come from the file system.
pub trait SegmentOpener: Send {
    /// Opens the segment stored at `path`.
    ///
    /// Must return [`SegmentError::NotFound`] if nothing exists at `path`.
    fn open(&self, path: &Path) -> Result<SegmentSource, SegmentError>;
}

/// Opens segments from files, see [`SegmentSource::open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSegments;

impl SegmentOpener for FileSegments {
    fn open(&self, path: &Path) -> Result<SegmentSource, SegmentError> {
        SegmentSource::open(path)
    }
}

impl<F> SegmentOpener for F
where
    F: Fn(&Path) -> Result<SegmentSource, SegmentError> + Send,
{
    fn open(&self, path: &Path) -> Result<SegmentSource, SegmentError> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SamplesBuffer;
    use crate::nz;

    #[test]
    fn kind_from_extension() {
        assert_eq!(SegmentKind::from_path(Path::new("a/b_loop.wav")), Some(SegmentKind::Wav));
        assert_eq!(SegmentKind::from_path(Path::new("B_INTRO.OGG")), Some(SegmentKind::Vorbis));
        assert_eq!(SegmentKind::from_path(Path::new("track.mp3")), None);
        assert_eq!(SegmentKind::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = SegmentSource::open("definitely/not/here.wav").unwrap_err();
        assert!(matches!(err, SegmentError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        let err = SegmentSource::open(file.path()).unwrap_err();
        assert!(matches!(err, SegmentError::UnsupportedFormat(_)));
    }

    #[test]
    fn exhaustion_follows_position() {
        let buffer = SamplesBuffer::new(nz!(1), nz!(10), vec![0.1, 0.2, 0.3]);
        let mut source = SegmentSource::from_segment("mem", buffer);
        assert!(!source.is_exhausted());

        let mut buf = [0.0; 3];
        assert_eq!(source.read(&mut buf), 3);
        assert!(source.is_exhausted());
        assert!(!source.has_data());

        source.rewind().unwrap();
        assert_eq!(source.position(), 0);
        assert!(source.has_data());
    }
}
