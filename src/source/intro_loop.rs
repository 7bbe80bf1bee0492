use crate::common::{AudioFormat, Sample};
use crate::segment::SegmentSource;

use super::{ComposeError, LoopStream, Source};

/// Which part of the music a stream is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The one-shot intro segment.
    Intro,
    /// The repeating loop segment.
    Loop,
}

/// Plays an intro segment once, then a [`LoopStream`] forever.
///
/// The loop starts on the sample right after the last intro sample, even when
/// the boundary falls in the middle of a caller's buffer. The intro decoder is
/// dropped as soon as it runs dry.
#[derive(Debug)]
pub struct IntroLoopStream {
    intro: Option<SegmentSource>,
    looped: LoopStream,
}

impl IntroLoopStream {
    /// Joins `intro` and `looped`, which must share the same [`AudioFormat`].
    pub fn new(intro: SegmentSource, looped: LoopStream) -> Result<Self, ComposeError> {
        if intro.format() != looped.format() {
            return Err(ComposeError::FormatMismatch {
                intro: intro.format(),
                looped: looped.format(),
            });
        }

        Ok(Self {
            intro: Some(intro),
            looped,
        })
    }

    /// Which segment the next read starts from.
    #[inline]
    pub fn phase(&self) -> Phase {
        if self.intro.is_some() {
            Phase::Intro
        } else {
            Phase::Loop
        }
    }

    /// Returns a reference to the loop half of the stream.
    #[inline]
    pub fn looped(&self) -> &LoopStream {
        &self.looped
    }

    fn finish_intro(&mut self) {
        if let Some(intro) = self.intro.take() {
            tracing::debug!(
                path = %intro.path().display(),
                frames = intro.position(),
                "intro finished, entering loop"
            );
        }
    }
}

impl Source for IntroLoopStream {
    #[inline]
    fn format(&self) -> AudioFormat {
        self.looped.format()
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let Some(intro) = self.intro.as_mut() else {
            return self.looped.read(buf);
        };

        let count = intro.read(buf);
        if count == buf.len() {
            // A full read may have ended exactly on the last intro frame.
            if intro.is_exhausted() {
                self.finish_intro();
            }
            return count;
        }

        self.finish_intro();
        count + self.looped.read(&mut buf[count..])
    }
}
