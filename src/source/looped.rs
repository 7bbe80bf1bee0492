use crate::common::{AudioFormat, Sample};
use crate::segment::SegmentSource;

use super::{ComposeError, Source};

/// A source that repeats a segment forever.
///
/// Whenever the segment runs dry it is rewound to its first frame and reading
/// continues into the same buffer, so callers never see a short read.
#[derive(Debug)]
pub struct LoopStream {
    segment: SegmentSource,
    loops: u64,
    // Set once the segment cannot be restarted; later reads return short.
    stalled: bool,
}

impl LoopStream {
    /// Wraps `segment`, which must hold at least one sample.
    pub fn new(mut segment: SegmentSource) -> Result<Self, ComposeError> {
        if segment.is_empty() || !segment.has_data() {
            return Err(ComposeError::EmptyLoop);
        }
        Ok(Self {
            segment,
            loops: 0,
            stalled: false,
        })
    }

    /// Number of times the segment has been restarted.
    #[inline]
    pub fn loops(&self) -> u64 {
        self.loops
    }

    /// Returns `true` once the segment could not be restarted.
    ///
    /// A stalled stream only hands out what is left of the current pass and
    /// then reads short.
    #[inline]
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Frame position inside the current pass over the segment.
    #[inline]
    pub fn position(&self) -> u64 {
        self.segment.position()
    }

    /// Returns a reference to the looped segment.
    #[inline]
    pub fn inner(&self) -> &SegmentSource {
        &self.segment
    }

    /// Returns the looped segment.
    #[inline]
    pub fn into_inner(self) -> SegmentSource {
        self.segment
    }
}

impl Source for LoopStream {
    #[inline]
    fn format(&self) -> AudioFormat {
        self.segment.format()
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let mut written = 0;
        // Set right after a rewind, cleared by any read that makes progress.
        let mut rewound = false;

        while written < buf.len() {
            let count = self.segment.read(&mut buf[written..]);
            if count > 0 {
                written += count;
                rewound = false;
                continue;
            }

            if self.stalled {
                break;
            }

            if rewound {
                tracing::warn!(
                    path = %self.segment.path().display(),
                    "loop segment produced no samples after a rewind"
                );
                self.stalled = true;
                break;
            }

            if let Err(err) = self.segment.rewind() {
                tracing::warn!(
                    path = %self.segment.path().display(),
                    error = %err,
                    "could not rewind loop segment"
                );
                self.stalled = true;
                break;
            }
            rewound = true;
            self.loops += 1;
            tracing::trace!(loops = self.loops, "loop segment restarted");
        }

        written
    }
}
