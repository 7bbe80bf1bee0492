use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{AudioFormat, Sample};

use super::Source;

/// Filter that counts the frames read through it.
#[derive(Debug)]
pub struct Elapsed<S> {
    input: S,
    frames: Arc<AtomicU64>,
    // Samples of a frame that a read ended in the middle of.
    leftover: u64,
}

impl<S> Elapsed<S>
where
    S: Source,
{
    /// Wraps `input` with a counter starting at zero.
    pub fn new(input: S) -> Self {
        Self {
            input,
            frames: Arc::new(AtomicU64::new(0)),
            leftover: 0,
        }
    }

    /// A clock reading the counter from any thread.
    pub fn clock(&self) -> ElapsedClock {
        ElapsedClock {
            frames: self.frames.clone(),
            format: self.input.format(),
        }
    }

    /// Returns the inner source.
    #[inline]
    pub fn into_inner(self) -> S {
        self.input
    }
}

impl<S> Source for Elapsed<S>
where
    S: Source,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        self.input.format()
    }

    #[inline]
    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let count = self.input.read(buf);
        let channels = u64::from(self.format().channels.get());
        let samples = self.leftover + count as u64;
        self.leftover = samples % channels;
        self.frames.fetch_add(samples / channels, Ordering::Relaxed);
        count
    }
}

/// Shared view of an [`Elapsed`] counter.
#[derive(Debug, Clone)]
pub struct ElapsedClock {
    frames: Arc<AtomicU64>,
    format: AudioFormat,
}

impl ElapsedClock {
    /// Frames read so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Play time of the frames read so far.
    pub fn elapsed(&self) -> Duration {
        self.format.duration_of_frames(self.frames())
    }
}

/// Renders a play time as `mm:ss`, or `hh:mm:ss` from one hour on.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SamplesBuffer;
    use crate::nz;
    use crate::segment::SegmentSource;

    #[test]
    fn counts_frames_not_samples() {
        let buffer = SamplesBuffer::new(nz!(2), nz!(4), vec![0.0; 16]);
        let mut source = Elapsed::new(SegmentSource::from_segment("mem", buffer));
        let clock = source.clock();

        let mut buf = [0.0; 6];
        source.read(&mut buf);
        assert_eq!(clock.frames(), 3);
        source.read(&mut buf);
        assert_eq!(clock.frames(), 6);
        assert_eq!(clock.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn short_reads_count_what_was_read() {
        let buffer = SamplesBuffer::new(nz!(1), nz!(4), vec![0.0; 3]);
        let mut source = Elapsed::new(SegmentSource::from_segment("mem", buffer));
        let mut buf = [0.0; 10];
        assert_eq!(source.read(&mut buf), 3);
        assert_eq!(source.clock().frames(), 3);
    }

    #[test]
    fn reads_ending_mid_frame_do_not_drift() {
        let buffer = SamplesBuffer::new(nz!(2), nz!(4), vec![0.0; 64]);
        let mut source = Elapsed::new(SegmentSource::from_segment("mem", buffer));
        let clock = source.clock();

        let mut buf = [0.0; 3];
        source.read(&mut buf);
        assert_eq!(clock.frames(), 1);
        for _ in 0..9 {
            source.read(&mut buf);
        }
        assert_eq!(clock.frames(), 15);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00");
        assert_eq!(format_elapsed(Duration::from_millis(65_900)), "01:05");
        assert_eq!(format_elapsed(Duration::from_secs(3599)), "59:59");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "01:02:03");
    }
}
