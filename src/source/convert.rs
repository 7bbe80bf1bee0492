use crate::common::{AudioFormat, ChannelCount, Sample, SampleRate};
use crate::math;

use super::Source;

/// Frames pulled from the input per refill.
const BLOCK_FRAMES: usize = 512;

/// Buffers reads from a source and hands them out one frame at a time.
#[derive(Debug)]
struct FrameReader {
    block: Vec<Sample>,
    cursor: usize,
    len: usize,
}

impl FrameReader {
    fn new() -> Self {
        Self {
            block: Vec::new(),
            cursor: 0,
            len: 0,
        }
    }

    /// Copies the next whole frame into `frame`. Returns `false` once the input ran dry.
    fn next<S: Source>(&mut self, input: &mut S, frame: &mut [Sample]) -> bool {
        if self.len - self.cursor < frame.len() {
            let rest = self.len - self.cursor;
            self.block.copy_within(self.cursor..self.len, 0);
            self.block.resize(rest.max(frame.len() * BLOCK_FRAMES), 0.0);
            self.len = rest + input.read(&mut self.block[rest..]);
            self.cursor = 0;
            if self.len < frame.len() {
                return false;
            }
        }
        frame.copy_from_slice(&self.block[self.cursor..self.cursor + frame.len()]);
        self.cursor += frame.len();
        true
    }
}

/// Output frames generated but not handed out yet.
#[derive(Debug)]
struct Staged {
    samples: Vec<Sample>,
    cursor: usize,
}

impl Staged {
    fn drain_into(&mut self, buf: &mut [Sample]) -> usize {
        let available = &self.samples[self.cursor..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.cursor += count;
        count
    }

    fn is_drained(&self) -> bool {
        self.cursor >= self.samples.len()
    }
}

/// Filter that changes the number of channels.
///
/// Output channel `n` copies input channel `n % from`: mono is duplicated to
/// every output channel, and extra input channels are dropped.
#[derive(Debug)]
pub struct ChannelMapper<S> {
    input: S,
    to: ChannelCount,
    reader: FrameReader,
    frame: Vec<Sample>,
    staged: Staged,
}

impl<S> ChannelMapper<S>
where
    S: Source,
{
    /// Maps `input` onto `to` channels.
    pub fn new(input: S, to: ChannelCount) -> Self {
        let from = usize::from(input.format().channels.get());
        Self {
            input,
            to,
            reader: FrameReader::new(),
            frame: vec![0.0; from],
            staged: Staged {
                samples: Vec::new(),
                cursor: 0,
            },
        }
    }

    /// Returns the inner source.
    #[inline]
    pub fn into_inner(self) -> S {
        self.input
    }
}

impl<S> Source for ChannelMapper<S>
where
    S: Source,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        AudioFormat::new(self.input.format().sample_rate, self.to)
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let to = usize::from(self.to.get());
        let mut written = 0;
        loop {
            written += self.staged.drain_into(&mut buf[written..]);
            if written == buf.len() {
                return written;
            }

            let wanted = (buf.len() - written).div_ceil(to);
            self.staged.samples.clear();
            self.staged.cursor = 0;
            for _ in 0..wanted {
                if !self.reader.next(&mut self.input, &mut self.frame) {
                    break;
                }
                let from = self.frame.len();
                self.staged
                    .samples
                    .extend((0..to).map(|channel| self.frame[channel % from]));
            }
            if self.staged.samples.is_empty() {
                return written;
            }
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Filter that changes the sample rate by linear interpolation between frames.
///
/// Rates are reduced by their greatest common divisor so that every `from`
/// input frames map onto exactly `to` output frames.
#[derive(Debug)]
pub struct RateConverter<S> {
    input: S,
    target: SampleRate,
    from: u32,
    to: u32,
    reader: FrameReader,
    current: Vec<Sample>,
    next: Vec<Sample>,
    // Position of `current` inside the chunk of `from` input frames.
    current_pos: u32,
    // Position of the next output frame inside the chunk of `to` output frames.
    output_pos: u32,
    has_next: bool,
    ended: bool,
    staged: Staged,
}

impl<S> RateConverter<S>
where
    S: Source,
{
    /// Resamples `input` to `target`.
    pub fn new(mut input: S, target: SampleRate) -> Self {
        let format = input.format();
        let channels = usize::from(format.channels.get());
        let divisor = gcd(format.sample_rate.get(), target.get());

        let mut reader = FrameReader::new();
        let mut current = vec![0.0; channels];
        let mut next = vec![0.0; channels];
        let ended = !reader.next(&mut input, &mut current);
        let has_next = !ended && reader.next(&mut input, &mut next);

        Self {
            input,
            target,
            from: format.sample_rate.get() / divisor,
            to: target.get() / divisor,
            reader,
            current,
            next,
            current_pos: 0,
            output_pos: 0,
            has_next,
            ended,
            staged: Staged {
                samples: Vec::new(),
                cursor: 0,
            },
        }
    }

    /// Returns the inner source.
    #[inline]
    pub fn into_inner(self) -> S {
        self.input
    }

    fn advance(&mut self) {
        self.current_pos += 1;
        if !self.has_next {
            self.ended = true;
            return;
        }
        std::mem::swap(&mut self.current, &mut self.next);
        self.has_next = self.reader.next(&mut self.input, &mut self.next);
    }

    /// Appends the next output frame to the staged samples.
    fn push_frame(&mut self) -> bool {
        if self.ended {
            return false;
        }
        if self.from == self.to {
            self.staged.samples.extend_from_slice(&self.current);
            self.advance();
            return true;
        }

        if self.output_pos == self.to {
            self.output_pos = 0;
            while !self.ended && self.current_pos != self.from {
                self.advance();
            }
            self.current_pos = 0;
        } else {
            let left = u64::from(self.from) * u64::from(self.output_pos) / u64::from(self.to);
            while !self.ended && u64::from(self.current_pos) != left {
                self.advance();
            }
        }
        if self.ended {
            return false;
        }

        let numerator = u64::from(self.from) * u64::from(self.output_pos) % u64::from(self.to);
        if self.has_next {
            for (&a, &b) in self.current.iter().zip(&self.next) {
                let sample = math::lerp(a, b, numerator, u64::from(self.to));
                self.staged.samples.push(sample);
            }
        } else {
            // the last input frame has nothing to interpolate towards
            self.staged.samples.extend_from_slice(&self.current);
            self.ended = true;
        }
        self.output_pos += 1;
        true
    }
}

impl<S> Source for RateConverter<S>
where
    S: Source,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        AudioFormat::new(self.target, self.input.format().channels)
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let channels = self.current.len();
        let mut written = 0;
        loop {
            written += self.staged.drain_into(&mut buf[written..]);
            if written == buf.len() {
                return written;
            }

            let wanted = (buf.len() - written).div_ceil(channels);
            self.staged.samples.clear();
            self.staged.cursor = 0;
            for _ in 0..wanted {
                if !self.push_frame() {
                    break;
                }
            }
            if self.staged.is_drained() {
                return written;
            }
        }
    }
}

/// Converts `source` to `target`, skipping whatever conversion is not needed.
pub fn adapt<S>(source: S, target: AudioFormat) -> Box<dyn Source>
where
    S: Source + 'static,
{
    let format = source.format();
    match (
        format.channels == target.channels,
        format.sample_rate == target.sample_rate,
    ) {
        (true, true) => Box::new(source),
        (false, true) => Box::new(ChannelMapper::new(source, target.channels)),
        (true, false) => Box::new(RateConverter::new(source, target.sample_rate)),
        (false, false) => Box::new(RateConverter::new(
            ChannelMapper::new(source, target.channels),
            target.sample_rate,
        )),
    }
}
