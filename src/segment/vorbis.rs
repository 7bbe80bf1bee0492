//! Ogg Vorbis segments.

use std::io::{Read, Seek};

use lewton::inside_ogg::OggStreamReader;
use lewton::samples::InterleavedSamples;

use super::{SeekError, Segment, SegmentError};
use crate::common::{AudioFormat, ChannelCount, Sample, SampleEncoding, SampleRate};

/// Segment decoded from an Ogg Vorbis stream.
///
/// Vorbis is decoded one packet at a time, so the length is unknown up
/// front and only a rewind to the first frame is supported. Rewinding
/// restarts the reader on the rewound byte stream, which keeps the loop
/// seam sample exact.
pub struct VorbisSegment<R>
where
    R: Read + Seek,
{
    stream: Option<OggStreamReader<R>>,
    format: AudioFormat,
    // Decoded samples of the current packet not yet handed out.
    pending: Vec<Sample>,
    cursor: usize,
    samples_read: u64,
    // Frames staged since the start of the stream, checked against the granule position.
    frames_decoded: u64,
    ended: bool,
}

impl<R> VorbisSegment<R>
where
    R: Read + Seek,
{
    /// Attempts to decode the data as Ogg Vorbis.
    pub fn new(data: R) -> Result<Self, SegmentError> {
        let stream = OggStreamReader::new(data)?;
        let header = &stream.ident_hdr;

        let (Some(sample_rate), Some(channels)) = (
            SampleRate::new(header.audio_sample_rate),
            ChannelCount::new(u16::from(header.audio_channels)),
        ) else {
            return Err(SegmentError::EmptyFormat {
                sample_rate: header.audio_sample_rate,
                channels: u16::from(header.audio_channels),
            });
        };

        Ok(Self {
            stream: Some(stream),
            format: AudioFormat::new(sample_rate, channels),
            pending: Vec::new(),
            cursor: 0,
            samples_read: 0,
            frames_decoded: 0,
            ended: false,
        })
    }

    /// Decodes packets until one with samples turns up. Returns `false` at the end of the stream.
    fn refill(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            self.ended = true;
            return false;
        };

        let channels = usize::from(self.format.channels.get());
        loop {
            match stream.read_dec_packet_generic::<InterleavedSamples<f32>>() {
                Ok(Some(mut packet)) => {
                    // The granule position of the last page marks the true end,
                    // the final packet is padded past it.
                    if let Some(end) = stream.get_last_absgp() {
                        let remaining = end.saturating_sub(self.frames_decoded);
                        let frames = (packet.samples.len() / channels) as u64;
                        if frames > remaining {
                            tracing::trace!(
                                dropped = frames - remaining,
                                "trimmed vorbis end padding"
                            );
                            packet.samples.truncate(remaining as usize * channels);
                        }
                    }
                    // header-adjacent packets may decode to nothing
                    if packet.samples.is_empty() {
                        continue;
                    }
                    self.frames_decoded += (packet.samples.len() / channels) as u64;
                    self.pending = packet.samples;
                    self.cursor = 0;
                    return true;
                }
                Ok(None) => {
                    self.ended = true;
                    return false;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "vorbis decode error, ending segment early");
                    self.ended = true;
                    return false;
                }
            }
        }
    }

    fn restart(&mut self) -> Result<(), SeekError> {
        let Some(stream) = self.stream.take() else {
            return Err(SeekError::NotSupported { frame: 0 });
        };

        let mut data = stream.into_inner().into_inner();
        data.rewind()?;
        let stream =
            OggStreamReader::new(data).map_err(|err| SeekError::Restart(Box::new(err.into())))?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl<R> Segment for VorbisSegment<R>
where
    R: Read + Seek + Send,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        self.format
    }

    #[inline]
    fn encoding(&self) -> SampleEncoding {
        SampleEncoding::Vorbis
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            if self.cursor >= self.pending.len() && (self.ended || !self.refill()) {
                break;
            }

            let available = &self.pending[self.cursor..];
            let count = available.len().min(buf.len() - written);
            buf[written..written + count].copy_from_slice(&available[..count]);
            self.cursor += count;
            written += count;
        }
        self.samples_read += written as u64;
        written
    }

    #[inline]
    fn position(&self) -> u64 {
        self.format.frames_for_samples(self.samples_read)
    }

    #[inline]
    fn len(&self) -> Option<u64> {
        None
    }

    fn seek(&mut self, frame: u64) -> Result<(), SeekError> {
        if frame != 0 {
            return Err(SeekError::NotSupported { frame });
        }

        self.restart()?;
        self.pending.clear();
        self.cursor = 0;
        self.samples_read = 0;
        self.frames_decoded = 0;
        self.ended = false;
        Ok(())
    }

    fn has_data(&mut self) -> bool {
        self.cursor < self.pending.len() || (!self.ended && self.refill())
    }
}
