//! Gapless intro + loop background music playback.
//!
//! Game and visual novel soundtracks are often shipped as two files: an
//! intro that plays once, and a loop that repeats forever right after it.
//! This library joins the two at the exact sample boundary and keeps the
//! loop going without a gap.
//!
//! # Playing music
//!
//! A [`PlaybackEngine`] plays on output devices created by a
//! [`DeviceFactory`]. With the default `playback` feature
//! [`SpeakersFactory`](speakers::SpeakersFactory) plays on the system's
//! audio output:
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use bgmloop::speakers::SpeakersFactory;
//! use bgmloop::PlaybackEngine;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PlaybackEngine::builder(SpeakersFactory::new())
//!     .with_volume(0.8)
//!     .build()?;
//!
//! engine.play(
//!     Some(Path::new("music/town_intro.ogg")),
//!     Some(Path::new("music/town_loop.ogg")),
//! )?;
//! println!("now playing: {}", engine.title());
//!
//! std::thread::sleep(Duration::from_secs(30));
//! engine.stop_fade(Duration::from_secs(3))?;
//! # Ok(())
//! # }
//! ```
//!
//! Every state change is published to subscribers:
//!
//! ```no_run
//! # use bgmloop::{PlaybackEngine, speakers::SpeakersFactory};
//! # let engine = PlaybackEngine::builder(SpeakersFactory::new()).build().unwrap();
//! let states = engine.subscribe();
//! std::thread::spawn(move || {
//!     for state in states {
//!         println!("playback is now {state}");
//!     }
//! });
//! ```
//!
//! # Streams
//!
//! The engine is built from pieces that can be used on their own. Segments
//! ([`SegmentSource`]) decode single files; the [`source`] module joins and
//! repeats them:
//!
//! ```
//! use bgmloop::buffer::SamplesBuffer;
//! use bgmloop::segment::SegmentSource;
//! use bgmloop::source::{compose, Source};
//! use bgmloop::nz;
//!
//! let intro = SamplesBuffer::new(nz!(1), nz!(8000), vec![0.1, 0.2]);
//! let looped = SamplesBuffer::new(nz!(1), nz!(8000), vec![0.7, 0.8, 0.9]);
//!
//! let mut stream = compose(
//!     Some(SegmentSource::from_segment("intro", intro)),
//!     SegmentSource::from_segment("loop", looped),
//! )?;
//!
//! let mut buf = [0.0; 7];
//! assert_eq!(stream.read(&mut buf), 7);
//! assert_eq!(buf, [0.1, 0.2, 0.7, 0.8, 0.9, 0.7, 0.8]);
//! # Ok::<(), bgmloop::source::ComposeError>(())
//! ```
//!
//! # Features
//!
//! - `playback` (default): [`speakers`] output through `cpal`.
//! - `wav` (default): `.wav` segments through `hound`.
//! - `vorbis` (default): `.ogg` segments through `lewton`.
//!
//! The library logs through `tracing` and never installs a subscriber.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod common;
mod config;
mod engine;
mod math;

pub mod buffer;
pub mod device;
pub mod pairing;
pub mod segment;
pub mod source;
#[cfg(feature = "playback")]
#[cfg_attr(docsrs, doc(cfg(feature = "playback")))]
pub mod speakers;
pub mod title;

pub use crate::common::{AudioFormat, ChannelCount, Sample, SampleEncoding, SampleRate};
pub use crate::config::EngineConfig;
pub use crate::device::{DeviceError, DeviceFactory, DeviceState, OutputDevice};
pub use crate::engine::{EngineBuilder, PlaybackEngine, PlaybackError, PlaybackState};
pub use crate::segment::{FileSegments, SegmentError, SegmentOpener, SegmentSource};
pub use crate::source::{ComposeError, Source};
pub use crate::title::{TitleResolver, DEFAULT_TITLE};
