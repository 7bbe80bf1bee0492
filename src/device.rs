//! The output device collaborator.
//!
//! The [`PlaybackEngine`](crate::PlaybackEngine) never talks to an audio
//! backend directly. It asks a [`DeviceFactory`] for a fresh
//! [`OutputDevice`] at the start of every session, binds the composed
//! stream to it and drives it through `play`, `pause` and `stop`.
//!
//! With the `playback` feature [`SpeakersFactory`](crate::speakers::SpeakersFactory)
//! provides devices backed by the system's default (or a named) audio output.

use crate::source::Source;
use crate::common::AudioFormat;

/// What an output device is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// No stream is bound, or the bound stream has been stopped.
    Stopped,
    /// The device is pulling samples from the bound stream.
    Playing,
    /// A stream is bound but the device is not pulling from it.
    Paused,
}

/// Error reported by an [`OutputDevice`] or a [`DeviceFactory`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// There is no output device to play on.
    #[error("no audio output device is available")]
    NoDevice,
    /// The named output device does not exist.
    #[error("audio output device {0:?} was not found")]
    NotFound(String),
    /// The operation needs a bound stream and there is none.
    #[error("no stream is bound to the output device")]
    NotBound,
    /// The device cannot play the stream's format.
    #[error("the output device does not support {0}")]
    UnsupportedFormat(AudioFormat),
    /// The backend could not create the output stream.
    #[error("could not build the output stream: {0}")]
    BuildStream(String),
    /// The backend failed to start playback.
    #[error("could not start playback: {0}")]
    Play(String),
    /// The backend failed to pause playback.
    #[error("could not pause playback: {0}")]
    Pause(String),
    /// Any other backend failure.
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// An audio output that pulls samples from a bound [`Source`].
///
/// Devices are created, used and dropped on the engine thread, so they do
/// not need to be `Send`.
pub trait OutputDevice {
    /// Binds `source`. The device starts paused.
    fn init(&mut self, source: Box<dyn Source>) -> Result<(), DeviceError>;

    /// Starts or resumes pulling from the bound source.
    fn play(&mut self) -> Result<(), DeviceError>;

    /// Stops pulling without releasing the bound source.
    fn pause(&mut self) -> Result<(), DeviceError>;

    /// Releases the bound source. Once this returns no further read happens.
    fn stop(&mut self);

    /// Sets the output gain, in `[0.0, 1.0]`.
    fn set_volume(&mut self, volume: f32) -> Result<(), DeviceError>;

    /// Current output gain.
    fn volume(&self) -> f32;

    /// What the device is currently doing.
    fn state(&self) -> DeviceState;
}

impl<D> OutputDevice for Box<D>
where
    D: OutputDevice + ?Sized,
{
    fn init(&mut self, source: Box<dyn Source>) -> Result<(), DeviceError> {
        (**self).init(source)
    }

    fn play(&mut self) -> Result<(), DeviceError> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        (**self).pause()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), DeviceError> {
        (**self).set_volume(volume)
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn state(&self) -> DeviceState {
        (**self).state()
    }
}

/// Creates a fresh [`OutputDevice`] for every playback session.
///
/// The factory is moved to the engine thread; the devices it creates stay there.
pub trait DeviceFactory: Send {
    /// Acquires an output device.
    fn create(&mut self) -> Result<Box<dyn OutputDevice>, DeviceError>;
}

impl<F> DeviceFactory for F
where
    F: FnMut() -> Result<Box<dyn OutputDevice>, DeviceError> + Send,
{
    fn create(&mut self) -> Result<Box<dyn OutputDevice>, DeviceError> {
        self()
    }
}
