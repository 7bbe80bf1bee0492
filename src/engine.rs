use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use atomic_float::AtomicF32;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::EngineConfig;
use crate::device::{DeviceError, DeviceFactory, OutputDevice};
use crate::segment::{FileSegments, SegmentError, SegmentOpener, SegmentSource};
use crate::source::{self, ComposeError, Elapsed, ElapsedClock, FadeGate, FadeHandle, Source};
use crate::title::{FileNameTitle, TitleResolver, DEFAULT_TITLE};

/// Transport state of a [`PlaybackEngine`], published on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Nothing is bound. The initial state.
    Stopped,
    /// A session is bound and the device is pulling from it.
    Playing,
    /// A session is bound but the device is not pulling from it.
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
        })
    }
}

/// Errors returned by [`PlaybackEngine`] operations.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// No path was given, or a given path does not exist.
    #[error("{}", missing_message(.0.as_deref()))]
    FileMissing(Option<PathBuf>),
    /// A segment exists but could not be decoded.
    #[error("could not decode {}", .path.display())]
    Decoder {
        /// The segment that failed.
        path: PathBuf,
        /// Why it failed.
        #[source]
        source: SegmentError,
    },
    /// The intro and loop segments cannot be joined.
    #[error(transparent)]
    Compose(#[from] ComposeError),
    /// The output device failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// The operation is not allowed in the current state.
    #[error("not possible while {state}")]
    InvalidState {
        /// The state the engine was in.
        state: PlaybackState,
    },
    /// Transport controls are locked until the pending fade-out completes.
    #[error("a fade-out is in progress")]
    Fading,
    /// The engine thread is no longer running.
    #[error("the engine thread has exited")]
    EngineGone,
    /// The engine thread could not be started.
    #[error("could not spawn the engine thread")]
    Spawn(#[source] io::Error),
}

fn missing_message(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("audio file not found: {}", path.display()),
        None => "no audio file given".to_string(),
    }
}

type Reply = Sender<Result<(), PlaybackError>>;

enum Command {
    Play {
        intro: Option<PathBuf>,
        looped: Option<PathBuf>,
        reply: Reply,
    },
    Pause(Reply),
    Resume(Reply),
    Stop(Reply),
    StopFade(Duration, Reply),
    ApplyVolume(Reply),
    Shutdown,
}

/// State readable from any thread without a round trip to the engine thread.
#[derive(Debug)]
struct Shared {
    state: Mutex<PlaybackState>,
    volume: AtomicF32,
    fading: AtomicBool,
    clock: Mutex<Option<ElapsedClock>>,
    title: Mutex<String>,
    subscribers: Mutex<Vec<Sender<PlaybackState>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> PlaybackState {
        *lock(&self.state)
    }

    fn publish(&self, state: PlaybackState) {
        *lock(&self.state) = state;
        tracing::debug!(%state, "playback state changed");
        lock(&self.subscribers).retain(|subscriber| subscriber.send(state).is_ok());
    }
}

/// Plays an optional intro followed by an endless loop on an output device.
///
/// The engine owns a background thread that creates, drives and releases
/// output devices. Every method sends a command to that thread and waits
/// for it to be carried out, so the engine can be shared between threads.
/// At most one playback session exists at a time.
///
/// Dropping the engine stops playback and joins the thread.
pub struct PlaybackEngine {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state())
            .field("volume", &self.volume())
            .field("fading", &self.is_fading())
            .finish_non_exhaustive()
    }
}

impl PlaybackEngine {
    /// Starts building an engine playing on devices created by `factory`.
    pub fn builder(factory: impl DeviceFactory + 'static) -> EngineBuilder {
        EngineBuilder {
            factory: Box::new(factory),
            opener: Box::new(FileSegments),
            titles: Box::new(FileNameTitle),
            config: EngineConfig::default(),
            volume: 1.0,
        }
    }

    /// Starts a new session playing `intro` once, then `looped` forever.
    ///
    /// With a single path that file is looped on its own. Empty paths count
    /// as absent. A session that is already running is replaced without a
    /// [`PlaybackState::Stopped`] notification. On failure the engine is left
    /// stopped with no device bound.
    pub fn play(&self, intro: Option<&Path>, looped: Option<&Path>) -> Result<(), PlaybackError> {
        let given = |path: Option<&Path>| {
            path.filter(|path| !path.as_os_str().is_empty())
                .map(Path::to_path_buf)
        };
        let (intro, looped) = (given(intro), given(looped));
        self.request(|reply| Command::Play {
            intro,
            looped,
            reply,
        })
    }

    /// Pauses playback, keeping the decode position.
    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.request(Command::Pause)
    }

    /// Resumes a paused session where it left off, reapplying the volume first.
    ///
    /// If the device fails to restart the engine stays paused.
    pub fn resume(&self) -> Result<(), PlaybackError> {
        self.request(Command::Resume)
    }

    /// Releases the session and its device. Does nothing when already stopped.
    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.request(Command::Stop)
    }

    /// Fades the music out over `duration`, then stops.
    ///
    /// The duration is capped at [`EngineConfig::max_fade`]; zero stops
    /// immediately. Until the fade completes pause and resume fail with
    /// [`PlaybackError::Fading`] and further calls to `stop_fade` are ignored.
    /// [`stop`](Self::stop) and [`play`](Self::play) cancel the fade.
    pub fn stop_fade(&self, duration: Duration) -> Result<(), PlaybackError> {
        self.request(|reply| Command::StopFade(duration, reply))
    }

    /// Sets the volume, clamped to `[0.0, 1.0]`.
    ///
    /// The value is kept even if applying it fails, and every later session
    /// starts with it. Fails with [`DeviceError::NotBound`] when stopped.
    pub fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.shared.volume.store(volume, Ordering::Relaxed);
        self.request(Command::ApplyVolume)
    }

    /// The stored volume.
    pub fn volume(&self) -> f32 {
        self.shared.volume.load(Ordering::Relaxed)
    }

    /// The current transport state.
    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Returns `true` while a fade-out started by [`stop_fade`](Self::stop_fade) is pending.
    pub fn is_fading(&self) -> bool {
        self.shared.fading.load(Ordering::Relaxed)
    }

    /// Display title of the current session, [`DEFAULT_TITLE`] when stopped.
    pub fn title(&self) -> String {
        lock(&self.shared.title).clone()
    }

    /// Play time of the current session. Zero when stopped.
    pub fn elapsed(&self) -> Duration {
        lock(&self.shared.clock)
            .as_ref()
            .map_or(Duration::ZERO, ElapsedClock::elapsed)
    }

    /// Receives every state the engine publishes from now on.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<PlaybackState> {
        let (tx, rx) = crossbeam_channel::unbounded();
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), PlaybackError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(command(tx))
            .map_err(|_| PlaybackError::EngineGone)?;
        rx.recv().map_err(|_| PlaybackError::EngineGone)?
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("engine thread panicked");
            }
        }
    }
}

/// Configures and starts a [`PlaybackEngine`].
#[must_use]
pub struct EngineBuilder {
    factory: Box<dyn DeviceFactory>,
    opener: Box<dyn SegmentOpener>,
    titles: Box<dyn TitleResolver>,
    config: EngineConfig,
    volume: f32,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Opens segments with `opener` instead of reading files.
    pub fn with_opener(mut self, opener: impl SegmentOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    /// Titles sessions with `resolver` instead of [`FileNameTitle`].
    pub fn with_title_resolver(mut self, resolver: impl TitleResolver + 'static) -> Self {
        self.titles = Box::new(resolver);
        self
    }

    /// Replaces the default [`EngineConfig`].
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Volume the first session starts with, clamped to `[0.0, 1.0]`.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self
    }

    /// Spawns the engine thread.
    pub fn build(self) -> Result<PlaybackEngine, PlaybackError> {
        let Self {
            factory,
            opener,
            titles,
            config,
            volume,
        } = self;

        let shared = Arc::new(Shared {
            state: Mutex::new(PlaybackState::Stopped),
            volume: AtomicF32::new(volume),
            fading: AtomicBool::new(false),
            clock: Mutex::new(None),
            title: Mutex::new(DEFAULT_TITLE.to_string()),
            subscribers: Mutex::new(Vec::new()),
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name(config.thread_name().to_string())
            .spawn({
                let shared = shared.clone();
                // devices are not `Send`, so the worker is built on its own thread
                move || {
                    Worker {
                        factory,
                        opener,
                        titles,
                        config,
                        shared,
                        session: None,
                        fade_deadline: None,
                    }
                    .run(rx)
                }
            })
            .map_err(PlaybackError::Spawn)?;

        Ok(PlaybackEngine {
            commands: tx,
            thread: Some(thread),
            shared,
        })
    }
}

struct Session {
    device: Box<dyn OutputDevice>,
    fade: FadeHandle,
}

struct Worker {
    factory: Box<dyn DeviceFactory>,
    opener: Box<dyn SegmentOpener>,
    titles: Box<dyn TitleResolver>,
    config: EngineConfig,
    shared: Arc<Shared>,
    session: Option<Session>,
    fade_deadline: Option<Instant>,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>) {
        loop {
            let command = match self.fade_deadline {
                Some(deadline) => match commands.recv_deadline(deadline) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::debug!("fade-out finished");
                        self.stop();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match commands.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            let (result, reply) = match command {
                Command::Play {
                    intro,
                    looped,
                    reply,
                } => (self.play(intro.as_deref(), looped.as_deref()), reply),
                Command::Pause(reply) => (self.pause(), reply),
                Command::Resume(reply) => (self.resume(), reply),
                Command::Stop(reply) => {
                    self.stop();
                    (Ok(()), reply)
                }
                Command::StopFade(duration, reply) => (self.stop_fade(duration), reply),
                Command::ApplyVolume(reply) => (self.apply_volume(), reply),
                Command::Shutdown => break,
            };
            // the caller may have given up waiting
            let _ = reply.send(result);
        }

        self.stop();
    }

    fn play(&mut self, intro: Option<&Path>, looped: Option<&Path>) -> Result<(), PlaybackError> {
        self.release();

        let session = match self.start(intro, looped) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "could not start playback");
                self.stop();
                return Err(err);
            }
        };

        let title = self
            .titles
            .resolve(intro, looped)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        tracing::info!(
            %title,
            intro = ?intro.map(Path::display),
            looped = ?looped.map(Path::display),
            "playback started"
        );
        *lock(&self.shared.title) = title;
        self.session = Some(session);
        self.shared.publish(PlaybackState::Playing);
        Ok(())
    }

    fn start(
        &mut self,
        intro: Option<&Path>,
        looped: Option<&Path>,
    ) -> Result<Session, PlaybackError> {
        let (intro, looped) = match (intro, looped) {
            (intro, Some(looped)) => (intro, looped),
            (Some(only), None) => (None, only),
            (None, None) => return Err(PlaybackError::FileMissing(None)),
        };

        let looped = self.open(looped)?;
        let intro = intro.map(|path| self.open(path)).transpose()?;
        let gate = FadeGate::new(source::compose(intro, looped)?);
        let fade = gate.handle();
        let stream = Elapsed::new(gate);
        let clock = stream.clock();

        let mut device = self.factory.create()?;
        if let Err(err) = self.bind(device.as_mut(), Box::new(stream)) {
            device.stop();
            return Err(err.into());
        }

        *lock(&self.shared.clock) = Some(clock);
        Ok(Session { device, fade })
    }

    fn open(&self, path: &Path) -> Result<SegmentSource, PlaybackError> {
        self.opener.open(path).map_err(|err| match err {
            SegmentError::NotFound(path) => PlaybackError::FileMissing(Some(path)),
            source => PlaybackError::Decoder {
                path: path.to_path_buf(),
                source,
            },
        })
    }

    fn bind(&self, device: &mut dyn OutputDevice, stream: Box<dyn Source>) -> Result<(), DeviceError> {
        device.init(stream)?;
        device.set_volume(self.shared.volume.load(Ordering::Relaxed))?;
        device.play()
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        let session = self.session_in(PlaybackState::Playing)?;
        session.device.pause()?;
        self.shared.publish(PlaybackState::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        let volume = self.shared.volume.load(Ordering::Relaxed);
        let session = self.session_in(PlaybackState::Paused)?;
        session.device.set_volume(volume)?;
        if let Err(err) = session.device.play() {
            tracing::warn!(error = %err, "could not resume playback");
            return Err(err.into());
        }
        self.shared.publish(PlaybackState::Playing);
        Ok(())
    }

    fn stop_fade(&mut self, duration: Duration) -> Result<(), PlaybackError> {
        if self.fade_deadline.is_some() {
            tracing::debug!("fade-out already pending, ignoring");
            return Ok(());
        }

        let duration = self.config.clamp_fade(duration);
        let session = self.session_in(PlaybackState::Playing)?;
        if duration.is_zero() {
            self.stop();
            return Ok(());
        }

        session.fade.fade_out(duration);
        self.fade_deadline = Some(Instant::now() + duration);
        self.shared.fading.store(true, Ordering::Relaxed);
        tracing::debug!(?duration, "fade-out started");
        Ok(())
    }

    fn apply_volume(&mut self) -> Result<(), PlaybackError> {
        let volume = self.shared.volume.load(Ordering::Relaxed);
        let session = self.session.as_mut().ok_or(DeviceError::NotBound)?;
        session.device.set_volume(volume)?;
        Ok(())
    }

    fn stop(&mut self) {
        self.release();
        if self.shared.state() != PlaybackState::Stopped {
            *lock(&self.shared.title) = DEFAULT_TITLE.to_string();
            self.shared.publish(PlaybackState::Stopped);
        }
    }

    /// Stops and drops the device of the current session, if any.
    fn release(&mut self) {
        self.fade_deadline = None;
        self.shared.fading.store(false, Ordering::Relaxed);
        *lock(&self.shared.clock) = None;
        if let Some(mut session) = self.session.take() {
            session.device.stop();
        }
    }

    /// The session, provided the engine is in `expected` and not fading.
    fn session_in(&mut self, expected: PlaybackState) -> Result<&mut Session, PlaybackError> {
        if self.fade_deadline.is_some() {
            return Err(PlaybackError::Fading);
        }
        let state = self.shared.state();
        match self.session.as_mut() {
            Some(session) if state == expected => Ok(session),
            _ => Err(PlaybackError::InvalidState { state }),
        }
    }
}
