use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use atomic_float::AtomicF32;

use crate::common::{AudioFormat, Sample};
use crate::math;

use super::Source;

/// Longest fade a [`FadeHandle`] accepts; longer requests are shortened to this.
pub const MAX_FADE_DURATION: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
struct FadeRequest {
    from: Option<f32>,
    to: f32,
    duration: Duration,
}

#[derive(Debug)]
struct Controls {
    // Set when `request` holds a fade the audio thread has not picked up yet.
    pending: AtomicBool,
    request: Mutex<Option<FadeRequest>>,
    gain: AtomicF32,
    silent: AtomicBool,
}

/// Controls the gain ramp of a [`FadeGate`] from any thread.
///
/// Cloning is cheap and every clone controls the same gate. A request takes
/// effect on the next buffer the gate reads.
#[derive(Debug, Clone)]
pub struct FadeHandle {
    controls: Arc<Controls>,
}

impl FadeHandle {
    /// Ramps the gain from silence up to full level over `duration`.
    pub fn fade_in(&self, duration: Duration) {
        self.request(FadeRequest {
            from: Some(0.0),
            to: 1.0,
            duration,
        });
    }

    /// Ramps the gain from its current value down to silence over `duration`.
    ///
    /// Once the ramp completes the gate produces silence until another fade
    /// is requested.
    pub fn fade_out(&self, duration: Duration) {
        self.request(FadeRequest {
            from: None,
            to: 0.0,
            duration,
        });
    }

    /// Gain applied to the last frame the gate produced.
    #[inline]
    pub fn gain(&self) -> f32 {
        self.controls.gain.load(Ordering::Relaxed)
    }

    /// Returns `true` once a fade-out has fully completed.
    #[inline]
    pub fn is_silent(&self) -> bool {
        self.controls.silent.load(Ordering::Acquire)
    }

    fn request(&self, mut request: FadeRequest) {
        request.duration = request.duration.min(MAX_FADE_DURATION);
        *self
            .controls
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request);
        self.controls.pending.store(true, Ordering::Release);
    }
}

/// Filter that applies a linear, per-frame gain ramp to a source.
///
/// The gain starts at 1.0. Ramps are started through the [`FadeHandle`]
/// returned by [`FadeGate::handle`].
#[derive(Debug)]
pub struct FadeGate<S> {
    input: S,
    controls: Arc<Controls>,
    start_gain: f32,
    target_gain: f32,
    ramp_frames: u64,
    ramp_position: u64,
    // Samples of the current frame already handed out, reads may end mid-frame.
    frame_offset: usize,
}

impl<S> FadeGate<S>
where
    S: Source,
{
    /// Wraps `input` at full gain.
    pub fn new(input: S) -> Self {
        Self {
            input,
            controls: Arc::new(Controls {
                pending: AtomicBool::new(false),
                request: Mutex::new(None),
                gain: AtomicF32::new(1.0),
                silent: AtomicBool::new(false),
            }),
            start_gain: 1.0,
            target_gain: 1.0,
            ramp_frames: 0,
            ramp_position: 0,
            frame_offset: 0,
        }
    }

    /// A handle controlling this gate.
    pub fn handle(&self) -> FadeHandle {
        FadeHandle {
            controls: self.controls.clone(),
        }
    }

    /// Returns a reference to the inner source.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.input
    }

    /// Returns a mutable reference to the inner source.
    #[inline]
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.input
    }

    /// Returns the inner source.
    #[inline]
    pub fn into_inner(self) -> S {
        self.input
    }

    fn current_gain(&self) -> f32 {
        math::lerp(
            self.start_gain,
            self.target_gain,
            self.ramp_position,
            self.ramp_frames,
        )
    }

    fn channels(&self) -> usize {
        usize::from(self.input.format().channels.get())
    }

    fn is_ramping(&self) -> bool {
        self.ramp_position < self.ramp_frames
    }

    fn poll_request(&mut self) {
        if !self.controls.pending.swap(false, Ordering::Acquire) {
            return;
        }
        let Some(request) = self
            .controls
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        self.start_gain = request.from.unwrap_or_else(|| self.current_gain());
        self.target_gain = request.to;
        self.ramp_frames = self.input.format().frames_for_duration(request.duration);
        self.ramp_position = 0;
        self.controls.silent.store(false, Ordering::Release);
    }
}

impl<S> Source for FadeGate<S>
where
    S: Source,
{
    #[inline]
    fn format(&self) -> AudioFormat {
        self.input.format()
    }

    fn read(&mut self, buf: &mut [Sample]) -> usize {
        self.poll_request();

        if !self.is_ramping() && self.target_gain == 0.0 {
            buf.fill(0.0);
            self.frame_offset = (self.frame_offset + buf.len()) % self.channels();
            self.controls.gain.store(0.0, Ordering::Relaxed);
            self.controls.silent.store(true, Ordering::Release);
            return buf.len();
        }

        let count = self.input.read(buf);
        let channels = self.channels();

        if self.is_ramping() {
            for sample in &mut buf[..count] {
                *sample *= self.current_gain();
                self.frame_offset += 1;
                if self.frame_offset == channels {
                    self.frame_offset = 0;
                    if self.is_ramping() {
                        self.ramp_position += 1;
                    }
                }
            }
        } else {
            if self.target_gain != 1.0 {
                let gain = self.target_gain;
                buf[..count].iter_mut().for_each(|sample| *sample *= gain);
            }
            self.frame_offset = (self.frame_offset + count) % channels;
        }

        self.controls.gain.store(self.current_gain(), Ordering::Relaxed);
        count
    }
}
