use std::time::Duration;

use crate::source::MAX_FADE_DURATION;

/// Settings for a [`PlaybackEngine`](crate::PlaybackEngine).
///
/// ```
/// use std::time::Duration;
/// use bgmloop::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_max_fade(Duration::from_secs(3))
///     .with_thread_name("bgm");
/// assert_eq!(config.max_fade(), Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest fade-out `stop_fade` performs. Never above [`MAX_FADE_DURATION`].
    pub(crate) max_fade: Duration,

    /// Name of the thread that owns the output device.
    pub(crate) thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_fade: MAX_FADE_DURATION,
            thread_name: "bgmloop engine".to_string(),
        }
    }
}

impl EngineConfig {
    /// Caps fade-out durations at `max_fade`. Values above [`MAX_FADE_DURATION`]
    /// are lowered to it.
    #[must_use]
    pub fn with_max_fade(mut self, max_fade: Duration) -> Self {
        self.max_fade = max_fade.min(MAX_FADE_DURATION);
        self
    }

    /// Names the engine thread.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Longest fade-out `stop_fade` performs.
    pub fn max_fade(&self) -> Duration {
        self.max_fade
    }

    /// Name of the engine thread.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub(crate) fn clamp_fade(&self, duration: Duration) -> Duration {
        duration.min(self.max_fade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_fade(Duration::from_secs(60)), Duration::from_secs(10));
        assert_eq!(config.clamp_fade(Duration::from_millis(250)), Duration::from_millis(250));

        let config = config.with_max_fade(Duration::from_secs(120));
        assert_eq!(config.max_fade(), MAX_FADE_DURATION);
    }
}
