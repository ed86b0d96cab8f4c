#![forbid(unsafe_code)]

//! Exponentially-smoothed scroll velocity with idle decay.
//!
//! Raw scroll events arrive at whatever rate the host delivers them; the
//! tracker blends instantaneous velocities into a smoothed estimate and
//! decays it toward zero once events stop, so a look-ahead buffer sized by
//! velocity does not linger after the user lets go.

use web_time::{Duration, Instant};

/// Tuning knobs for velocity smoothing.
#[derive(Debug, Clone)]
pub struct VelocityConfig {
    /// Weight of the newest instantaneous sample in the blend.
    /// `vel = (1 - blend) * old + blend * new`. Typical: 0.2.
    pub blend: f64,

    /// Position jumps larger than this (px) are logged as anomalies but
    /// still blended. Programmatic `scrollTo` calls land here.
    pub jump_threshold_px: f64,

    /// Idle time below which the smoothed velocity is returned unchanged.
    pub decay_start: Duration,

    /// Idle time at which the reported velocity reaches zero. Between
    /// `decay_start` and this, the value decays linearly.
    pub decay_full: Duration,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            blend: 0.2,
            jump_threshold_px: 1000.0,
            decay_start: Duration::from_millis(50),
            decay_full: Duration::from_millis(200),
        }
    }
}

/// Smoothed, signed scroll velocity in pixels per millisecond.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    config: VelocityConfig,
    last_pos: f64,
    last_time: Option<Instant>,
    last_vel: f64,
}

impl VelocityTracker {
    /// Create a tracker with the given tuning.
    #[must_use]
    pub fn new(config: VelocityConfig) -> Self {
        Self {
            config,
            last_pos: 0.0,
            last_time: None,
            last_vel: 0.0,
        }
    }

    /// Create a tracker with default tuning.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(VelocityConfig::default())
    }

    /// Feed one scroll position sample. The first call only initializes.
    pub fn on_scroll(&mut self, pos: f64, now: Instant) {
        let Some(prev) = self.last_time else {
            self.last_pos = pos;
            self.last_time = Some(now);
            return;
        };

        let delta = pos - self.last_pos;
        if delta.abs() > self.config.jump_threshold_px {
            // Not special-cased beyond the log; the blend absorbs it.
            #[cfg(feature = "tracing")]
            tracing::warn!(delta_px = delta, "scroll position jump");
        }

        let dt_ms = (now.saturating_duration_since(prev).as_secs_f64() * 1000.0).max(1.0);
        let instantaneous = delta / dt_ms;
        self.last_vel =
            (1.0 - self.config.blend) * self.last_vel + self.config.blend * instantaneous;
        self.last_pos = pos;
        self.last_time = Some(now);
    }

    /// Smoothed velocity at `now`, decayed by idle time.
    #[must_use]
    pub fn velocity(&self, now: Instant) -> f64 {
        let Some(prev) = self.last_time else {
            return 0.0;
        };
        let idle = now.saturating_duration_since(prev);
        if idle < self.config.decay_start {
            return self.last_vel;
        }
        if idle >= self.config.decay_full {
            return 0.0;
        }
        let window = (self.config.decay_full - self.config.decay_start).as_secs_f64();
        let into = (idle - self.config.decay_start).as_secs_f64();
        self.last_vel * (1.0 - into / window)
    }

    /// Last blended velocity, without idle decay.
    #[must_use]
    pub fn last_velocity(&self) -> f64 {
        self.last_vel
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.last_pos = 0.0;
        self.last_time = None;
        self.last_vel = 0.0;
    }
}
