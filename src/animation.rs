use std::time::{Duration, Instant};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Idle, or rising since `started`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationState {
    Inactive,
    Active { started: Instant },
}

/// Timed linear lift of the rendered object, started by a gesture.
///
/// The only way into `Active` is [`trigger_at`](Self::trigger_at); the only
/// way out is a [`current_offset`](Self::current_offset) query made after the
/// duration has elapsed.
#[derive(Debug, Clone)]
pub struct AnimationTrigger {
    state: AnimationState,
    duration: Duration,
    peak_height: f32,
    axis: Vec3,
}

impl AnimationTrigger {
    pub fn new(duration: Duration, peak_height: f32, axis: Vec3) -> Self {
        Self {
            state: AnimationState::Inactive,
            duration,
            peak_height,
            axis: axis.normalize_or_zero(),
        }
    }

    pub fn from_config(config: &AnimationConfig) -> Self {
        Self::new(
            Duration::from_secs_f32(config.duration_secs.max(0.0)),
            config.peak_height,
            Vec3::from_array(config.axis),
        )
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn peak_height(&self) -> f32 {
        self.peak_height
    }

    pub fn trigger(&mut self) {
        self.trigger_at(Instant::now());
    }

    /// Starts the animation unless one is still running. Re-triggering inside
    /// the window keeps the original start time.
    pub fn trigger_at(&mut self, now: Instant) {
        if self.is_running_at(now) {
            return;
        }
        self.state = AnimationState::Active { started: now };
    }

    /// True while an animation started and its duration has not yet passed
    pub fn is_running_at(&self, now: Instant) -> bool {
        match self.state {
            AnimationState::Inactive => false,
            AnimationState::Active { started } => now.saturating_duration_since(started) <= self.duration,
        }
    }

    /// Offset from zero up to `peak_height` along the axis over the duration,
    /// zero before a trigger and after completion.
    pub fn current_offset(&mut self, now: Instant) -> Vec3 {
        let AnimationState::Active { started } = self.state else {
            return Vec3::ZERO;
        };

        let elapsed = now.saturating_duration_since(started);
        if elapsed > self.duration {
            self.state = AnimationState::Inactive;
            return Vec3::ZERO;
        }

        let progress = if self.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f32() / self.duration.as_secs_f32()
        };
        self.axis * (self.peak_height * progress.min(1.0))
    }
}

/// Animation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub enabled: bool,
    pub duration_secs: f32,
    /// Meters at the end of the rise
    pub peak_height: f32,
    /// Direction of the rise in the marker frame
    pub axis: [f32; 3],
    /// Gestures only count while a marker is visible
    pub require_marker: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_secs: 1.0,
            peak_height: 0.05,
            axis: [0.0, 1.0, 0.0],
            require_marker: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> AnimationTrigger {
        AnimationTrigger::new(Duration::from_secs(1), 0.05, Vec3::Y)
    }

    #[test]
    fn idle_offset_is_zero() {
        let mut anim = trigger();
        assert_eq!(anim.current_offset(Instant::now()), Vec3::ZERO);
        assert_eq!(anim.state(), AnimationState::Inactive);
    }

    #[test]
    fn offset_is_linear_in_elapsed_time() {
        let mut anim = trigger();
        let t0 = Instant::now();
        anim.trigger_at(t0);

        let half = anim.current_offset(t0 + Duration::from_millis(500));
        assert!((half.y - 0.025).abs() < 1e-6);
        assert_eq!(half.x, 0.0);
        assert_eq!(half.z, 0.0);
    }

    #[test]
    fn completion_returns_to_inactive() {
        let mut anim = trigger();
        let t0 = Instant::now();
        anim.trigger_at(t0);

        assert_eq!(anim.current_offset(t0 + Duration::from_millis(1001)), Vec3::ZERO);
        assert_eq!(anim.state(), AnimationState::Inactive);
    }

    #[test]
    fn stale_trigger_restarts_after_window() {
        let mut anim = trigger();
        let t0 = Instant::now();
        anim.trigger_at(t0);

        // Never polled, but the first animation is over
        let t1 = t0 + Duration::from_secs(3);
        anim.trigger_at(t1);
        assert_eq!(anim.state(), AnimationState::Active { started: t1 });
    }

    #[test]
    fn axis_is_normalised() {
        let mut anim = AnimationTrigger::new(Duration::from_secs(2), 1.0, Vec3::new(0.0, 0.0, 4.0));
        let t0 = Instant::now();
        anim.trigger_at(t0);
        let offset = anim.current_offset(t0 + Duration::from_secs(1));
        assert!(offset.abs_diff_eq(Vec3::new(0.0, 0.0, 0.5), 1e-6));
    }

    #[test]
    fn from_config_uses_defaults() {
        let anim = AnimationTrigger::from_config(&AnimationConfig::default());
        assert_eq!(anim.duration(), Duration::from_secs(1));
        assert_eq!(anim.peak_height(), 0.05);
    }
}
