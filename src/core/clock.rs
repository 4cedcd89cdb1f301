use std::time::Instant;

/// Render-loop clock: per-frame delta plus a once-per-interval FPS average
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    report_interval: f32,
    frames_since_report: u32,
    time_since_report: f32,
    fps: f32,
}

impl FrameClock {
    /// Create new clock starting now, averaging FPS over `report_interval` seconds
    pub fn new(report_interval: f32) -> Self {
        Self {
            last_tick: Instant::now(),
            report_interval,
            frames_since_report: 0,
            time_since_report: 0.0,
            fps: 0.0,
        }
    }

    /// Advance to `now`. Returns the delta in seconds and, when an averaging
    /// window just closed, the fresh FPS value.
    pub fn tick_at(&mut self, now: Instant) -> (f32, Option<f32>) {
        let delta = now.saturating_duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        self.frames_since_report += 1;
        self.time_since_report += delta;

        if self.time_since_report >= self.report_interval && self.time_since_report > 0.0 {
            self.fps = self.frames_since_report as f32 / self.time_since_report;
            self.frames_since_report = 0;
            self.time_since_report = 0.0;
            (delta, Some(self.fps))
        } else {
            (delta, None)
        }
    }

    pub fn tick(&mut self) -> (f32, Option<f32>) {
        self.tick_at(Instant::now())
    }

    /// Most recent FPS average
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clock_measures_delta() {
        let start = Instant::now();
        let mut clock = FrameClock::new(1.0);
        clock.last_tick = start;

        let (delta, fps) = clock.tick_at(start + Duration::from_millis(10));
        assert!((delta - 0.010).abs() < 1e-4);
        assert!(fps.is_none());
    }

    #[test]
    fn clock_reports_fps_once_per_interval() {
        let start = Instant::now();
        let mut clock = FrameClock::new(0.99);
        clock.last_tick = start;

        let mut reports = Vec::new();
        for i in 1..=40 {
            if let (_, Some(fps)) = clock.tick_at(start + Duration::from_millis(50 * i)) {
                reports.push(fps);
            }
        }

        // 20 frames per second, two full windows
        assert_eq!(reports.len(), 2);
        assert!((reports[0] - 20.0).abs() < 0.01);
        assert!((clock.fps() - 20.0).abs() < 0.01);
    }
}
