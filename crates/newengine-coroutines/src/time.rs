use crate::frame::Frame;

/// Default clamp for a single scaled delta, in seconds.
pub const DEFAULT_MAX_DT_SEC: f32 = 0.25;

/// Host-side frame clock.
///
/// Produces one [`Frame`] per call to [`FrameClock::advance`]. The clock does not
/// read wall time itself; the host loop measures the raw delta and feeds it in,
/// which keeps the clock deterministic under test.
#[derive(Debug, Clone)]
pub struct FrameClock {
    current: Frame,
    time_scale: f32,
    max_dt: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            current: Frame::default(),
            time_scale: 1.0,
            max_dt: DEFAULT_MAX_DT_SEC,
        }
    }

    #[inline]
    pub fn with_max_dt(mut self, max_dt_sec: f32) -> Self {
        self.max_dt = if max_dt_sec.is_finite() && max_dt_sec > 0.0 {
            max_dt_sec
        } else {
            DEFAULT_MAX_DT_SEC
        };
        self
    }

    /// Sets the scale applied to `dt`/`time`. Negative or non-finite values clamp to 0.
    #[inline]
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    #[inline]
    pub fn current(&self) -> Frame {
        self.current
    }

    #[inline]
    pub fn current_tick(&self) -> u64 {
        self.current.tick
    }

    /// Unscaled delta of the most recent tick.
    #[inline]
    pub fn delta_time(&self) -> f32 {
        self.current.unscaled_dt
    }

    /// Advances one tick with the given raw delta and returns the new frame.
    pub fn advance(&mut self, raw_dt: f32) -> Frame {
        let raw = if raw_dt.is_finite() && raw_dt > 0.0 { raw_dt } else { 0.0 };
        let dt = raw.min(self.max_dt) * self.time_scale;

        let prev = self.current;
        self.current = Frame {
            tick: prev.tick.wrapping_add(1),
            dt,
            unscaled_dt: raw,
            time: prev.time + f64::from(dt),
            unscaled_time: prev.unscaled_time + f64::from(raw),
        };
        self.current
    }
}

impl Default for FrameClock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
