use serde::Serialize;

/// Frame timing snapshot.
///
/// One snapshot is produced per host tick by [`crate::time::FrameClock`] and handed
/// to every module and to the scheduler for that tick.
///
/// - `dt` / `time` are **scaled**: the raw delta is clamped to the clock's
///   `max_dt` and multiplied by the time scale.
/// - `unscaled_dt` / `unscaled_time` are the raw wall-clock values and are
///   never affected by time scaling. Lag detection and loop timing use these.
///
/// `Frame::default()` describes the state before the first tick (tick 0, zero time).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Frame {
    /// Monotonic tick index. The first advanced frame is tick 1.
    pub tick: u64,

    /// Scaled, clamped delta time in seconds.
    pub dt: f32,

    /// Raw delta time in seconds.
    pub unscaled_dt: f32,

    /// Scaled time accumulated since the clock was created.
    pub time: f64,

    /// Raw time accumulated since the clock was created.
    pub unscaled_time: f64,
}
