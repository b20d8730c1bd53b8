//! Lag-end detection.
//!
//! The probe samples unscaled frame deltas into a 3-sample window and reports
//! stabilization once the population variance of that window drops below a
//! threshold, or gives up after a fixed number of ticks.

use crate::frame::Frame;

use serde::{Deserialize, Serialize};

/// Capacity of the delta window.
pub const LAG_WINDOW: usize = 3;

/// Variance below which the tick rate is considered stable (seconds²).
pub const LAG_THRESHOLD: f32 = 0.001;

/// Tick budget after which the probe stops waiting.
pub const LAG_MAX_TICKS: u32 = 20;

/// Population variance (divisor = sample count, not count - 1).
///
/// Returns `None` for an empty slice.
pub fn variance(samples: &[f32]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f32;
    let mean = samples.iter().sum::<f32>() / n;
    let sum_sq: f32 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
    Some(sum_sq / n)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagConfig {
    pub threshold: f32,
    pub max_ticks: u32,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self {
            threshold: LAG_THRESHOLD,
            max_ticks: LAG_MAX_TICKS,
        }
    }
}

/// Most-recent-last window of delta samples, oldest evicted first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeltaWindow {
    samples: Vec<f32>,
}

impl DeltaWindow {
    #[inline]
    pub fn new() -> Self {
        Self {
            samples: Vec::with_capacity(LAG_WINDOW + 1),
        }
    }

    pub fn push(&mut self, dt: f32) {
        self.samples.push(dt);
        if self.samples.len() > LAG_WINDOW {
            self.samples.remove(0);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn variance(&self) -> Option<f32> {
        variance(&self.samples)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LagOutcome {
    /// Variance dropped below the threshold; reported one tick after detection.
    Settled { tick: u64, variance: f32 },
    /// The tick budget ran out first.
    TimedOut { tick: u64 },
}

impl LagOutcome {
    #[inline]
    pub fn tick(&self) -> u64 {
        match *self {
            LagOutcome::Settled { tick, .. } | LagOutcome::TimedOut { tick } => tick,
        }
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        matches!(self, LagOutcome::Settled { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
enum LagPhase {
    Start,
    Primed,
    Sampling,
    Settling { variance: f32 },
}

/// Lag-end detector state machine, stepped once per resume.
#[derive(Debug, Clone, Serialize)]
pub struct LagProbe {
    config: LagConfig,
    phase: LagPhase,
    deadline: u64,
    window: DeltaWindow,
}

impl LagProbe {
    pub fn new(config: LagConfig) -> Self {
        Self {
            config,
            phase: LagPhase::Start,
            deadline: 0,
            window: DeltaWindow::new(),
        }
    }

    #[inline]
    pub fn window(&self) -> &DeltaWindow {
        &self.window
    }

    /// Tick at which the probe gives up, fixed by the first step.
    #[inline]
    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    /// Advances the probe with the given frame.
    ///
    /// `None` means "suspend one tick and call again".
    pub fn step(&mut self, frame: &Frame) -> Option<LagOutcome> {
        match self.phase {
            LagPhase::Start => {
                self.deadline = frame.tick.saturating_add(u64::from(self.config.max_ticks));
                self.window.push(frame.unscaled_dt);
                self.phase = LagPhase::Primed;
                None
            }
            LagPhase::Primed => {
                self.window.push(frame.unscaled_dt);
                self.continue_or_time_out(frame)
            }
            LagPhase::Sampling => {
                self.window.push(frame.unscaled_dt);
                match self.window.variance() {
                    Some(variance) if variance < self.config.threshold => {
                        self.phase = LagPhase::Settling { variance };
                        None
                    }
                    _ => self.continue_or_time_out(frame),
                }
            }
            LagPhase::Settling { variance } => {
                self.window.clear();
                Some(LagOutcome::Settled {
                    tick: frame.tick,
                    variance,
                })
            }
        }
    }

    fn continue_or_time_out(&mut self, frame: &Frame) -> Option<LagOutcome> {
        if frame.tick < self.deadline {
            self.phase = LagPhase::Sampling;
            None
        } else {
            self.window.clear();
            Some(LagOutcome::TimedOut { tick: frame.tick })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tick: u64, dt: f32) -> Frame {
        Frame {
            tick,
            dt,
            unscaled_dt: dt,
            ..Frame::default()
        }
    }

    #[test]
    fn variance_of_constant_window_is_zero() {
        let v = variance(&[0.016, 0.016, 0.016]).unwrap();
        assert!(v.abs() < 1e-12, "v={v}");
    }

    #[test]
    fn variance_uses_population_divisor() {
        let v = variance(&[0.01, 0.02, 0.03]).unwrap();
        assert!((v - 0.0000667).abs() < 1e-7, "v={v}");
    }

    #[test]
    fn variance_of_empty_window_is_none() {
        assert_eq!(variance(&[]), None);
        assert_eq!(DeltaWindow::new().variance(), None);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut w = DeltaWindow::new();
        for dt in [0.1, 0.2, 0.3, 0.4] {
            w.push(dt);
        }
        assert_eq!(w.as_slice(), &[0.2, 0.3, 0.4]);
    }

    #[test]
    fn zero_budget_completes_on_first_loop_check() {
        let mut probe = LagProbe::new(LagConfig {
            max_ticks: 0,
            ..LagConfig::default()
        });
        assert_eq!(probe.step(&frame(3, 0.016)), None);
        assert_eq!(probe.step(&frame(4, 0.016)), Some(LagOutcome::TimedOut { tick: 4 }));
    }

    #[test]
    fn steady_stream_settles_one_tick_after_detection() {
        let mut probe = LagProbe::new(LagConfig::default());
        let mut outcome = None;
        for tick in 0..10 {
            if let Some(o) = probe.step(&frame(tick, 0.016)) {
                outcome = Some(o);
                break;
            }
        }
        // samples at ticks 0, 1, 2 -> detection at 2 -> reported at 3
        let outcome = outcome.unwrap();
        assert!(outcome.is_settled());
        assert_eq!(outcome.tick(), 3);
    }
}
