//! Built-in routines: delay, loops, conditional wait and lag-end wait.
//!
//! Each routine is plain data: the callbacks plus the progress fields needed to
//! pick up where the previous resume left off. An absent callback is a valid
//! no-op, never an error.

use crate::frame::Frame;
use crate::sched::lag::{LagConfig, LagOutcome, LagProbe};
use crate::sched::task::{Routine, Step, Wait};

use log::debug;

/// One-shot callback.
pub type Operation = Box<dyn FnOnce()>;

/// Repeated callback (loop body).
pub type Body = Box<dyn FnMut()>;

/// Condition polled once per resume.
pub type Predicate = Box<dyn FnMut() -> bool>;

/// Loop condition; receives unscaled seconds elapsed since the loop started.
pub type ElapsedPredicate = Box<dyn FnMut(f32) -> bool>;

#[inline]
fn run(op: &mut Option<Operation>) {
    if let Some(op) = op.take() {
        op();
    }
}

/// Suspends once, then runs the operation.
pub struct Delay {
    wait: Option<Wait>,
    operation: Option<Operation>,
}

impl Delay {
    pub fn new(wait: Wait, operation: Option<Operation>) -> Self {
        Self {
            wait: Some(wait),
            operation,
        }
    }
}

impl Routine for Delay {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn resume(&mut self, _frame: &Frame) -> Step {
        if let Some(wait) = self.wait.take() {
            return Step::Yield(wait);
        }
        run(&mut self.operation);
        Step::Done
    }
}

/// Runs `body` every tick while less than `duration` unscaled seconds have
/// elapsed, then runs `on_complete`.
pub struct LoopFor {
    duration: f64,
    body: Option<Body>,
    on_complete: Option<Operation>,
    started_at: Option<f64>,
    iterations: u32,
}

impl LoopFor {
    pub fn new(body: Option<Body>, duration: f32, on_complete: Option<Operation>) -> Self {
        Self {
            duration: f64::from(duration),
            body,
            on_complete,
            started_at: None,
            iterations: 0,
        }
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Routine for LoopFor {
    fn name(&self) -> &'static str {
        "loop-for"
    }

    fn resume(&mut self, frame: &Frame) -> Step {
        let start = *self.started_at.get_or_insert(frame.unscaled_time);

        if frame.unscaled_time - start < self.duration {
            if let Some(body) = self.body.as_mut() {
                body();
            }
            self.iterations = self.iterations.saturating_add(1);
            return Step::Yield(Wait::NextTick);
        }

        run(&mut self.on_complete);
        Step::Done
    }
}

/// Runs `body` and then suspends for `interval` for as long as the predicate
/// holds. An absent predicate never holds.
pub struct LoopWhile {
    predicate: Option<ElapsedPredicate>,
    interval: Wait,
    body: Option<Body>,
    started_at: Option<f64>,
    iterations: u32,
}

impl LoopWhile {
    pub fn new(predicate: Option<ElapsedPredicate>, interval: Wait, body: Option<Body>) -> Self {
        Self {
            predicate,
            interval,
            body,
            started_at: None,
            iterations: 0,
        }
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Routine for LoopWhile {
    fn name(&self) -> &'static str {
        "loop-while"
    }

    fn resume(&mut self, frame: &Frame) -> Step {
        let start = *self.started_at.get_or_insert(frame.unscaled_time);
        let elapsed = (frame.unscaled_time - start) as f32;

        let keep_going = match self.predicate.as_mut() {
            Some(p) => p(elapsed),
            None => false,
        };
        if !keep_going {
            return Step::Done;
        }

        if let Some(body) = self.body.as_mut() {
            body();
        }
        self.iterations = self.iterations.saturating_add(1);
        Step::Yield(self.interval.clone())
    }
}

/// Polls the predicate once per tick; runs the operation once it holds.
/// An absent predicate is satisfied immediately.
pub struct WaitUntil {
    predicate: Option<Predicate>,
    operation: Option<Operation>,
}

impl WaitUntil {
    pub fn new(predicate: Option<Predicate>, operation: Option<Operation>) -> Self {
        Self {
            predicate,
            operation,
        }
    }
}

impl Routine for WaitUntil {
    fn name(&self) -> &'static str {
        "wait-until"
    }

    fn resume(&mut self, _frame: &Frame) -> Step {
        let ready = match self.predicate.as_mut() {
            Some(p) => p(),
            None => true,
        };
        if !ready {
            return Step::Yield(Wait::NextTick);
        }

        run(&mut self.operation);
        Step::Done
    }
}

/// Waits for the tick rate to stabilize (or the tick budget to run out),
/// then runs the operation.
pub struct LagWait {
    probe: LagProbe,
    operation: Option<Operation>,
    outcome: Option<LagOutcome>,
}

impl LagWait {
    pub fn new(config: LagConfig, operation: Option<Operation>) -> Self {
        Self {
            probe: LagProbe::new(config),
            operation,
            outcome: None,
        }
    }

    #[inline]
    pub fn outcome(&self) -> Option<LagOutcome> {
        self.outcome
    }
}

impl Routine for LagWait {
    fn name(&self) -> &'static str {
        "lag-wait"
    }

    fn resume(&mut self, frame: &Frame) -> Step {
        let Some(outcome) = self.probe.step(frame) else {
            return Step::Yield(Wait::NextTick);
        };

        match outcome {
            LagOutcome::Settled { tick, variance } => {
                debug!("lag settled: tick={tick} variance={variance:.6}");
            }
            LagOutcome::TimedOut { tick } => {
                debug!("lag wait timed out: tick={tick} deadline={}", self.probe.deadline());
            }
        }

        self.outcome = Some(outcome);
        run(&mut self.operation);
        Step::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    fn frame(tick: u64, time: f64) -> Frame {
        Frame {
            tick,
            dt: 0.016,
            unscaled_dt: 0.016,
            time,
            unscaled_time: time,
        }
    }

    #[test]
    fn delay_yields_once_then_runs_operation() {
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let mut delay = Delay::new(Wait::NextTick, Some(Box::new(move || h.set(h.get() + 1))));

        assert_eq!(delay.resume(&frame(0, 0.0)), Step::Yield(Wait::NextTick));
        assert_eq!(hits.get(), 0);
        assert_eq!(delay.resume(&frame(1, 0.016)), Step::Done);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn loop_for_counts_iterations_against_unscaled_time() {
        let mut lp = LoopFor::new(None, 0.03, None);
        assert_eq!(lp.resume(&frame(0, 0.0)), Step::Yield(Wait::NextTick));
        assert_eq!(lp.resume(&frame(1, 0.016)), Step::Yield(Wait::NextTick));
        assert_eq!(lp.resume(&frame(2, 0.032)), Step::Done);
        assert_eq!(lp.iterations(), 2);
    }

    #[test]
    fn loop_while_without_predicate_finishes_immediately() {
        let mut lp = LoopWhile::new(None, Wait::NextTick, None);
        assert_eq!(lp.resume(&frame(0, 0.0)), Step::Done);
        assert_eq!(lp.iterations(), 0);
    }

    #[test]
    fn wait_until_without_predicate_is_satisfied() {
        let mut w = WaitUntil::new(None, None);
        assert_eq!(w.resume(&frame(0, 0.0)), Step::Done);
    }
}
