use crate::sched::lag::LagConfig;
use crate::sched::ops::{
    Body, Delay, ElapsedPredicate, LagWait, LoopFor, LoopWhile, Operation, Predicate, WaitUntil,
};
use crate::sched::sched::Scheduler;
use crate::sched::task::{Routine, TaskHandle, Wait};

use log::debug;
use std::cell::OnceCell;
use std::rc::Rc;

/// Caller-facing entry point for scheduling work.
///
/// Every operation takes an optional explicit scheduler. `None` resolves to the
/// default scheduler: either the one injected with [`SchedContext::with_default`]
/// or one created lazily on the first start-type call.
#[derive(Default)]
pub struct SchedContext {
    default: OnceCell<Rc<Scheduler>>,
    lag: LagConfig,
}

impl SchedContext {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose default scheduler is `scheduler`.
    pub fn with_default(scheduler: Rc<Scheduler>) -> Self {
        let default = OnceCell::new();
        let _ = default.set(scheduler);
        Self {
            default,
            lag: LagConfig::default(),
        }
    }

    #[inline]
    pub fn with_lag_config(mut self, lag: LagConfig) -> Self {
        self.lag = lag;
        self
    }

    #[inline]
    pub fn lag_config(&self) -> LagConfig {
        self.lag
    }

    #[inline]
    pub fn has_default(&self) -> bool {
        self.default.get().is_some()
    }

    /// Returns the default scheduler, creating it on first use.
    pub fn default_scheduler(&self) -> &Rc<Scheduler> {
        self.default.get_or_init(|| {
            let s = Rc::new(Scheduler::new());
            debug!("default scheduler bound: id={}", s.id());
            s
        })
    }

    #[inline]
    fn resolve<'a>(&'a self, ctx: Option<&'a Scheduler>) -> &'a Scheduler {
        match ctx {
            Some(s) => s,
            None => self.default_scheduler().as_ref(),
        }
    }

    pub fn start<R>(&self, routine: R, ctx: Option<&Scheduler>) -> TaskHandle
    where
        R: Routine + 'static,
    {
        self.resolve(ctx).start(routine)
    }

    /// Stops a task. A no-op if the task is already finished, if it belongs to
    /// another scheduler, or if no default scheduler has been bound yet.
    pub fn stop(&self, handle: &TaskHandle, ctx: Option<&Scheduler>) {
        let scheduler = match ctx {
            Some(s) => s,
            None => match self.default.get() {
                Some(s) => s.as_ref(),
                None => return,
            },
        };
        scheduler.stop(handle);
    }

    pub fn delay(&self, wait: Wait, operation: Option<Operation>, ctx: Option<&Scheduler>) -> TaskHandle {
        self.start(Delay::new(wait, operation), ctx)
    }

    #[inline]
    pub fn delay_seconds(&self, seconds: f32, operation: Option<Operation>, ctx: Option<&Scheduler>) -> TaskHandle {
        self.delay(Wait::Seconds(seconds), operation, ctx)
    }

    #[inline]
    pub fn end_of_tick_operation(&self, operation: Option<Operation>, ctx: Option<&Scheduler>) -> TaskHandle {
        self.delay(Wait::EndOfTick, operation, ctx)
    }

    pub fn loop_for(
        &self,
        body: Option<Body>,
        duration: f32,
        on_complete: Option<Operation>,
        ctx: Option<&Scheduler>,
    ) -> TaskHandle {
        self.start(LoopFor::new(body, duration, on_complete), ctx)
    }

    pub fn loop_while(
        &self,
        predicate: Option<ElapsedPredicate>,
        interval: Wait,
        body: Option<Body>,
        ctx: Option<&Scheduler>,
    ) -> TaskHandle {
        self.start(LoopWhile::new(predicate, interval, body), ctx)
    }

    #[inline]
    pub fn loop_each_tick(
        &self,
        predicate: Option<ElapsedPredicate>,
        body: Option<Body>,
        ctx: Option<&Scheduler>,
    ) -> TaskHandle {
        self.loop_while(predicate, Wait::NextTick, body, ctx)
    }

    pub fn wait_until(
        &self,
        predicate: Option<Predicate>,
        operation: Option<Operation>,
        ctx: Option<&Scheduler>,
    ) -> TaskHandle {
        self.start(WaitUntil::new(predicate, operation), ctx)
    }

    /// Runs `operation` once the tick rate has stabilized or the configured
    /// tick budget ran out.
    pub fn end_of_lag_operation(&self, operation: Option<Operation>, ctx: Option<&Scheduler>) -> TaskHandle {
        self.start(LagWait::new(self.lag, operation), ctx)
    }

    /// Handle that finishes once the tick rate has stabilized, or after
    /// `max_ticks` ticks. Suspend on it with [`Wait::Task`].
    pub fn wait_for_end_of_lag(&self, ctx: Option<&Scheduler>, max_ticks: u32) -> TaskHandle {
        let config = LagConfig {
            max_ticks,
            ..self.lag
        };
        self.start(LagWait::new(config, None), ctx)
    }

    /// Cancels every task of the default scheduler and unbinds it.
    pub fn teardown(&mut self) -> Option<Rc<Scheduler>> {
        let scheduler = self.default.take()?;
        let n = scheduler.stop_all();
        debug!("default scheduler torn down: id={} cancelled={n}", scheduler.id());
        Some(scheduler)
    }
}
