use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ModuleStage};
use crate::frame::Frame;
use crate::module::{Module, ModuleCtx};
use crate::sched::{SchedContext, Scheduler};
use crate::sync::ShutdownToken;
use crate::time::FrameClock;

use log::{debug, info, warn};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Host tick loop.
///
/// Each step advances the frame clock, runs `update` on every module in
/// registration order and then ticks the engine scheduler exactly once.
pub struct Engine {
    config: EngineConfig,
    modules: Vec<Box<dyn Module>>,
    module_ids: HashSet<&'static str>,

    tasks: SchedContext,
    clock: FrameClock,

    shutdown: ShutdownToken,
    exit_requested: bool,

    started: bool,
    last: Instant,
}

impl Engine {
    pub fn new(config: EngineConfig, shutdown: ShutdownToken) -> Self {
        let scheduler = Rc::new(Scheduler::new());
        let tasks = SchedContext::with_default(scheduler).with_lag_config(config.lag);
        let clock = FrameClock::new().with_max_dt(config.frame.max_dt_sec());

        Self {
            config,
            modules: Vec::new(),
            module_ids: HashSet::new(),
            tasks,
            clock,
            shutdown,
            exit_requested: false,
            started: false,
            last: Instant::now(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn request_exit(&mut self) {
        self.shutdown.request();
        self.exit_requested = true;
    }

    #[inline]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.exit_requested || self.shutdown.is_requested()
    }

    /// Default scheduling context; its scheduler is ticked by this engine.
    #[inline]
    pub fn tasks(&self) -> &SchedContext {
        &self.tasks
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        self.tasks.default_scheduler()
    }

    #[inline]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[inline]
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    pub fn register_module(&mut self, module: Box<dyn Module>) -> EngineResult<()> {
        let id = module.id();
        if !self.module_ids.insert(id) {
            return Err(EngineError::Other(format!("module already registered: {id}")));
        }

        self.modules.push(module);
        Ok(())
    }

    /// Runs `init` on every module in registration order.
    pub fn start(&mut self) -> EngineResult<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.last = Instant::now();

        info!("engine start: modules={}", self.modules.len());

        let mut modules = std::mem::take(&mut self.modules);
        let result = self.run_stage(&mut modules, None, ModuleStage::Init);
        self.modules = modules;
        result
    }

    /// Advances one tick using the wall-clock time since the previous step.
    pub fn step(&mut self) -> EngineResult<Frame> {
        let now = Instant::now();
        if !self.started {
            self.last = now;
        }

        let dt = (now - self.last).as_secs_f32();
        self.last = now;
        self.step_with_dt(dt)
    }

    /// Advances one tick with an explicit raw delta.
    pub fn step_with_dt(&mut self, raw_dt: f32) -> EngineResult<Frame> {
        if self.exit_requested() {
            return Err(EngineError::ExitRequested);
        }

        if !self.started {
            self.start()?;
        }

        let frame = self.clock.advance(raw_dt);

        let mut modules = std::mem::take(&mut self.modules);
        let result = self.run_stage(&mut modules, Some(&frame), ModuleStage::Update);
        self.modules = modules;
        result?;

        self.tasks.default_scheduler().tick(&frame);
        Ok(frame)
    }

    /// Steps until exit is requested, then shuts down.
    pub fn run(&mut self) -> EngineResult<()> {
        let budget = match self.config.frame.target_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        };

        loop {
            let t0 = Instant::now();
            match self.step() {
                Ok(_) => {}
                Err(EngineError::ExitRequested) => break,
                Err(e) => {
                    let _ = self.shutdown();
                    return Err(e);
                }
            }

            if let Some(budget) = budget {
                let spent = t0.elapsed();
                if spent < budget {
                    std::thread::sleep(budget - spent);
                }
            }
        }

        self.shutdown()
    }

    /// Runs `shutdown` on every module in reverse order and cancels all
    /// remaining tasks.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        let mut modules = std::mem::take(&mut self.modules);

        for m in modules.iter_mut().rev() {
            if let Err(e) = self.call_stage(m.as_mut(), None, ModuleStage::Shutdown) {
                warn!("{e}");
            }
        }
        self.modules = modules;

        if let Some(scheduler) = self.tasks.teardown() {
            debug!("engine shutdown: scheduler={} tick={}", scheduler.id(), self.clock.current_tick());
        }
        Ok(())
    }

    fn run_stage(
        &mut self,
        modules: &mut [Box<dyn Module>],
        frame: Option<&Frame>,
        stage: ModuleStage,
    ) -> EngineResult<()> {
        for m in modules.iter_mut() {
            self.call_stage(m.as_mut(), frame, stage)?;

            if self.exit_requested {
                self.shutdown.request();
            }
            if self.exit_requested() {
                return Err(EngineError::ExitRequested);
            }
        }
        Ok(())
    }

    fn call_stage(&mut self, m: &mut dyn Module, frame: Option<&Frame>, stage: ModuleStage) -> EngineResult<()> {
        let mut ctx = ModuleCtx::new(&self.tasks, &self.shutdown, &mut self.exit_requested);
        if let Some(frame) = frame {
            ctx.set_frame(frame);
        }

        let r = match stage {
            ModuleStage::Init => m.init(&mut ctx),
            ModuleStage::Update => m.update(&mut ctx),
            ModuleStage::Shutdown => m.shutdown(&mut ctx),
        };
        r.map_err(|e| EngineError::with_module_stage(m.id(), stage, e))
    }
}
