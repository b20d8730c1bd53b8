use log::{debug, info, warn};

use newengine_coroutines::sched::Delay;
use newengine_coroutines::{
    ConfigLoader, Engine, EngineError, EngineResult, Module, ModuleCtx, ShutdownToken, Wait,
};
use newengine_modules_logging::{ConsoleLoggerConfig, ConsoleLoggerModule};

use std::path::PathBuf;

/// Hard cap on simulated ticks, in case exit is never requested.
const MAX_TICKS: u64 = 600;

/// Simulated raw deltas: a loading hitch, then a steady 60 Hz cadence.
fn synthetic_delta(tick: u64) -> f32 {
    const HITCH: [f32; 6] = [0.210, 0.045, 0.120, 0.008, 0.090, 0.033];
    HITCH.get(tick as usize).copied().unwrap_or(1.0 / 60.0)
}

struct LagProbeModule {
    linger_sec: f32,
}

impl LagProbeModule {
    #[inline]
    fn new(linger_sec: f32) -> Self {
        Self { linger_sec }
    }
}

impl Module for LagProbeModule {
    fn id(&self) -> &'static str {
        "lag-probe"
    }

    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        let tasks = ctx.tasks();
        let max_ticks = tasks.lag_config().max_ticks;

        let lag = tasks.wait_for_end_of_lag(None, max_ticks);
        info!("lag probe armed: task={} max_ticks={max_ticks}", lag.id());

        // Anything that only makes sense at a steady frame rate waits on the probe.
        tasks.delay(
            Wait::Task(lag),
            Some(Box::new(|| info!("frame rate stable; deferred work may start"))),
            None,
        );

        tasks.loop_while(
            Some(Box::new(|elapsed: f32| elapsed < 1.0)),
            Wait::RealSeconds(0.25),
            Some(Box::new(|| debug!("heartbeat"))),
            None,
        );

        let scheduler = tasks.default_scheduler().clone();
        let token = ctx.shutdown_token();
        let linger = self.linger_sec;
        tasks.end_of_lag_operation(
            Some(Box::new(move || {
                info!("lag ended at tick {}; exiting in {linger}s", scheduler.now().tick);
                scheduler.start(Delay::new(
                    Wait::RealSeconds(linger),
                    Some(Box::new(move || token.request())),
                ));
            })),
            None,
        );

        Ok(())
    }
}

fn main() -> EngineResult<()> {
    let config_path = std::env::var("NEWENGINE_CONFIG").ok().map(PathBuf::from);
    let config = ConfigLoader::load_json(config_path.as_deref())?;

    let mut engine = Engine::new(config, ShutdownToken::new());
    engine.register_module(Box::new(ConsoleLoggerModule::new(ConsoleLoggerConfig::default())))?;
    engine.register_module(Box::new(LagProbeModule::new(0.5)))?;
    engine.start()?;

    for tick in 0..MAX_TICKS {
        match engine.step_with_dt(synthetic_delta(tick)) {
            Ok(_) => {}
            Err(EngineError::ExitRequested) => break,
            Err(e) => {
                let _ = engine.shutdown();
                return Err(e);
            }
        }
    }

    if !engine.exit_requested() {
        warn!("lag probe: tick cap reached without exit request");
    }
    info!("lag probe: stopped at tick {}", engine.clock().current_tick());

    engine.shutdown()
}
