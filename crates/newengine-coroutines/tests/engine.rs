use newengine_coroutines::{
    ConfigLoader, Engine, EngineConfig, EngineError, EngineResult, Module, ModuleCtx, ModuleStage,
    ShutdownToken, TaskHandle, Wait,
};

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::Rc;

const DT: f32 = 1.0 / 60.0;

#[derive(Default)]
struct Probe {
    update_ticks: Rc<RefCell<Vec<u64>>>,
    fired: Rc<Cell<u32>>,
    pending: Rc<RefCell<Option<TaskHandle>>>,
    shut_down: Rc<Cell<bool>>,
}

impl Module for Probe {
    fn id(&self) -> &'static str {
        "probe"
    }

    fn init(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        let fired = self.fired.clone();
        ctx.tasks()
            .delay(Wait::Ticks(2), Some(Box::new(move || fired.set(fired.get() + 1))), None);

        let pending = ctx.tasks().delay(Wait::Ticks(1000), None, None);
        *self.pending.borrow_mut() = Some(pending);
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        if let Some(frame) = ctx.frame() {
            self.update_ticks.borrow_mut().push(frame.tick);
        }
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        self.shut_down.set(true);
        Ok(())
    }
}

struct Failing;

impl Module for Failing {
    fn id(&self) -> &'static str {
        "failing"
    }

    fn update(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Err("update failed".into())
    }
}

struct ExitOnTick(u64);

impl Module for ExitOnTick {
    fn id(&self) -> &'static str {
        "exit-on-tick"
    }

    fn update(&mut self, ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        if ctx.frame().map(|f| f.tick) == Some(self.0) {
            ctx.request_exit();
        }
        Ok(())
    }
}

#[test]
fn engine_runs_modules_then_ticks_the_scheduler() {
    let probe = Probe::default();
    let ticks = probe.update_ticks.clone();
    let fired = probe.fired.clone();

    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    engine.register_module(Box::new(probe)).unwrap();
    engine.start().unwrap();

    engine.step_with_dt(DT).unwrap();
    assert_eq!(fired.get(), 0);
    let frame = engine.step_with_dt(DT).unwrap();
    assert_eq!(frame.tick, 2);
    assert_eq!(fired.get(), 1);

    assert_eq!(*ticks.borrow(), vec![1, 2]);
    assert_eq!(engine.scheduler().len(), 1);
}

#[test]
fn shutdown_cancels_remaining_tasks_and_runs_module_shutdown() {
    let probe = Probe::default();
    let pending = probe.pending.clone();
    let shut_down = probe.shut_down.clone();

    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    engine.register_module(Box::new(probe)).unwrap();
    engine.step_with_dt(DT).unwrap();
    engine.shutdown().unwrap();

    let pending = pending.borrow().clone().expect("init did not run");
    assert!(pending.is_cancelled());
    assert!(shut_down.get());
}

#[test]
fn duplicate_module_ids_are_rejected() {
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    engine.register_module(Box::new(Failing)).unwrap();
    assert!(engine.register_module(Box::new(Failing)).is_err());
}

#[test]
fn module_errors_carry_the_stage() {
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    engine.register_module(Box::new(Failing)).unwrap();

    match engine.step_with_dt(DT) {
        Err(EngineError::Module {
            module_id, stage, ..
        }) => {
            assert_eq!(module_id, "failing");
            assert_eq!(stage, ModuleStage::Update);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn module_exit_request_stops_stepping() {
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    engine.register_module(Box::new(ExitOnTick(3))).unwrap();

    engine.step_with_dt(DT).unwrap();
    engine.step_with_dt(DT).unwrap();
    assert!(matches!(engine.step_with_dt(DT), Err(EngineError::ExitRequested)));
    assert!(matches!(engine.step_with_dt(DT), Err(EngineError::ExitRequested)));
    assert!(engine.exit_requested());
}

#[test]
fn task_can_request_exit_through_the_shutdown_token() {
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    let token = engine.shutdown_token();
    engine
        .tasks()
        .delay(Wait::Ticks(2), Some(Box::new(move || token.request())), None);

    engine.step_with_dt(DT).unwrap();
    engine.step_with_dt(DT).unwrap();
    assert!(matches!(engine.step_with_dt(DT), Err(EngineError::ExitRequested)));
}

#[test]
fn run_returns_once_exit_is_requested() {
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    let token = engine.shutdown_token();
    let handle = engine
        .tasks()
        .end_of_lag_operation(Some(Box::new(move || token.request())), None);

    engine.run().unwrap();
    assert!(handle.is_completed());
    assert!(engine.clock().current_tick() <= 20);
}

#[test]
fn engine_uses_configured_lag_budget() {
    let mut config = EngineConfig::default();
    config.lag.max_ticks = 4;

    let mut engine = Engine::new(config, ShutdownToken::new());
    assert_eq!(engine.config().lag.max_ticks, 4);
    assert_eq!(engine.tasks().lag_config().max_ticks, 4);

    let handle = engine.tasks().end_of_lag_operation(None, None);
    let mut done_at = None;
    for i in 0..10u64 {
        let dt = if i % 2 == 0 { 0.1 } else { 0.016 };
        let frame = engine.step_with_dt(dt).unwrap();
        if handle.is_finished() {
            done_at = Some(frame.tick);
            break;
        }
    }
    assert_eq!(done_at, Some(4));
}

#[test]
fn config_loader_reads_json_and_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.json");
    let cfg = ConfigLoader::load_json(Some(&missing)).unwrap();
    assert_eq!(cfg, EngineConfig::default());

    let path = dir.path().join("engine.json");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"{{ "frame": {{ "target_hz": 120 }}, "lag": {{ "threshold": 0.0005 }} }}"#
    )
    .unwrap();
    drop(file);

    let cfg = ConfigLoader::load_json(Some(&path)).unwrap();
    assert_eq!(cfg.frame.target_hz, 120);
    assert_eq!(cfg.frame.max_dt_ms, 250);
    assert!((cfg.lag.threshold - 0.0005).abs() < 1e-9);
    assert_eq!(cfg.lag.max_ticks, 20);
}

#[test]
fn config_loader_reports_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    match ConfigLoader::load_json(Some(&path)) {
        Err(EngineError::Config { path: p, message }) => {
            assert_eq!(p, path);
            assert!(message.contains("parse failed"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

struct Recorder {
    id: &'static str,
    order: Rc<RefCell<Vec<&'static str>>>,
    fail_shutdown: bool,
}

impl Module for Recorder {
    fn id(&self) -> &'static str {
        self.id
    }

    fn shutdown(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        self.order.borrow_mut().push(self.id);
        if self.fail_shutdown {
            return Err("shutdown failed".into());
        }
        Ok(())
    }
}

#[test]
fn shutdown_runs_in_reverse_order_past_failures() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    for (id, fail_shutdown) in [("first", false), ("second", true), ("third", false)] {
        engine
            .register_module(Box::new(Recorder {
                id,
                order: order.clone(),
                fail_shutdown,
            }))
            .unwrap();
    }

    engine.start().unwrap();
    engine.shutdown().unwrap();
    assert_eq!(*order.borrow(), vec!["third", "second", "first"]);
}

#[test]
fn paused_clock_holds_scaled_delays_only() {
    let mut engine = Engine::new(EngineConfig::default(), ShutdownToken::new());
    engine.clock_mut().set_time_scale(0.0);

    let scaled = engine.tasks().delay_seconds(0.05, None, None);
    let real = engine.tasks().delay(Wait::RealSeconds(0.05), None, None);

    for _ in 0..10 {
        engine.step_with_dt(DT).unwrap();
    }
    assert!(real.is_completed());
    assert!(!scaled.is_finished());

    engine.clock_mut().set_time_scale(1.0);
    for _ in 0..4 {
        engine.step_with_dt(DT).unwrap();
    }
    assert!(scaled.is_completed());
}
