use super::ctx::ModuleCtx;
use crate::error::EngineResult;

/// A single engine module.
///
/// Modules live on the engine thread; the scheduler they reach through
/// [`ModuleCtx::tasks`] is single-threaded, so no `Send` bound is required.
pub trait Module {
    fn id(&self) -> &'static str {
        "module"
    }

    fn init(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Called once per tick, before the scheduler resumes its tasks.
    fn update(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn shutdown(&mut self, _ctx: &mut ModuleCtx<'_>) -> EngineResult<()> {
        Ok(())
    }
}
