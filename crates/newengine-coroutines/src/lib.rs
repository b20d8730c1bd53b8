pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod module;
pub mod sched;
pub mod sync;
pub mod time;

pub use config::{ConfigLoader, EngineConfig, FrameConfig};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, ModuleStage};
pub use frame::Frame;
pub use module::{Module, ModuleCtx};
pub use sched::{
    LagConfig, LagOutcome, Operation, Routine, SchedContext, Scheduler, Step, TaskHandle, TaskState, Wait,
};
pub use sync::ShutdownToken;
pub use time::FrameClock;
