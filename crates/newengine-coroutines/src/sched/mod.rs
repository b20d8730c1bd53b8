pub mod context;
pub mod lag;
pub mod ops;
pub mod sched;
pub mod task;

pub use context::SchedContext;
pub use lag::{variance, DeltaWindow, LagConfig, LagOutcome, LagProbe};
pub use ops::{Body, Delay, ElapsedPredicate, LagWait, LoopFor, LoopWhile, Operation, Predicate, WaitUntil};
pub use sched::{Scheduler, TaskSnapshot};
pub use task::{Routine, Step, TaskHandle, TaskId, TaskState, Wait};
