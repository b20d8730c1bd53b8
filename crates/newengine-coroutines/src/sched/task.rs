use crate::frame::Frame;

use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub type TaskId = u64;
pub type SchedulerId = u64;

/// Lifecycle of a scheduled task.
///
/// `Scheduled -> Suspended -> Completed`; `Cancelled` is reachable from
/// `Scheduled` or `Suspended` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Scheduled,
    Suspended,
    Completed,
    Cancelled,
}

impl TaskState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Suspended => "suspended",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// Opaque handle to one task.
///
/// The handle shares the task's state cell, so it stays readable after the
/// scheduler has released the task.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    owner: SchedulerId,
    state: Rc<Cell<TaskState>>,
}

impl TaskHandle {
    #[inline]
    pub(crate) fn new(id: TaskId, owner: SchedulerId) -> Self {
        Self {
            id,
            owner,
            state: Rc::new(Cell::new(TaskState::Scheduled)),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Id of the scheduler that owns this task.
    #[inline]
    pub fn owner(&self) -> SchedulerId {
        self.owner
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state.get().is_terminal()
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state.get() == TaskState::Completed
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.get() == TaskState::Cancelled
    }

    #[inline]
    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.set(state);
    }
}

impl PartialEq for TaskHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.owner == other.owner
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("state", &self.state.get())
            .finish()
    }
}

/// Suspension signal returned by a routine.
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    /// Resume on the next tick.
    NextTick,
    /// Resume once the current tick has finished. Same as `NextTick`.
    EndOfTick,
    /// Resume once the current frame has been presented. Same as `NextTick`.
    EndOfFrame,
    /// Resume `n` ticks from now (at least one).
    Ticks(u32),
    /// Resume once the given span of scaled time has passed.
    Seconds(f32),
    /// Resume once the given span of unscaled time has passed.
    RealSeconds(f32),
    /// Resume once another task has completed or been cancelled.
    Task(TaskHandle),
}

/// Outcome of a single resume.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Yield(Wait),
    Done,
}

/// A resumable unit of work driven by the scheduler.
///
/// The first `resume` runs synchronously inside `Scheduler::start`; every
/// later one runs at most once per tick, once the previous `Wait` is satisfied.
pub trait Routine {
    fn name(&self) -> &'static str {
        "routine"
    }

    fn resume(&mut self, frame: &Frame) -> Step;
}

impl<F> Routine for F
where
    F: FnMut(&Frame) -> Step,
{
    fn resume(&mut self, frame: &Frame) -> Step {
        self(frame)
    }
}

/// Resumption condition of a suspended task.
#[derive(Debug, Clone)]
pub(crate) enum Resume {
    AtTick(u64),
    AtTime { not_before: u64, at: f64, scaled: bool },
    AfterTask { not_before: u64, handle: TaskHandle },
}

impl Resume {
    pub(crate) fn from_wait(wait: Wait, now: &Frame) -> Self {
        let next = now.tick.wrapping_add(1);
        match wait {
            Wait::NextTick | Wait::EndOfTick | Wait::EndOfFrame => Resume::AtTick(next),
            Wait::Ticks(n) => Resume::AtTick(now.tick.saturating_add(u64::from(n.max(1)))),
            Wait::Seconds(s) => Resume::AtTime {
                not_before: next,
                at: now.time + f64::from(non_negative(s)),
                scaled: true,
            },
            Wait::RealSeconds(s) => Resume::AtTime {
                not_before: next,
                at: now.unscaled_time + f64::from(non_negative(s)),
                scaled: false,
            },
            Wait::Task(handle) => Resume::AfterTask {
                not_before: next,
                handle,
            },
        }
    }

    pub(crate) fn is_ready(&self, frame: &Frame) -> bool {
        match self {
            Resume::AtTick(t) => frame.tick >= *t,
            Resume::AtTime {
                not_before,
                at,
                scaled,
            } => {
                let now = if *scaled { frame.time } else { frame.unscaled_time };
                frame.tick >= *not_before && now >= *at
            }
            Resume::AfterTask { not_before, handle } => {
                frame.tick >= *not_before && handle.is_finished()
            }
        }
    }
}

#[inline]
fn non_negative(s: f32) -> f32 {
    if s.is_finite() {
        s.max(0.0)
    } else {
        0.0
    }
}

/// Scheduler-owned record of one live task.
pub(crate) struct Task {
    pub(crate) handle: TaskHandle,
    routine: Box<dyn Routine>,
    resume: Resume,
    resumes: u32,
}

impl Task {
    #[inline]
    pub(crate) fn new(handle: TaskHandle, routine: Box<dyn Routine>) -> Self {
        Self {
            handle,
            routine,
            resume: Resume::AtTick(0),
            resumes: 0,
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &'static str {
        self.routine.name()
    }

    #[inline]
    pub(crate) fn resumes(&self) -> u32 {
        self.resumes
    }

    #[inline]
    pub(crate) fn is_ready(&self, frame: &Frame) -> bool {
        self.resume.is_ready(frame)
    }

    /// Resumes the routine once. Returns `true` while the task stays live.
    pub(crate) fn drive(&mut self, frame: &Frame) -> bool {
        self.resumes = self.resumes.saturating_add(1);
        let step = self.routine.resume(frame);

        // A callback may have stopped its own task during the resume.
        if self.handle.is_cancelled() {
            return false;
        }

        match step {
            Step::Yield(wait) => {
                self.resume = Resume::from_wait(wait, frame);
                self.handle.set_state(TaskState::Suspended);
                true
            }
            Step::Done => {
                self.handle.set_state(TaskState::Completed);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn next_tick_family_waits_exactly_one_tick() {
        for wait in [Wait::NextTick, Wait::EndOfTick, Wait::EndOfFrame, Wait::Ticks(0)] {
            let r = Resume::from_wait(wait, &frame(4, 0.0));
            assert!(!r.is_ready(&frame(4, 0.0)));
            assert!(r.is_ready(&frame(5, 0.0)));
        }
    }

    #[test]
    fn zero_seconds_still_waits_for_the_next_tick() {
        let r = Resume::from_wait(Wait::Seconds(0.0), &frame(1, 1.0));
        assert!(!r.is_ready(&frame(1, 1.0)));
        assert!(r.is_ready(&frame(2, 1.0)));
    }

    #[test]
    fn task_wait_resumes_after_the_handle_finishes() {
        let other = TaskHandle::new(9, 1);
        let r = Resume::from_wait(Wait::Task(other.clone()), &frame(1, 0.0));
        assert!(!r.is_ready(&frame(2, 0.0)));
        other.set_state(TaskState::Completed);
        assert!(r.is_ready(&frame(2, 0.0)));
    }
}
