use crate::frame::Frame;
use crate::sched::task::{Routine, SchedulerId, Task, TaskHandle, TaskId, TaskState};

use log::trace;
use serde::Serialize;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

/// Inspection record for one live task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub routine: &'static str,
    pub state: TaskState,
    pub resumes: u32,
}

/// Record of a task that is out of `Inner::tasks` while it is being driven:
/// every task of the tick in progress, plus a task inside its first resume.
#[derive(Clone)]
struct InFlight {
    handle: TaskHandle,
    routine: &'static str,
    resumes: u32,
}

impl InFlight {
    #[inline]
    fn of(task: &Task) -> Self {
        Self {
            handle: task.handle.clone(),
            routine: task.name(),
            resumes: task.resumes(),
        }
    }
}

struct Inner {
    now: Frame,
    next_task: TaskId,
    tasks: Vec<Task>,
    in_flight: Vec<InFlight>,
}

impl Inner {
    #[inline]
    fn live_in_flight(&self) -> impl Iterator<Item = &InFlight> {
        self.in_flight.iter().filter(|f| !f.handle.is_finished())
    }
}

/// Cooperative tick-driven scheduler.
///
/// Single-threaded: routines and callbacks are `!Send`, and the scheduler
/// is driven from the host loop via [`Scheduler::tick`].
/// Callbacks may re-enter the scheduler (start or stop tasks) while it ticks;
/// no borrow is held across a resume.
pub struct Scheduler {
    id: SchedulerId,
    inner: RefCell<Inner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
            inner: RefCell::new(Inner {
                now: Frame::default(),
                next_task: 1,
                tasks: Vec::new(),
                in_flight: Vec::new(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> SchedulerId {
        self.id
    }

    /// Frame of the most recent tick (`Frame::default()` before the first one).
    #[inline]
    pub fn now(&self) -> Frame {
        self.inner.borrow().now
    }

    /// Number of live tasks, including the ones being driven right now.
    pub fn len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.tasks.len() + inner.live_in_flight().count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: &TaskHandle) -> bool {
        if handle.owner() != self.id {
            return false;
        }

        let inner = self.inner.borrow();
        inner.tasks.iter().any(|t| t.handle.id() == handle.id())
            || inner.live_in_flight().any(|f| f.handle.id() == handle.id())
    }

    /// Registers a routine and runs its first resume synchronously.
    ///
    /// If that resume already finishes the routine, the returned handle is
    /// `Completed` and nothing is kept.
    pub fn start<R>(&self, routine: R) -> TaskHandle
    where
        R: Routine + 'static,
    {
        let (id, now) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_task;
            inner.next_task = inner.next_task.wrapping_add(1);
            (id, inner.now)
        };

        let handle = TaskHandle::new(id, self.id);
        let mut task = Task::new(handle.clone(), Box::new(routine));
        trace!("task start: id={id} routine={} tick={}", task.name(), now.tick);

        // Visible to stop_all and inspection while the first resume runs.
        self.inner.borrow_mut().in_flight.push(InFlight::of(&task));
        let live = task.drive(&now);

        let mut inner = self.inner.borrow_mut();
        inner.in_flight.retain(|f| f.handle.id() != id);
        if live && !handle.is_finished() {
            inner.tasks.push(task);
        } else {
            trace!("task finished on start: id={id} state={}", handle.state().as_str());
        }

        handle
    }

    /// Cancels a task owned by this scheduler.
    ///
    /// Returns `false` (and does nothing) if the handle belongs to another
    /// scheduler or is already completed/cancelled.
    pub fn stop(&self, handle: &TaskHandle) -> bool {
        if handle.owner() != self.id || handle.is_finished() {
            return false;
        }

        handle.set_state(TaskState::Cancelled);
        self.inner
            .borrow_mut()
            .tasks
            .retain(|t| t.handle.id() != handle.id());
        trace!("task cancelled: id={}", handle.id());
        true
    }

    /// Cancels every live task. Returns how many were cancelled.
    pub fn stop_all(&self) -> usize {
        let (tasks, in_flight) = {
            let mut inner = self.inner.borrow_mut();
            (std::mem::take(&mut inner.tasks), inner.in_flight.clone())
        };

        let mut n = 0usize;
        let handles = tasks.iter().map(|t| &t.handle).chain(in_flight.iter().map(|f| &f.handle));
        for h in handles {
            if !h.is_finished() {
                h.set_state(TaskState::Cancelled);
                n += 1;
            }
        }
        if n > 0 {
            trace!("cancelled {n} task(s)");
        }
        n
    }

    /// Drives every live task whose wait is satisfied, at most once each.
    ///
    /// Returns the number of tasks resumed.
    pub fn tick(&self, frame: &Frame) -> usize {
        let (tasks, base) = {
            let mut inner = self.inner.borrow_mut();
            inner.now = *frame;
            let base = inner.in_flight.len();
            let tasks = std::mem::take(&mut inner.tasks);
            inner.in_flight.extend(tasks.iter().map(InFlight::of));
            (tasks, base)
        };

        let mut kept: Vec<Task> = Vec::with_capacity(tasks.len());
        let mut resumed = 0usize;

        for mut task in tasks {
            // Stopped by an earlier callback in this tick.
            if task.handle.is_finished() {
                continue;
            }
            if !task.is_ready(frame) {
                kept.push(task);
                continue;
            }

            resumed += 1;
            if task.drive(frame) {
                kept.push(task);
            } else {
                trace!(
                    "task released: id={} state={} tick={}",
                    task.handle.id(),
                    task.handle.state().as_str(),
                    frame.tick
                );
            }
        }

        let mut inner = self.inner.borrow_mut();
        let started_during_tick = std::mem::replace(&mut inner.tasks, kept);
        inner.tasks.extend(started_during_tick);
        inner.tasks.retain(|t| !t.handle.is_finished());
        inner.in_flight.truncate(base);

        resumed
    }

    /// Inspection records for every live task.
    ///
    /// Called from inside a tick, tasks being driven by that tick report the
    /// resume count they had when the tick began.
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let inner = self.inner.borrow();
        let in_flight = inner.live_in_flight().map(|f| TaskSnapshot {
            id: f.handle.id(),
            routine: f.routine,
            state: f.handle.state(),
            resumes: f.resumes,
        });

        let mut out: Vec<TaskSnapshot> = in_flight.collect();
        out.extend(inner.tasks.iter().map(|t| TaskSnapshot {
            id: t.handle.id(),
            routine: t.name(),
            state: t.handle.state(),
            resumes: t.resumes(),
        }));
        out
    }
}

impl Default for Scheduler {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for t in self.inner.get_mut().tasks.drain(..) {
            t.handle.set_state(TaskState::Cancelled);
        }
    }
}
