use crate::frame::Frame;
use crate::sched::{SchedContext, Scheduler};
use crate::sync::ShutdownToken;

/// Context passed to modules.
///
/// This prevents modules from taking `&mut Engine` (god object problem).
pub struct ModuleCtx<'a> {
    tasks: &'a SchedContext,
    shutdown: &'a ShutdownToken,
    exit: &'a mut bool,

    /// Frame snapshot for the current stage (stored by value).
    frame: Option<Frame>,
}

impl<'a> ModuleCtx<'a> {
    #[inline]
    pub(crate) fn new(tasks: &'a SchedContext, shutdown: &'a ShutdownToken, exit: &'a mut bool) -> Self {
        Self {
            tasks,
            shutdown,
            exit,
            frame: None,
        }
    }

    #[inline]
    pub fn set_frame(&mut self, frame: &Frame) {
        self.frame = Some(*frame);
    }

    /// Returns the current frame snapshot, if attached.
    #[inline]
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Scheduling context whose default is the engine scheduler.
    #[inline]
    pub fn tasks(&self) -> &SchedContext {
        self.tasks
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        self.tasks.default_scheduler()
    }

    /// Token that tasks can capture to request exit from a callback.
    #[inline]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    #[inline]
    pub fn request_exit(&mut self) {
        *self.exit = true;
    }

    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        *self.exit || self.shutdown.is_requested()
    }
}
