use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown token.
///
/// Cloned into tasks, signal handlers or other threads; the engine checks it
/// between ticks.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn request(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
