//! The host capability every deferred is bound to.
//!
//! A deferred never runs a reaction on the caller's stack. It hands the
//! reaction to a [`Schedule`] implementation as a microtask instead, and the
//! host decides when to run it. [`EventLoop`](crate::EventLoop) is the
//! deterministic host this crate ships; anything else (a test fake, a real
//! runtime) can be plugged in by implementing the trait.
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Microtask queue plus delayed-call primitive, provided by the host.
pub trait Schedule: Send + Sync {
    /// Push `task` onto the FIFO microtask queue. It must not run before the
    /// current synchronous call stack has unwound.
    fn enqueue_microtask(&self, task: Task);

    /// Run `task` at most once, and not before `min_delay` has elapsed.
    fn schedule(&self, task: Task, min_delay: Duration);
}

/// Cloneable handle to a [`Schedule`] capability.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, EventLoop};
///
/// let event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
/// let deferred = Deferred::<i32, String>::resolved(&scheduler, 7);
/// assert_eq!(event_loop.block_on(&deferred).unwrap(), Ok(7));
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<dyn Schedule>,
}

impl Scheduler {
    pub fn enqueue_microtask<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.enqueue_microtask(Box::new(f));
    }

    pub fn schedule<F>(&self, f: F, min_delay: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.schedule(Box::new(f), min_delay);
    }
}

impl<S: Schedule + 'static> From<Arc<S>> for Scheduler {
    fn from(inner: Arc<S>) -> Self {
        Self { inner }
    }
}

impl Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("addr", &Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}
