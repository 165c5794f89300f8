//! A deterministic, single-threaded host for the [`Schedule`] capability.
//!
//! Time is virtual: the clock only moves when the loop fires a timer or when
//! [`EventLoop::advance`] is called, so delayed work is reproducible in tests.
//! Microtasks always run before any timer.
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{Deferred, Error, Schedule, Scheduler, Task};

/// Number of microtasks a single [`EventLoop::turn`] may run by default.
pub const DEFAULT_MICROTASK_BUDGET: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLoopConfig {
    /// Upper bound on microtasks drained per turn. A turn that hits the bound
    /// returns early without firing a timer.
    pub microtask_budget: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            microtask_budget: DEFAULT_MICROTASK_BUDGET,
        }
    }
}

/// What one call to [`EventLoop::turn`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Turn {
    pub microtasks: usize,
    pub timer_fired: bool,
    pub clock_advanced: bool,
}

/// Cloneable handle to a shared event loop.
#[derive(Clone)]
pub struct EventLoop {
    shared: Arc<Shared>,
}

struct Shared {
    config: EventLoopConfig,
    queues: Mutex<Queues>,
}

struct Queues {
    microtasks: VecDeque<Task>,
    timers: BinaryHeap<Timer>,
    now: Duration,
    next_seq: u64,
}

struct Timer {
    deadline: Duration,
    seq: u64,
    task: Task,
}

// === impl Timer ===

// `BinaryHeap` is a max-heap; invert so the earliest (deadline, seq) pops first.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

// === impl Shared ===

impl Schedule for Shared {
    fn enqueue_microtask(&self, task: Task) {
        self.queues.lock().microtasks.push_back(task);
    }

    fn schedule(&self, task: Task, min_delay: Duration) {
        let mut queues = self.queues.lock();
        let deadline = queues.now.saturating_add(min_delay);
        let seq = queues.next_seq;
        queues.next_seq += 1;
        tracing::trace!(?deadline, seq, "timer registered");
        queues.timers.push(Timer {
            deadline,
            seq,
            task,
        });
    }
}

// === impl EventLoop ===

impl EventLoop {
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    pub fn with_config(config: EventLoopConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                queues: Mutex::new(Queues {
                    microtasks: VecDeque::new(),
                    timers: BinaryHeap::new(),
                    now: Duration::ZERO,
                    next_seq: 0,
                }),
            }),
        }
    }

    /// The capability to hand to [`Deferred`]s driven by this loop.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::from(self.shared.clone())
    }

    pub fn config(&self) -> EventLoopConfig {
        self.shared.config
    }

    /// Current virtual time, measured from the loop's creation.
    pub fn now(&self) -> Duration {
        self.shared.queues.lock().now
    }

    pub fn pending_microtasks(&self) -> usize {
        self.shared.queues.lock().microtasks.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.shared.queues.lock().timers.len()
    }

    pub fn has_pending_work(&self) -> bool {
        let queues = self.shared.queues.lock();
        !queues.microtasks.is_empty() || !queues.timers.is_empty()
    }

    /// Runs queued microtasks in FIFO order, including ones queued while
    /// draining, up to the configured budget. Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let budget = self.shared.config.microtask_budget.max(1);
        let mut ran = 0;
        while ran < budget {
            let task = self.shared.queues.lock().microtasks.pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        if ran == budget && self.pending_microtasks() > 0 {
            tracing::warn!(budget, "microtask budget exhausted, yielding");
        }
        ran
    }

    /// Drains microtasks, then fires at most one timer, moving the clock
    /// forward to its deadline if it lies in the future.
    pub fn turn(&self) -> Turn {
        let mut turn = Turn {
            microtasks: self.run_microtasks(),
            ..Turn::default()
        };
        if self.pending_microtasks() > 0 {
            return turn;
        }

        let timer = {
            let mut queues = self.shared.queues.lock();
            let timer = queues.timers.pop();
            if let Some(timer) = &timer {
                if timer.deadline > queues.now {
                    tracing::trace!(from = ?queues.now, to = ?timer.deadline, "clock advanced");
                    queues.now = timer.deadline;
                    turn.clock_advanced = true;
                }
            }
            timer
        };
        if let Some(timer) = timer {
            tracing::trace!(seq = timer.seq, "timer fired");
            (timer.task)();
            turn.timer_fired = true;
        }
        turn
    }

    /// Turns until there is nothing left to run. Returns the number of turns.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.has_pending_work() {
            self.turn();
            turns += 1;
        }
        turns
    }

    /// Moves the clock forward by `by`, firing every timer that falls due on
    /// the way (with microtasks drained before each one). Returns the number
    /// of timers fired. Virtual time saturates at `Duration::MAX`.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        let mut fired = 0;
        loop {
            self.run_microtasks();
            if self.pending_microtasks() > 0 {
                continue;
            }

            let timer = {
                let mut queues = self.shared.queues.lock();
                let due = queues
                    .timers
                    .peek()
                    .is_some_and(|timer| timer.deadline <= target);
                let timer = if due { queues.timers.pop() } else { None };
                if let Some(timer) = &timer {
                    queues.now = queues.now.max(timer.deadline);
                }
                timer
            };
            let Some(timer) = timer else {
                break;
            };
            tracing::trace!(seq = timer.seq, "timer fired");
            (timer.task)();
            fired += 1;
        }

        let mut queues = self.shared.queues.lock();
        queues.now = queues.now.max(target);
        fired
    }

    /// Drives the loop until `deferred` settles and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stalled`] if the loop runs out of work while the
    /// deferred is still pending.
    pub fn block_on<T, E>(&self, deferred: &Deferred<T, E>) -> Result<Result<T, E>, Error>
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        loop {
            if let Some(outcome) = deferred.state().into_result() {
                return Ok(outcome);
            }
            // Settlement is re-checked before any timer may fire.
            if self.pending_microtasks() > 0 {
                self.run_microtasks();
                continue;
            }
            if !self.has_pending_work() {
                tracing::debug!("event loop idle with deferred still pending");
                return Err(Error::Stalled);
            }
            self.turn();
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.shared.queues.lock();
        f.debug_struct("EventLoop")
            .field("now", &queues.now)
            .field("microtasks", &queues.microtasks.len())
            .field("timers", &queues.timers.len())
            .field("config", &self.shared.config)
            .finish()
    }
}
