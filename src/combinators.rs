//! Combining a fixed, ordered collection of deferreds into one.
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Deferred, Scheduler};

/// Bookkeeping for one [`Deferred::all`] call. Lives as long as the last
/// input reaction that refers to it.
struct AllJob<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    failed: bool,
}

impl<T> AllJob<T> {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
            remaining: len,
            failed: false,
        }
    }

    /// Stores the value for input `index`. Returns the ordered values once
    /// the last input fulfilled.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        if self.failed {
            return None;
        }
        self.slots[index] = Some(value);
        self.remaining -= 1;
        if self.remaining == 0 {
            Some(self.slots.drain(..).flatten().collect())
        } else {
            None
        }
    }

    /// Marks the job failed. Returns `true` only for the first failure.
    fn fail(&mut self) -> bool {
        if self.failed {
            return false;
        }
        self.failed = true;
        self.slots.clear();
        true
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Fulfills with every input's value, in input order, once all of them
    /// fulfilled. Rejects as soon as the first input rejects.
    ///
    /// "First" is first in time. Inputs that are already settled when `all`
    /// is called are observed in input order.
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop};
    ///
    /// let event_loop = EventLoop::new();
    /// let scheduler = event_loop.scheduler();
    /// let all = Deferred::all(&scheduler, [
    ///     Deferred::<i32, String>::resolved(&scheduler, 1),
    ///     Deferred::rejected(&scheduler, "boom".to_string()),
    ///     Deferred::resolved(&scheduler, 3),
    /// ]);
    /// assert_eq!(event_loop.block_on(&all).unwrap(), Err("boom".to_string()));
    /// ```
    pub fn all<I>(scheduler: &Scheduler, items: I) -> Deferred<Vec<T>, E>
    where
        I: IntoIterator<Item = Deferred<T, E>>,
    {
        let items: Vec<_> = items.into_iter().collect();
        let (resolver, output) = Deferred::pair(scheduler);
        if items.is_empty() {
            resolver.resolve(vec![]);
            return output;
        }

        let job = Arc::new(Mutex::new(AllJob::new(items.len())));
        for (index, item) in items.iter().enumerate() {
            let job = job.clone();
            let resolver = resolver.clone();
            item.subscribe(move |outcome| match outcome {
                Ok(value) => {
                    let values = job.lock().fill(index, value);
                    if let Some(values) = values {
                        tracing::trace!(len = values.len(), "all inputs fulfilled");
                        resolver.resolve(values);
                    }
                }
                Err(err) => {
                    let first = job.lock().fail();
                    if first {
                        tracing::trace!(index, "input rejected, failing fast");
                        resolver.reject(err);
                    } else {
                        tracing::trace!(index, "late rejection ignored");
                    }
                }
            });
        }
        output
    }

    /// Fulfills with every input's outcome, in input order, once all of
    /// them settled. Never rejects.
    pub fn all_settled<I>(scheduler: &Scheduler, items: I) -> Deferred<Vec<Result<T, E>>, E>
    where
        I: IntoIterator<Item = Deferred<T, E>>,
    {
        let items: Vec<_> = items.into_iter().collect();
        let (resolver, output) = Deferred::pair(scheduler);
        if items.is_empty() {
            resolver.resolve(vec![]);
            return output;
        }

        let job = Arc::new(Mutex::new(AllJob::new(items.len())));
        for (index, item) in items.iter().enumerate() {
            let job = job.clone();
            let resolver = resolver.clone();
            item.subscribe(move |outcome| {
                let outcomes = job.lock().fill(index, outcome);
                if let Some(outcomes) = outcomes {
                    resolver.resolve(outcomes);
                }
            });
        }
        output
    }

    /// Settles like whichever input settles first. With no inputs the
    /// result stays pending forever.
    pub fn race<I>(scheduler: &Scheduler, items: I) -> Deferred<T, E>
    where
        I: IntoIterator<Item = Deferred<T, E>>,
    {
        let (resolver, output) = Deferred::pair(scheduler);
        for item in items {
            let resolver = resolver.clone();
            item.subscribe(move |outcome| resolver.settle(outcome));
        }
        output
    }
}
