use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::Mutex;

use crate::{Error, IntoSettle, Scheduler, Settle, State};

/// A settle-once cell holding the eventual outcome of an operation.
///
/// Cloning a `Deferred` clones the handle, not the cell: every clone observes
/// the same settlement. Reactions registered with [`then`](Deferred::then),
/// [`catch`](Deferred::catch) and friends never run on the caller's stack;
/// they are handed to the deferred's [`Scheduler`] as microtasks.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, EventLoop};
///
/// let event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
/// let doubled = Deferred::<i32, String>::new(&scheduler, |resolver| {
///     resolver.resolve(5);
///     Ok(())
/// })
/// .map(|v| v * 2);
///
/// assert!(doubled.is_pending());
/// assert_eq!(event_loop.block_on(&doubled).unwrap(), Ok(10));
/// ```
pub struct Deferred<T, E> {
    promise: Arc<Mutex<Inner<T, E>>>,
    scheduler: Scheduler,
}

/// The `resolve` / `reject` capability pair of one [`Deferred`].
///
/// Only the first call on any clone of a resolver has an effect.
pub struct Resolver<T, E> {
    deferred: Deferred<T, E>,
}

type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

struct Inner<T, E> {
    state: State<T, E>,
    // Set by the first resolve/reject/adopt. May be true while still
    // pending when the resolution adopted another deferred.
    resolved: bool,
    reactions: Vec<Reaction<T, E>>,
    wakers: Vec<Waker>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a deferred and runs `executor` synchronously, exactly once.
    ///
    /// If the executor returns `Err`, the deferred is rejected with that
    /// error, unless the executor already resolved it.
    pub fn new<F>(scheduler: &Scheduler, executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let (resolver, deferred) = Self::pair(scheduler);
        if let Err(err) = executor(resolver.clone()) {
            tracing::trace!("executor raised");
            resolver.reject(err);
        }
        deferred
    }

    /// A pending deferred together with its resolver.
    pub fn pair(scheduler: &Scheduler) -> (Resolver<T, E>, Self) {
        let deferred = Self {
            promise: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                resolved: false,
                reactions: vec![],
                wakers: vec![],
            })),
            scheduler: scheduler.clone(),
        };
        let resolver = Resolver {
            deferred: deferred.clone(),
        };
        (resolver, deferred)
    }

    pub fn resolved(scheduler: &Scheduler, value: T) -> Self {
        let (resolver, deferred) = Self::pair(scheduler);
        resolver.resolve(value);
        deferred
    }

    pub fn rejected(scheduler: &Scheduler, err: E) -> Self {
        let (resolver, deferred) = Self::pair(scheduler);
        resolver.reject(err);
        deferred
    }

    /// Fulfills with `value` once `min_delay` has elapsed on the scheduler.
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop};
    /// use std::time::Duration;
    ///
    /// let event_loop = EventLoop::new();
    /// let greeting = Deferred::<&str, ()>::after(
    ///     &event_loop.scheduler(),
    ///     Duration::from_secs(2),
    ///     "Hi! This is an asynchronous greeting!",
    /// );
    /// event_loop.advance(Duration::from_millis(1999));
    /// assert!(greeting.is_pending());
    /// event_loop.advance(Duration::from_millis(1));
    /// assert!(greeting.is_settled());
    /// ```
    pub fn after(scheduler: &Scheduler, min_delay: Duration, value: T) -> Self {
        Self::new(scheduler, |resolver| {
            scheduler.schedule(move || resolver.resolve(value), min_delay);
            Ok(())
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> State<T, E> {
        self.promise.lock().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.promise.lock().state.is_pending()
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Runs `reaction` with the outcome on a later microtask.
    ///
    /// While pending the reaction is queued behind earlier ones; once settled
    /// it is enqueued right away. It is never invoked synchronously.
    pub(crate) fn subscribe<F>(&self, reaction: F)
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        let mut promise = self.promise.lock();
        let inner = &mut *promise;
        let outcome = match &inner.state {
            State::Pending => {
                inner.reactions.push(Box::new(reaction));
                tracing::trace!(reactions = inner.reactions.len(), "reaction queued");
                return;
            }
            State::Fulfilled(value) => Ok(value.clone()),
            State::Rejected(err) => Err(err.clone()),
        };
        drop(promise);

        tracing::trace!("already settled, dispatching on next microtask");
        self.scheduler.enqueue_microtask(move || reaction(outcome));
    }

    /// Moves the cell out of `Pending`. Ignores the `resolved` flag, which
    /// only guards the public resolver.
    fn complete(&self, outcome: Result<T, E>) {
        let (reactions, wakers) = {
            let mut promise = self.promise.lock();
            if promise.state.is_settled() {
                return;
            }
            promise.state = State::from(outcome.clone());
            (
                std::mem::take(&mut promise.reactions),
                std::mem::take(&mut promise.wakers),
            )
        };

        tracing::trace!(
            fulfilled = outcome.is_ok(),
            reactions = reactions.len(),
            "settled"
        );
        if outcome.is_err() && reactions.is_empty() && wakers.is_empty() {
            tracing::debug!("rejected with no reaction registered yet");
        }

        for reaction in reactions {
            let outcome = outcome.clone();
            self.scheduler.enqueue_microtask(move || reaction(outcome));
        }
        for waker in wakers {
            waker.wake()
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn resolve(&self, value: T) {
        self.settle(Settle::Fulfill(value))
    }

    pub fn reject(&self, err: E) {
        self.settle(Settle::Reject(err))
    }

    /// Resolves with another deferred: this one stays pending until `other`
    /// settles and then takes over its outcome.
    pub fn adopt(&self, other: Deferred<T, E>) {
        self.settle(Settle::Adopt(other))
    }

    /// Resolves with anything a handler may return. Calls after the first
    /// one are ignored.
    pub fn settle<S: IntoSettle<T, E>>(&self, settle: S) {
        if let Err(err) = self.try_settle(settle) {
            tracing::trace!(%err, "ignored");
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::AlreadySettled`] if this resolver was already used.
    pub fn try_resolve(&self, value: T) -> Result<(), Error> {
        self.try_settle(Settle::Fulfill(value))
    }

    /// # Errors
    ///
    /// Returns [`Error::AlreadySettled`] if this resolver was already used.
    pub fn try_reject(&self, err: E) -> Result<(), Error> {
        self.try_settle(Settle::Reject(err))
    }

    /// # Errors
    ///
    /// Returns [`Error::AlreadySettled`] if this resolver was already used,
    /// or [`Error::SelfAdoption`] if asked to adopt its own deferred.
    pub fn try_settle<S: IntoSettle<T, E>>(&self, settle: S) -> Result<(), Error> {
        let settle = settle.into_settle();
        {
            let mut promise = self.deferred.promise.lock();
            if promise.resolved {
                return Err(Error::AlreadySettled);
            }
            if let Settle::Adopt(other) = &settle {
                if Arc::ptr_eq(&other.promise, &self.deferred.promise) {
                    tracing::warn!("refusing to resolve a deferred with itself");
                    return Err(Error::SelfAdoption);
                }
            }
            promise.resolved = true;
        }

        match settle {
            Settle::Fulfill(value) => self.deferred.complete(Ok(value)),
            Settle::Reject(err) => self.deferred.complete(Err(err)),
            Settle::Adopt(other) => {
                tracing::trace!("adopting");
                let outer = self.deferred.clone();
                other.subscribe(move |outcome| outer.complete(outcome));
            }
        }
        Ok(())
    }

    /// The deferred this resolver settles.
    pub fn deferred(&self) -> &Deferred<T, E> {
        &self.deferred
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T, E> Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let promise = self.promise.lock();
        f.debug_struct("Deferred")
            .field("state", &format_args!("{}", promise.state))
            .field("resolved", &promise.resolved)
            .field("reactions", &promise.reactions.len())
            .finish()
    }
}

impl<T, E> Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl<T: Clone, E: Clone> Future for Deferred<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut promise = self.promise.lock();
        let inner = &mut *promise;
        match &inner.state {
            State::Pending => {
                if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
            State::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            State::Rejected(err) => Poll::Ready(Err(err.clone())),
        }
    }
}
