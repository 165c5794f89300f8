//! Deriving new deferreds from the outcome of an existing one.
use crate::Deferred;

/// How a derived deferred should settle.
///
/// This is the explicit tag that replaces "is the returned value itself a
/// promise?" checks: a handler either fulfills with a plain value, rejects,
/// or hands over another deferred to be flattened into the result.
#[derive(Debug)]
pub enum Settle<T, E> {
    Fulfill(T),
    Reject(E),
    Adopt(Deferred<T, E>),
}

/// Anything a reaction handler may return.
///
/// `Ok` fulfills and `Err` rejects (this is how a handler "raises"), while a
/// [`Deferred`] is adopted.
pub trait IntoSettle<T, E> {
    fn into_settle(self) -> Settle<T, E>;
}

impl<T, E> IntoSettle<T, E> for Settle<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        self
    }
}

impl<T, E> IntoSettle<T, E> for Result<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        match self {
            Ok(value) => Settle::Fulfill(value),
            Err(err) => Settle::Reject(err),
        }
    }
}

impl<T, E> IntoSettle<T, E> for Deferred<T, E> {
    fn into_settle(self) -> Settle<T, E> {
        Settle::Adopt(self)
    }
}

type OnFulfilled<T, U, E> = Box<dyn FnOnce(T) -> Settle<U, E> + Send>;
type OnRejected<U, E> = Box<dyn FnOnce(E) -> Settle<U, E> + Send>;

/// The `{ on_fulfilled, on_rejected }` pair attached by
/// [`Deferred::register`].
///
/// A side that is left out passes the original payload through untouched,
/// which is what lets a trailing [`catch`](Deferred::catch) observe a
/// rejection from further up the chain.
pub struct Callbacks<T, U, E> {
    on_fulfilled: OnFulfilled<T, U, E>,
    on_rejected: OnRejected<U, E>,
}

impl<T, U, E> Callbacks<T, U, E>
where
    T: 'static,
    U: 'static,
    E: 'static,
{
    pub fn new<F, R, SF, SR>(on_fulfilled: F, on_rejected: R) -> Self
    where
        F: FnOnce(T) -> SF + Send + 'static,
        R: FnOnce(E) -> SR + Send + 'static,
        SF: IntoSettle<U, E>,
        SR: IntoSettle<U, E>,
    {
        Self {
            on_fulfilled: Box::new(move |value| on_fulfilled(value).into_settle()),
            on_rejected: Box::new(move |err| on_rejected(err).into_settle()),
        }
    }

    /// Only a success handler; rejections pass through.
    pub fn on_fulfilled<F, S>(on_fulfilled: F) -> Self
    where
        F: FnOnce(T) -> S + Send + 'static,
        S: IntoSettle<U, E>,
    {
        Self {
            on_fulfilled: Box::new(move |value| on_fulfilled(value).into_settle()),
            on_rejected: Box::new(Settle::Reject),
        }
    }
}

impl<T, E> Callbacks<T, T, E>
where
    T: 'static,
    E: 'static,
{
    /// Only a failure handler; fulfillment passes through.
    pub fn on_rejected<R, S>(on_rejected: R) -> Self
    where
        R: FnOnce(E) -> S + Send + 'static,
        S: IntoSettle<T, E>,
    {
        Self {
            on_fulfilled: Box::new(Settle::Fulfill),
            on_rejected: Box::new(move |err| on_rejected(err).into_settle()),
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Attaches a callback pair and returns the deferred it settles.
    ///
    /// The matching handler runs on a microtask after this deferred settles,
    /// and whatever it returns settles the derived deferred.
    ///
    /// # Panics
    ///
    /// Handlers reject by returning `Err` or [`Settle::Reject`]. A handler
    /// that panics is not caught: the panic unwinds out of the
    /// [`EventLoop`](crate::EventLoop) call that ran the microtask, and the
    /// derived deferred stays pending.
    pub fn register<U>(&self, callbacks: Callbacks<T, U, E>) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
    {
        let (resolver, derived) = Deferred::pair(self.scheduler());
        let Callbacks {
            on_fulfilled,
            on_rejected,
        } = callbacks;
        self.subscribe(move |outcome| {
            let settle = match outcome {
                Ok(value) => on_fulfilled(value),
                Err(err) => on_rejected(err),
            };
            resolver.settle(settle);
        });
        derived
    }

    /// Chains a success handler.
    ///
    /// Panics in `on_fulfilled` behave as described on [`Deferred::register`].
    ///
    /// ```
    /// use deferred::{Deferred, EventLoop};
    ///
    /// let event_loop = EventLoop::new();
    /// let scheduler = event_loop.scheduler();
    /// let first = Deferred::<i32, String>::resolved(&scheduler, 1);
    /// let second = first.then(move |v| Deferred::resolved(&scheduler, v + 1));
    /// assert_eq!(event_loop.block_on(&second).unwrap(), Ok(2));
    /// ```
    pub fn then<U, F, S>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> S + Send + 'static,
        S: IntoSettle<U, E>,
    {
        self.register(Callbacks::on_fulfilled(on_fulfilled))
    }

    /// Chains a success handler and a failure handler in one step.
    pub fn then_or_else<U, F, R, SF, SR>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> SF + Send + 'static,
        R: FnOnce(E) -> SR + Send + 'static,
        SF: IntoSettle<U, E>,
        SR: IntoSettle<U, E>,
    {
        self.register(Callbacks::new(on_fulfilled, on_rejected))
    }

    /// Chains a failure handler. Same as `register` with only `on_rejected`.
    pub fn catch<R, S>(&self, on_rejected: R) -> Deferred<T, E>
    where
        R: FnOnce(E) -> S + Send + 'static,
        S: IntoSettle<T, E>,
    {
        self.register(Callbacks::on_rejected(on_rejected))
    }

    /// `then` for handlers that always produce a plain value.
    pub fn map<U, F>(&self, f: F) -> Deferred<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Settle::Fulfill(f(value)))
    }

    /// Runs `f` once this deferred settles either way, then passes the
    /// original outcome on.
    pub fn finally<F>(&self, f: F) -> Deferred<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        let (resolver, derived) = Deferred::pair(self.scheduler());
        self.subscribe(move |outcome| {
            f();
            resolver.settle(outcome);
        });
        derived
    }
}
