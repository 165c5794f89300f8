//! Settle-once deferred results.
//!
//! A [`Deferred`] is pending until its [`Resolver`] fulfills or rejects it,
//! and then keeps that outcome forever. Handlers attached with
//! [`then`](Deferred::then) and [`catch`](Deferred::catch) derive new
//! deferreds, and [`Deferred::all`] waits for a whole collection, failing
//! fast on the first rejection.
//!
//! Handlers never run on the caller's stack. Every deferred is bound to a
//! [`Scheduler`] and dispatches through its microtask queue, so nothing
//! happens until the host runs that queue. [`EventLoop`] is a deterministic
//! host with a virtual clock.
//!
//! # Examples
//!
//! ```
//! use deferred::{Deferred, EventLoop, State};
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let prom = Deferred::<&str, &str>::new(&scheduler, |resolver| {
//!     resolver.reject("Ohhh noooo!");
//!     Ok(())
//! });
//! let handled = prom
//!     .then(|resolved| Ok(format!("success: {resolved}")))
//!     .catch(|reason| Ok(format!("failure: {reason}")));
//!
//! event_loop.run_until_idle();
//! assert_eq!(handled.state(), State::Fulfilled("failure: Ohhh noooo!".to_string()));
//! ```
use thiserror::Error;

mod chain;
mod combinators;
mod deferred;
mod event_loop;
mod scheduler;
mod state;

pub use chain::{Callbacks, IntoSettle, Settle};
pub use deferred::{Deferred, Resolver};
pub use event_loop::{EventLoop, EventLoopConfig, Turn, DEFAULT_MICROTASK_BUDGET};
pub use scheduler::{Schedule, Scheduler, Task};
pub use state::State;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("deferred was already resolved")]
    AlreadySettled,
    #[error("a deferred cannot be resolved with itself")]
    SelfAdoption,
    #[error("event loop ran out of work before the deferred settled")]
    Stalled,
}
