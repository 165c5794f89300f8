use std::fmt;

/// The three states a [`Deferred`](crate::Deferred) can be in.
///
/// `Pending` is the only non-terminal state. Once a deferred moves to
/// `Fulfilled` or `Rejected` it stays there with the same payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, State::Rejected(_))
    }

    /// The settled outcome, or `None` while pending.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value)),
            State::Rejected(err) => Some(Err(err)),
        }
    }
}

impl<T, E> From<Result<T, E>> for State<T, E> {
    fn from(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(value) => State::Fulfilled(value),
            Err(err) => State::Rejected(err),
        }
    }
}

impl<T, E> fmt::Display for State<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending => f.pad("pending"),
            State::Fulfilled(_) => f.pad("fulfilled"),
            State::Rejected(_) => f.pad("rejected"),
        }
    }
}
