//! A one-shot future cell: *pending* until [`LocalFuture::set`], then
//! *ready* forever after. Callbacks registered before settlement fire once
//! settlement happens; callbacks registered after settlement fire inline,
//! on the registering thread.
//!
//! This is intentionally not `std::future::Future`; the host runtime this
//! crate's consumers target exposes its own future type with these exact
//! four operations (`probe`, `register_callback`, `set`, `get`), and
//! `reduce-task` is written against that narrower contract so it never has
//! to assume an async executor is present.

use std::fmt::{self, Debug, Formatter};

use parking_lot::Mutex;

use crate::error::SharedError;

/// The settled value of a [`SettableFuture`]: either the produced value, or
/// a failure that must poison anything reducing over it.
pub type Settled<T> = Result<T, SharedError>;

/// A callback fired exactly once, with a reference to the settled value.
pub type Callback<T> = Box<dyn FnOnce(&Settled<T>) + Send + 'static>;

/// The contract a `reduce-task` argument is built from: a one-shot cell
/// that starts `pending` and transitions to `ready(value)` exactly once.
pub trait SettableFuture<T>: Send + Sync {
    /// Non-blocking readiness check.
    fn probe(&self) -> bool;

    /// Queues `cb` to run when this future settles. If it has already
    /// settled, `cb` runs immediately, on the calling thread.
    ///
    /// Fires at most once, per the host-runtime contract this trait models.
    fn register_callback(&self, cb: Callback<T>);

    /// Returns the settled value. Callers must only call this after
    /// `probe()` has returned `true` (or from inside a callback).
    ///
    /// # Panics
    ///
    /// Panics if the future is still pending.
    fn get(&self) -> Settled<T>;
}

enum State<T: Clone> {
    Pending(Vec<Callback<T>>),
    Ready(Settled<T>),
}

/// A concrete, heap-allocated [`SettableFuture`] usable as a real return
/// value from task bodies in tests and doctests.
pub struct LocalFuture<T: Clone> {
    state: Mutex<State<T>>,
}

impl<T: Clone> Debug for LocalFuture<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let ready = matches!(&*self.state.lock(), State::Ready(_));
        f.debug_struct("LocalFuture").field("ready", &ready).finish()
    }
}

impl<T: Clone> Default for LocalFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LocalFuture<T> {
    /// Creates a new pending future.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending(Vec::new())),
        }
    }

    /// Creates a future that already carries the given error.
    #[must_use]
    pub fn failed(error: SharedError) -> Self {
        Self {
            state: Mutex::new(State::Ready(Err(error))),
        }
    }

    /// Settles this future with `value`, firing every registered callback
    /// on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if called more than once (a one-shot cell may only be set
    /// once, per the host-runtime contract).
    pub fn set(&self, value: Settled<T>) {
        let callbacks = {
            let mut state = self.state.lock();
            let State::Pending(callbacks) = std::mem::replace(&mut *state, State::Ready(value))
            else {
                panic!("LocalFuture::set called twice");
            };
            callbacks
        };
        let settled = self.get();
        for cb in callbacks {
            cb(&settled);
        }
    }
}

impl<T: Clone> SettableFuture<T> for LocalFuture<T> {
    fn probe(&self) -> bool {
        matches!(&*self.state.lock(), State::Ready(_))
    }

    fn register_callback(&self, cb: Callback<T>) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Pending(callbacks) => callbacks.push(cb),
            State::Ready(settled) => {
                let settled = settled.clone();
                drop(state);
                cb(&settled);
            }
        }
    }

    fn get(&self) -> Settled<T> {
        match &*self.state.lock() {
            State::Ready(settled) => settled.clone(),
            State::Pending(_) => panic!("LocalFuture::get called while still pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_registered_before_set_fires_after() {
        let fut = LocalFuture::new();
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&fired);
        fut.register_callback(Box::new(move |v: &Settled<i32>| {
            assert_eq!(v.as_ref().copied().ok(), Some(42));
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }));
        assert!(!fired.load(std::sync::atomic::Ordering::SeqCst));
        fut.set(Ok(42));
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn callback_registered_after_set_fires_inline() {
        let fut = LocalFuture::new();
        fut.set(Ok(7));
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&fired);
        fut.register_callback(Box::new(move |v: &Settled<i32>| {
            assert_eq!(v.as_ref().copied().ok(), Some(7));
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }));
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn probe_reflects_settlement() {
        let fut = LocalFuture::new();
        assert!(!fut.probe());
        fut.set(Ok(1));
        assert!(fut.probe());
        assert_eq!(fut.get().ok(), Some(1));
    }

    #[test]
    #[should_panic(expected = "called twice")]
    fn set_twice_panics() {
        let fut = LocalFuture::new();
        fut.set(Ok(1));
        fut.set(Ok(2));
    }
}
