//! Single-shot completion channel for in-flight operations.
//!
//! Every queued operation gets one [`Resolver`]/[`Completion`] pair: the
//! connection resolves, the caller observes. The channel is single-threaded
//! (`Rc<RefCell>`); a [`Completion`] can be polled as a `Future` from a
//! local executor or drained synchronously with [`Completion::try_take`]
//! after driving the connection.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{Error, Result};

#[derive(Debug)]
struct Inner<T> {
    value: Option<Result<T>>,
    waker: Option<Waker>,
}

/// Producer half. Consumed on resolution; dropping it unresolved fails the
/// completion with [`Error::ConnectionBroken`] so callers never hang.
pub struct Resolver<T> {
    inner: Option<Rc<RefCell<Inner<T>>>>,
}

/// Consumer half.
#[derive(Debug)]
pub struct Completion<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

/// Create a connected resolver/completion pair.
pub fn channel<T>() -> (Resolver<T>, Completion<T>) {
    let inner = Rc::new(RefCell::new(Inner {
        value: None,
        waker: None,
    }));
    (
        Resolver {
            inner: Some(Rc::clone(&inner)),
        },
        Completion { inner },
    )
}

impl<T> Resolver<T> {
    /// Resolve the completion. Consumes the resolver, so each operation
    /// resolves exactly once.
    pub fn resolve(mut self, value: Result<T>) {
        if let Some(inner) = self.inner.take() {
            Self::settle(&inner, value);
        }
    }

    fn settle(inner: &RefCell<Inner<T>>, value: Result<T>) {
        let waker = {
            let mut inner = inner.borrow_mut();
            inner.value = Some(value);
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            Self::settle(&inner, Err(Error::ConnectionBroken));
        }
    }
}

impl<T> Completion<T> {
    /// Take the result if already resolved.
    pub fn try_take(&self) -> Option<Result<T>> {
        self.inner.borrow_mut().value.take()
    }

    /// Whether a result is waiting (without taking it).
    pub fn is_resolved(&self) -> bool {
        self.inner.borrow().value.is_some()
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match inner.value.take() {
            Some(value) => Poll::Ready(value),
            None => {
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
