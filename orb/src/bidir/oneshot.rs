use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll, Waker},
};

use crate::error::{OrbError, OrbResult};

/// Single-value slot a pending request waits on. Dropping the sender without
/// sending resolves the receiver with [`OrbError::ConnectionLost`].
pub(crate) fn oneshot<T>() -> (OneshotSender<T>, OneshotReceiver<T>) {
    let inner = Arc::new(Mutex::new(OneshotInner {
        data: None,
        waker: None,
        has_sender: true,
    }));
    (
        OneshotSender {
            inner: inner.clone(),
        },
        OneshotReceiver { inner },
    )
}

struct OneshotInner<T> {
    data: Option<T>,
    waker: Option<Waker>,
    has_sender: bool,
}

fn lock<T>(inner: &Mutex<OneshotInner<T>>) -> MutexGuard<'_, OneshotInner<T>> {
    // The slot holds plain data, a panic while it was locked leaves it usable
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct OneshotSender<T> {
    inner: Arc<Mutex<OneshotInner<T>>>,
}

impl<T> OneshotSender<T> {
    pub(crate) fn send(self, value: T) {
        let mut inner_lock = lock(&self.inner);
        inner_lock.data.replace(value);
        if let Some(w) = inner_lock.waker.take() {
            w.wake()
        }
    }
}

impl<T> Drop for OneshotSender<T> {
    fn drop(&mut self) {
        let mut inner_lock = lock(&self.inner);
        inner_lock.has_sender = false;
        // Wake the waiting task so it learns no value will come
        if let Some(w) = inner_lock.waker.take() {
            w.wake()
        }
    }
}

pub(crate) struct OneshotReceiver<T> {
    inner: Arc<Mutex<OneshotInner<T>>>,
}

impl<T> Future for OneshotReceiver<T> {
    type Output = OrbResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner_lock = lock(&self.inner);
        match inner_lock.data.take() {
            Some(value) => Poll::Ready(Ok(value)),
            None if !inner_lock.has_sender => Poll::Ready(Err(OrbError::ConnectionLost)),
            None => {
                inner_lock.waker.replace(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
