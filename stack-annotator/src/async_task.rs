use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::future::BoxFuture;

/// Result of a background job, polled once per frame from the UI thread.
pub enum Job<T> {
    Idle,
    Running(BoxFuture<'static, T>),
    Done(T),
}

impl<T> Default for Job<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> Job<T> {
    pub fn start(f: BoxFuture<'static, T>) -> Self {
        Self::Running(f)
    }

    pub fn is_running(&mut self) -> bool {
        self.poll();
        matches!(self, Job::Running(_))
    }

    /// Drives the job and returns its result once it is available
    pub fn poll(&mut self) -> Option<&mut T> {
        if let Job::Running(f) = self {
            let mut cx = Context::from_waker(std::task::Waker::noop());
            match Pin::new(f).poll(&mut cx) {
                Poll::Ready(r) => *self = Job::Done(r),
                Poll::Pending => return None,
            }
        }
        match self {
            Job::Done(r) => Some(r),
            Job::Idle | Job::Running(_) => None,
        }
    }

    /// Takes the result out, leaving the job idle
    pub fn take(&mut self) -> Option<T> {
        self.poll()?;
        match std::mem::take(self) {
            Job::Done(r) => Some(r),
            other => {
                *self = other;
                None
            }
        }
    }
}
