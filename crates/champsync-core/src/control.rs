//! Run-level cancellation: an abort flag shared with every worker plus an
//! optional wall-clock deadline.
//!
//! Workers check the control before pulling work, the transport checks it from
//! its progress callback so an in-flight transfer stops promptly, and backoff
//! sleeps wake early when it fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct Inner {
    abort: AtomicBool,
    deadline: Option<Instant>,
    reason: Mutex<Option<String>>,
}

/// Cheap to clone; all clones observe the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    inner: Arc<Inner>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control that cancels itself once `limit` has elapsed from now.
    pub fn with_deadline(limit: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(Instant::now() + limit),
                ..Inner::default()
            }),
        }
    }

    /// Request cancellation (e.g. Ctrl-C).
    pub fn cancel(&self) {
        self.halt("cancelled");
    }

    /// Stop the run with a reason. The first reason wins.
    pub fn halt(&self, reason: impl Into<String>) {
        let mut slot = self.inner.reason.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(reason.into());
        }
        self.inner.abort.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.abort.load(Ordering::Acquire) {
            return true;
        }
        match self.inner.deadline {
            Some(d) => Instant::now() >= d,
            None => false,
        }
    }

    /// Why the run stopped, if it did.
    pub fn reason(&self) -> Option<String> {
        if let Some(r) = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Some(r);
        }
        self.is_cancelled().then(|| "deadline exceeded".to_string())
    }

    /// Sleep for `d`, waking early on cancellation. Returns false if cancelled.
    pub fn sleep(&self, d: Duration) -> bool {
        let end = Instant::now() + d;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= end {
                return true;
            }
            std::thread::sleep((end - now).min(SLEEP_SLICE));
        }
    }
}
