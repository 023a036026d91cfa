//! Cooperative cancellation for detection work.
//!
//! A token is a shared flag plus an optional deadline. Long-running work polls [`CancelToken::check`]
//! and unwinds with [`Error::Cancelled`] once either trips, so a worker that gives up on a record
//! actually stops the computation instead of leaving it running in the background.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {

    /// A token that only trips when [`CancelToken::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {

        return Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {

        if self.flag.load(Ordering::Relaxed) {
            return true;
        }

        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    pub fn check(&self) -> Result<()> {

        match self.is_cancelled() {
            true => Err(Error::Cancelled),
            false => Ok(()),
        }
    }
}
