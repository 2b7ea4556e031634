//! Progress reporting for long-running room operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bevy::log::info;

/// Receives progress of a batch operation. Called from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, completed: usize, total: usize, message: &str);
}

/// Writes progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, completed: usize, total: usize, message: &str) {
        info!("[{}/{}] {}", completed, total, message);
    }
}

/// Keeps the latest progress so another thread can display it.
#[derive(Debug, Default, Clone)]
pub struct SharedProgress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    message: Arc<Mutex<String>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn message(&self) -> String {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressReporter for SharedProgress {
    fn report(&self, completed: usize, total: usize, message: &str) {
        self.completed.store(completed, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message.to_string();
    }
}
