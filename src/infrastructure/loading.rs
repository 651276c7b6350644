use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

/// Counts outstanding lookups and publishes whether any are in flight.
///
/// Each lookup holds a [`LoadingGuard`]; dropping it, including when the
/// lookup future is cancelled, releases the slot.
#[derive(Debug, Clone)]
pub struct LoadingTracker {
    outstanding: Arc<AtomicUsize>,
    sender: Arc<watch::Sender<bool>>,
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            outstanding: Arc::new(AtomicUsize::new(0)),
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) > 0
    }

    pub fn begin(&self) -> LoadingGuard {
        if self.outstanding.fetch_add(1, Ordering::SeqCst) == 0 {
            self.sender.send_replace(true);
        }
        LoadingGuard {
            tracker: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct LoadingGuard {
    tracker: LoadingTracker,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.tracker.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.sender.send_replace(false);
        }
    }
}
