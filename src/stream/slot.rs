use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::warn;

/// Single-slot outbound buffer
///
/// Holds at most one serialized frame. Putting a frame while another is still
/// unsent replaces it; the replaced frame is counted as dropped. Streaming is
/// best-effort and loss-tolerant, so nothing ever queues behind a slow send.
#[derive(Debug, Default)]
pub struct FrameSlot {
    pending: Mutex<Option<String>>,
    notify: Notify,
    dropped: AtomicUsize,
    closed: AtomicBool,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message` for sending. Returns false if the slot is closed.
    pub fn put(&self, message: String) -> bool {
        if self.is_closed() {
            return false;
        }

        let replaced = self.pending().replace(message).is_some();
        if replaced {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }

        self.notify.notify_one();
        true
    }

    /// Take the pending frame, if any
    pub fn take(&self) -> Option<String> {
        self.pending().take()
    }

    /// Wait for the next frame; `None` once the slot is closed
    pub async fn next(&self) -> Option<String> {
        loop {
            if let Some(message) = self.take() {
                return Some(message);
            }
            if self.is_closed() {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Refuse further frames and discard the pending one
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(_unsent) = self.take() {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Frames replaced or discarded before they were sent
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    // The guarded value is a plain Option, so a poisoned lock is still usable
    fn pending(&self) -> MutexGuard<'_, Option<String>> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            warn!("Frame slot lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
