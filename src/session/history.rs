use serde::Serialize;
use std::collections::VecDeque;

use crate::stream::EmotionReading;

/// Newest-first, bounded log of received classifications
#[derive(Debug, Clone, Serialize)]
pub struct EmotionHistory {
    current: Option<EmotionReading>,
    entries: VecDeque<EmotionReading>,
    #[serde(skip)]
    capacity: usize,
}

impl EmotionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            current: None,
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Make `reading` current and prepend it, evicting from the tail past capacity
    pub fn record(&mut self, reading: EmotionReading) {
        self.current = Some(reading.clone());
        self.entries.push_front(reading);
        self.entries.truncate(self.capacity);
    }

    /// Most recent classification, independent of history depth
    pub fn current(&self) -> Option<&EmotionReading> {
        self.current.as_ref()
    }

    /// Entries, newest first
    pub fn entries(&self) -> impl Iterator<Item = &EmotionReading> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
