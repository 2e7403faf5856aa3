//! PredictiveQueue: pending pre-fetch candidates, deduplicated by text.

use std::collections::{HashSet, VecDeque};

use lexis_cache::key::normalize;

use crate::scoring::PredictionCandidate;

#[derive(Debug, Default)]
pub struct PredictiveQueue {
    items: VecDeque<PredictionCandidate>,
    queued: HashSet<String>,
}

impl PredictiveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the same normalized text is already queued.
    /// Returns whether the candidate was added.
    pub fn push(&mut self, mut candidate: PredictionCandidate) -> bool {
        candidate.text = normalize(&candidate.text);
        if candidate.text.is_empty() || !self.queued.insert(candidate.text.clone()) {
            return false;
        }
        self.items.push_back(candidate);
        true
    }

    pub fn pop(&mut self) -> Option<PredictionCandidate> {
        let candidate = self.items.pop_front()?;
        self.queued.remove(&candidate.text);
        Some(candidate)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.queued.clear();
    }
}
