//! Bounded history of recent viewer inputs, used to detect repeated commands.

use std::collections::VecDeque;

const WINDOW_SIZE: usize = 5;

/// FIFO of the last [`WINDOW_SIZE`] normalized inputs. Counting keys on exact
/// text equality; near-duplicate phrasing is distinct.
#[derive(Debug, Default)]
pub struct RepetitionWindow {
    entries: VecDeque<String>,
}

impl RepetitionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times `normalized` already occurs in the window, then
    /// records it, evicting the oldest entry on overflow. The count reflects
    /// only prior occurrences, never the current one.
    pub fn record_and_count(&mut self, normalized: &str) -> usize {
        let prior = self.entries.iter().filter(|e| *e == normalized).count();
        self.entries.push_back(normalized.to_string());
        if self.entries.len() > WINDOW_SIZE {
            self.entries.pop_front();
        }
        prior
    }
}
