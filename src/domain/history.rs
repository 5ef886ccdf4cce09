//! Bounded per-symbol bar history.

use std::collections::VecDeque;

use super::ohlcv::Bar;

/// Insertion-ordered ring of the most recent bars for one symbol.
///
/// Holds at most `capacity` bars; pushing onto a full history evicts the
/// oldest bar first.
#[derive(Debug, Clone)]
pub struct SymbolHistory {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl SymbolHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        SymbolHistory {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a bar, returning the evicted one if the history was full.
    pub fn push(&mut self, bar: Bar) -> Option<Bar> {
        let evicted = if self.bars.len() == self.capacity {
            self.bars.pop_front()
        } else {
            None
        };
        self.bars.push_back(bar);
        evicted
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn oldest(&self) -> Option<&Bar> {
        self.bars.front()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Bar> + ExactSizeIterator {
        self.bars.iter()
    }

    /// Contiguous copy of the history, oldest first.
    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().cloned().collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn typical_prices(&self) -> Vec<f64> {
        self.bars.iter().map(Bar::typical_price).collect()
    }
}
