//! Fixed-capacity histories.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ordered sequence that never holds more than `cap` entries; the oldest
/// entry is dropped on overflow.
///
/// `NewestFirst` histories iterate most-recent-first (the event log);
/// `OldestFirst` histories iterate in arrival order (the revenue log).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundedHistory<T> {
    #[serde(skip)]
    cap: usize,
    #[serde(skip)]
    order: HistoryOrder,
    items: VecDeque<T>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

impl<T> BoundedHistory<T> {
    /// `cap` is raised to 1 if zero.
    pub fn new(cap: usize, order: HistoryOrder) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            order,
            items: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, item: T) {
        match self.order {
            HistoryOrder::OldestFirst => {
                if self.items.len() == self.cap {
                    self.items.pop_front();
                }
                self.items.push_back(item);
            }
            HistoryOrder::NewestFirst => {
                if self.items.len() == self.cap {
                    self.items.pop_back();
                }
                self.items.push_front(item);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        match self.order {
            HistoryOrder::OldestFirst => self.items.back(),
            HistoryOrder::NewestFirst => self.items.front(),
        }
    }
}
