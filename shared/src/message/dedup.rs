//! 事件去重
//!
//! Servers and clients both see the same `event_id` more than once (a socket
//! joined to several rooms, a replay after reconnect). [`RecentIds`] keeps a
//! bounded window of ids already delivered.

use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Bounded set of recently delivered event ids, oldest evicted first
#[derive(Debug, Clone)]
pub struct RecentIds {
    order: VecDeque<Uuid>,
    ids: HashSet<Uuid>,
    capacity: usize,
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// `true` the first time an id is seen
    pub fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity
            && let Some(old) = self.order.pop_front()
        {
            self.ids.remove(&old);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_bounded() {
        let mut seen = RecentIds::new(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert!(seen.insert(a));
        assert!(!seen.insert(a));
        assert!(seen.insert(b));
        assert!(seen.insert(c));
        assert_eq!(seen.len(), 2);
        // a was evicted
        assert!(seen.insert(a));
        assert!(!seen.insert(c));
    }

    #[test]
    fn test_single_slot() {
        let mut seen = RecentIds::new(1);
        assert!(seen.is_empty());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(seen.insert(a));
        assert!(seen.insert(b));
        assert!(seen.insert(a));
        assert_eq!(seen.len(), 1);
    }
}
