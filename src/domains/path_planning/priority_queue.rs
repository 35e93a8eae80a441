//! Indexed binary min-heap shared by the graph and grid planners.
//!
//! Each key is present at most once; pushing a key again with a lower priority
//! moves it up in place. Equal priorities pop in insertion order so searches are
//! reproducible run to run.

use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Entry<K> {
    priority: OrderedFloat<f64>,
    seq: u64,
    key: K,
}

impl<K> Entry<K> {
    fn rank(&self) -> (OrderedFloat<f64>, u64) {
        (self.priority, self.seq)
    }
}

#[derive(Debug, Clone)]
pub struct IndexedPriorityQueue<K: Hash + Eq + Clone> {
    heap: Vec<Entry<K>>,
    positions: HashMap<K, usize>,
    next_seq: u64,
}

impl<K: Hash + Eq + Clone> Default for IndexedPriorityQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone> IndexedPriorityQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            positions: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    pub fn priority(&self, key: &K) -> Option<f64> {
        self.positions.get(key).map(|&i| self.heap[i].priority.0)
    }

    /// Insert `key`, or lower its priority if already queued.
    /// Returns false when the key was queued with an equal or lower priority.
    pub fn push_or_decrease(&mut self, key: K, priority: f64) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(&i) = self.positions.get(&key) {
            if OrderedFloat(priority) >= self.heap[i].priority {
                return false;
            }
            self.heap[i].priority = OrderedFloat(priority);
            self.heap[i].seq = seq;
            self.sift_up(i);
            return true;
        }
        let i = self.heap.len();
        self.positions.insert(key.clone(), i);
        self.heap.push(Entry { priority: OrderedFloat(priority), seq, key });
        self.sift_up(i);
        true
    }

    pub fn pop(&mut self) -> Option<(K, f64)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let entry = self.heap.pop()?;
        self.positions.remove(&entry.key);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some((entry.key, entry.priority.0))
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].key.clone(), a);
        self.positions.insert(self.heap[b].key.clone(), b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].rank() >= self.heap[parent].rank() {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < n && self.heap[left].rank() < self.heap[smallest].rank() {
                smallest = left;
            }
            if right < n && self.heap[right].rank() < self.heap[smallest].rank() {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }
}
