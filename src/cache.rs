// Copyright 2019 Fullstop000 <fullstop1005@gmail.com>.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! A bounded, move-to-front LRU cache keyed by blob row id.
//!
//! `get` on a present key promotes it to most-recently-used. `insert` on a
//! present key replaces and promotes; on an absent key, once at capacity,
//! it evicts the least-recently-used entry first. Capacity `0` disables
//! the cache entirely: every insert is a no-op, every get misses.
//!
//! Implemented as a hash index over an arena of doubly-linked nodes (the
//! same O(1)-get/O(1)-insert shape as a typical intrusive LRU), rather
//! than pulling in the `lru` crate — this hand-rolls its own
//! `Cache`/`HandleRef` abstraction instead of depending on one, and this
//! format's cache is simple enough (single-threaded, `rid`-keyed) that a
//! dependency would only save a couple dozen lines.

use std::collections::HashMap;

struct Node {
    key: i64,
    value: Vec<u8>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// An LRU cache mapping blob row ids to reconstructed blob bytes.
pub struct LruCache {
    capacity: usize,
    nodes: Vec<Node>,
    index: HashMap<i64, usize>,
    head: Option<usize>, // most recently used
    tail: Option<usize>, // least recently used
    free: Vec<usize>,
}

impl LruCache {
    /// Builds a cache that holds at most `capacity` entries. `capacity ==
    /// 0` disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            nodes: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            free: Vec::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up `key`, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, key: i64) -> Option<&[u8]> {
        let idx = *self.index.get(&key)?;
        self.move_to_front(idx);
        Some(&self.nodes[idx].value)
    }

    /// Inserts or replaces `key`. When absent and at capacity, evicts the
    /// least-recently-used entry first. No-op when `capacity == 0`.
    pub fn insert(&mut self, key: i64, value: Vec<u8>) {
        if self.capacity == 0 {
            return;
        }
        if let Some(&idx) = self.index.get(&key) {
            self.nodes[idx].value = value;
            self.move_to_front(idx);
            return;
        }
        if self.index.len() >= self.capacity {
            self.evict_lru();
        }
        let idx = self.alloc_node(key, value);
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    pub fn contains(&self, key: i64) -> bool {
        self.index.contains_key(&key)
    }

    fn alloc_node(&mut self, key: i64, value: Vec<u8>) -> usize {
        let node = Node {
            key,
            value,
            prev: None,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn evict_lru(&mut self) {
        let Some(tail) = self.tail else { return };
        self.unlink(tail);
        let key = self.nodes[tail].key;
        self.index.remove(&key);
        self.nodes[tail].value = Vec::new();
        self.free.push(tail);
    }
}
