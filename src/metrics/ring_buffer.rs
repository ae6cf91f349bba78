// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::VecDeque;

use serde::Serialize;

/// Identifies one logical consumer of a ring buffer.
///
/// Every consumer owns an independent cursor, so draining through one
/// reader never changes what another reader sees next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReaderId(usize);

impl ReaderId {
    /// The live chart refresher.
    pub const DISPLAY: ReaderId = ReaderId(0);
    /// The flat-file logger.
    pub const LOGGER: ReaderId = ReaderId(1);
    /// Number of readers every buffer tracks.
    pub const COUNT: usize = 2;

    pub const ALL: [ReaderId; ReaderId::COUNT] = [ReaderId::DISPLAY, ReaderId::LOGGER];

    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity FIFO that evicts the oldest element on overflow.
///
/// Cursors count how many resident elements a reader has consumed. An
/// eviction shifts every cursor down by one (clamped at zero), so a cursor
/// always stays within `[0, len]`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    cursors: [usize; ReaderId::COUNT],
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            cursors: [0; ReaderId::COUNT],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a value, evicting the oldest element when full.
    pub fn put(&mut self, value: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
            for cursor in self.cursors.iter_mut() {
                *cursor = cursor.saturating_sub(1);
            }
        }
        self.items.push_back(value);
    }

    /// Return everything written since this reader's last flush and move
    /// its cursor to the end.
    pub fn flush_since_last_read(&mut self, reader: ReaderId) -> Vec<T> {
        let cursor = self.cursors[reader.index()];
        let fresh: Vec<T> = self.items.iter().skip(cursor).cloned().collect();
        self.cursors[reader.index()] = self.items.len();
        fresh
    }

    /// All resident elements, oldest first. No cursor moves.
    pub fn snapshot_all(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Rewind the reader so its next flush returns the full buffer.
    pub fn reset_cursor(&mut self, reader: ReaderId) {
        self.cursors[reader.index()] = 0;
    }

    /// Mark everything currently resident as consumed by this reader.
    pub fn mark_read(&mut self, reader: ReaderId) {
        self.cursors[reader.index()] = self.items.len();
    }

    pub fn has_new_data(&self, reader: ReaderId) -> bool {
        self.cursors[reader.index()] < self.items.len()
    }

    pub fn cursor(&self, reader: ReaderId) -> usize {
        self.cursors[reader.index()]
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Drop every element and rewind all readers.
    pub fn clear(&mut self) {
        self.items.clear();
        self.cursors = [0; ReaderId::COUNT];
    }
}
