//! Positional lookup. An index walk skips whole nodes using their cached
//! entry counts, then asks the target node's block for a cursor.

use crate::{Entry, PackList};

impl PackList {
    /// Find the entry at `idx`: 0 is the head entry, -1 the tail entry.
    /// Returns `None` when the magnitude is out of range.
    ///
    /// A non-negative `idx` walks from the head and produces a non-negative
    /// in-block offset; a negative one walks from the tail and produces a
    /// negative offset. Downstream ops (insert, range delete) understand
    /// both forms.
    pub fn index(&self, idx: i64) -> Option<Entry> {
        let forward = idx >= 0;
        let target = if forward {
            idx as u64
        } else {
            idx.unsigned_abs() - 1
        };
        if target >= self.count as u64 {
            return None;
        }

        let mut n = if forward { self.head } else { self.tail };
        let mut accum: u64 = 0;
        while n.exists() {
            let node_count = self[n].count as u64;
            if accum + node_count > target {
                break;
            }
            accum += node_count;
            n = if forward { self[n].next } else { self[n].prev };
        }
        if !n.exists() {
            return None;
        }

        let offset = if forward {
            (target - accum) as i64
        } else {
            // Count backwards from the end of this node; -1 is its last
            // entry.
            -((target - accum) as i64) - 1
        };

        let cursor = self[n].block.index(offset).unwrap();
        Some(Entry {
            node: n,
            cursor,
            offset,
            value: self[n].block.get(cursor).into(),
        })
    }

    /// Entry-vs-bytes equality, straight through to the codec (integer
    /// entries compare numerically against decimal probes).
    pub fn compare(&self, entry: &Entry, other: &[u8]) -> bool {
        self[entry.node].block.compare(entry.cursor, other)
    }
}
