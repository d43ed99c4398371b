//! All the ways a list changes shape: end pushes and pops, positioned
//! inserts (with node splitting and the merge pass that follows), single and
//! ranged deletes, rotation, and whole-block ingestion.

use smallvec::SmallVec;

use packblock::{PackBlock, PackCursor, PackValue};

use crate::{End, Entry, NodeIdx, PackList, Popped};

impl PackList {
    /// Add an entry at the head. Goes into the head node if it has room
    /// under `fill`, otherwise a fresh node is spliced in front.
    pub fn push_head(&mut self, fill: usize, value: &[u8]) {
        if self.head.exists() && self[self.head].count < fill {
            let head = self.head;
            self[head].block.push_head(value);
        } else {
            let mut block = PackBlock::new();
            block.push_head(value);
            let new = self.alloc_node(block, 0);
            let head = self.head;
            self.insert_node(head, new, false);
        }
        self.count += 1;
        let head = self.head;
        self[head].count += 1;
    }

    /// Add an entry at the tail. Mirror image of [`PackList::push_head`].
    pub fn push_tail(&mut self, fill: usize, value: &[u8]) {
        if self.tail.exists() && self[self.tail].count < fill {
            let tail = self.tail;
            self[tail].block.push_tail(value);
        } else {
            let mut block = PackBlock::new();
            block.push_tail(value);
            let new = self.alloc_node(block, 0);
            let tail = self.tail;
            self.insert_node(tail, new, true);
        }
        self.count += 1;
        let tail = self.tail;
        self[tail].count += 1;
    }

    pub fn push(&mut self, fill: usize, value: &[u8], end: End) {
        match end {
            End::Head => self.push_head(fill, value),
            End::Tail => self.push_tail(fill, value),
        }
    }

    /// Adopt a pre-built block wholesale as a new tail node. The block's own
    /// entry count is authoritative; its contents are not re-packed. This is
    /// the restore path for blocks that were persisted elsewhere.
    pub fn push_tail_block(&mut self, block: PackBlock) {
        debug_assert!(!block.is_empty());
        let count = block.len();
        let new = self.alloc_node(block, count);
        let tail = self.tail;
        self.insert_node(tail, new, true);
        self.count += count;
    }

    /// Remove and return the entry at `end`. Byte-string entries are passed
    /// through `saver`; integer entries come back as [`Popped::Int`] without
    /// touching it.
    pub fn pop_with<T>(&mut self, end: End, saver: impl FnOnce(&[u8]) -> T) -> Option<Popped<T>> {
        if self.count == 0 {
            return None;
        }
        let (node, pos) = match end {
            End::Head => (self.head, 0),
            End::Tail => (self.tail, -1),
        };
        let cursor = self[node].block.index(pos).unwrap();
        let popped = match self[node].block.get(cursor) {
            PackValue::Bytes(b) => Popped::Bytes(saver(b)),
            PackValue::Int(v) => Popped::Int(v),
        };
        self.del_index(node, cursor);
        Some(popped)
    }

    /// [`PackList::pop_with`] with a plain copying saver.
    pub fn pop(&mut self, end: End) -> Option<Popped<Vec<u8>>> {
        self.pop_with(end, |bytes| bytes.to_vec())
    }

    /// Move the tail entry to the head. A no-op on lists of one entry or
    /// fewer.
    pub fn rotate(&mut self, fill: usize) {
        if self.count <= 1 {
            return;
        }

        // Copy the tail value out before pushing: with a single node the
        // push lands in the same block the value lives in.
        let tail = self.tail;
        let cursor = self[tail].block.index(-1).unwrap();
        let value: SmallVec<[u8; 32]> = match self[tail].block.get(cursor) {
            PackValue::Bytes(b) => SmallVec::from_slice(b),
            // Integers travel between blocks as decimal text; the codec
            // re-qualifies them on insert.
            PackValue::Int(v) => v.to_string().into_bytes().into(),
        };

        self.push_head(fill, &value);

        // The original tail entry is still the last entry of its node, even
        // when the push above landed at the head of the same block.
        let cursor = self[tail].block.index(-1).unwrap();
        self.del_index(tail, cursor);
    }

    /// Delete one entry. Decrements the cached counts, and unlinks the node
    /// if this was its last entry. Returns (node was freed, cursor
    /// re-anchored at the successor).
    pub(crate) fn del_index(
        &mut self,
        node: NodeIdx,
        cursor: PackCursor,
    ) -> (bool, Option<PackCursor>) {
        let updated = self[node].block.delete(cursor);
        self[node].count -= 1;
        self.count -= 1;
        let gone = self[node].count == 0;
        if gone {
            self.del_node(node);
        }
        (gone, updated)
    }

    /// Replace the entry at `idx` with `value`. Returns false (and changes
    /// nothing) when `idx` is out of range.
    pub fn replace_at_index(&mut self, idx: i64, value: &[u8]) -> bool {
        let Some(entry) = self.index(idx) else {
            return false;
        };
        let node = entry.node;
        // The delete relocates the cursor; the insert must use the relocated
        // one, not the entry's snapshot.
        match self[node].block.delete(entry.cursor) {
            Some(cursor) => self[node].block.insert_before(cursor, value),
            None => self[node].block.push_tail(value),
        }
        true
    }

    /// Insert `value` before the positioned `entry`. `entry` must come from
    /// [`PackList::index`] on the list's current state; pass `None` only
    /// when the list was empty at lookup time.
    pub fn insert_before(&mut self, fill: usize, entry: Option<&Entry>, value: &[u8]) {
        self.insert_entry(fill, entry, value, false);
    }

    /// Insert `value` after the positioned `entry`. See
    /// [`PackList::insert_before`].
    pub fn insert_after(&mut self, fill: usize, entry: Option<&Entry>, value: &[u8]) {
        self.insert_entry(fill, entry, value, true);
    }

    fn insert_entry(&mut self, fill: usize, entry: Option<&Entry>, value: &[u8], after: bool) {
        let Some(entry) = entry else {
            // No anchor: the list was empty, so build the only node.
            debug_assert!(self.is_empty());
            let mut block = PackBlock::new();
            block.push_head(value);
            let new = self.alloc_node(block, 1);
            self.insert_node(NodeIdx::NONE, new, after);
            self.count += 1;
            return;
        };

        let node = entry.node;
        let full = self[node].count >= fill;
        let at_tail = after && self[node].block.next(entry.cursor).is_none();
        let at_head = !after && self[node].block.prev(entry.cursor).is_none();
        let node_next = self[node].next;
        let node_prev = self[node].prev;
        let full_next = node_next.exists() && self[node_next].count >= fill;
        let full_prev = node_prev.exists() && self[node_prev].count >= fill;

        if !full && after {
            match self[node].block.next(entry.cursor) {
                Some(next) => self[node].block.insert_before(next, value),
                None => self[node].block.push_tail(value),
            }
            self[node].count += 1;
        } else if !full {
            self[node].block.insert_before(entry.cursor, value);
            self[node].count += 1;
        } else if at_tail && node_next.exists() && !full_next {
            // Tail of a full node, and the next node has room: spill over.
            self[node_next].block.push_head(value);
            self[node_next].count += 1;
        } else if at_head && node_prev.exists() && !full_prev {
            self[node_prev].block.push_tail(value);
            self[node_prev].count += 1;
        } else if (at_tail && node_next.exists() && full_next)
            || (at_head && node_prev.exists() && full_prev)
        {
            // Boxed in between two full nodes: splice in a fresh singleton.
            let mut block = PackBlock::new();
            block.push_head(value);
            let new = self.alloc_node(block, 1);
            self.insert_node(node, new, after);
        } else {
            // Full and mid-block. Split at the entry, push into the detached
            // side, then let the merge pass knit small neighbors together.
            let new = self.split_node(node, entry.offset, after);
            if after {
                self[new].block.push_head(value);
            } else {
                self[new].block.push_tail(value);
            }
            self[new].count += 1;
            self.insert_node(node, new, after);
            self.merge_pass(fill, node);
        }

        self.count += 1;
    }

    /// Split `node` at `offset`. With `after`, the detached node receives
    /// the entries past `offset`; without, the entries before it. The new
    /// node is returned unlinked - the caller splices it in.
    pub(crate) fn split_node(&mut self, node: NodeIdx, offset: i64, after: bool) -> NodeIdx {
        // Entries found by a tail walk carry negative offsets; the range
        // maths below wants the head-relative equivalent.
        let offset = if offset < 0 {
            offset + self[node].count as i64
        } else {
            offset
        };

        let new_block = self[node].block.clone();
        let new = self.alloc_node(new_block, 0);

        // A -1 extent means "through the end of the block".
        let (orig_start, orig_extent) = if after { (offset + 1, -1) } else { (0, offset) };
        let (new_start, new_extent) = if after { (0, offset + 1) } else { (offset, -1) };

        self[node].block.delete_range(orig_start, orig_extent);
        self[node].count = self[node].block.len();

        self[new].block.delete_range(new_start, new_extent);
        self[new].count = self[new].block.len();

        new
    }

    /// Merge two adjacent nodes (`a` directly left of `b`) if neither is
    /// empty. Entries move one at a time into whichever node started with
    /// more of them (ties favor `b`); the emptied node is unlinked. Returns
    /// the surviving node, or `None` when the merge was skipped.
    fn merge_blocks(&mut self, a: NodeIdx, b: NodeIdx) -> Option<NodeIdx> {
        if self[a].count == 0 || self[b].count == 0 {
            return None;
        }
        let target = if self[a].count > self[b].count { a } else { b };
        let (loser, into_tail) = if target == a { (b, true) } else { (a, false) };

        let loser_count = self[loser].count;
        let loser_block = std::mem::take(&mut self[loser].block);

        // Left target: append the right block front to back. Right target:
        // prepend the left block back to front.
        let mut cursor = loser_block.index(if into_tail { 0 } else { -1 });
        while let Some(c) = cursor {
            let text;
            let bytes: &[u8] = match loser_block.get(c) {
                PackValue::Bytes(b) => b,
                PackValue::Int(v) => {
                    text = v.to_string();
                    text.as_bytes()
                }
            };
            if into_tail {
                self[target].block.push_tail(bytes);
                cursor = loser_block.next(c);
            } else {
                self[target].block.push_head(bytes);
                cursor = loser_block.prev(c);
            }
        }

        self[target].count += loser_count;
        self[loser].count = 0;
        self.del_node(loser);
        Some(target)
    }

    /// After a split leaves small nodes around `center`, try four pairwise
    /// merges (each gated by the combined count fitting under `fill`):
    /// the two nodes left of center, the two right of it, center into its
    /// left neighbor, and that survivor into its right neighbor.
    pub(crate) fn merge_pass(&mut self, fill: usize, center: NodeIdx) {
        let prev = self[center].prev;
        let prev_prev = if prev.exists() { self[prev].prev } else { NodeIdx::NONE };
        let next = self[center].next;
        let next_next = if next.exists() { self[next].next } else { NodeIdx::NONE };

        if prev.exists() && prev_prev.exists() && self[prev].count + self[prev_prev].count <= fill
        {
            self.merge_blocks(prev_prev, prev);
            // prev / prev_prev are stale from here on; later steps re-read
            // the links they need.
        }

        if next.exists() && next_next.exists() && self[next].count + self[next_next].count <= fill
        {
            self.merge_blocks(next, next_next);
        }

        let center_prev = self[center].prev;
        let mut survivor = NodeIdx::NONE;
        if center_prev.exists() && self[center].count + self[center_prev].count <= fill {
            survivor = self.merge_blocks(center_prev, center).unwrap_or(NodeIdx::NONE);
        }

        if survivor.exists() {
            let right = self[survivor].next;
            if right.exists() && self[survivor].count + self[right].count <= fill {
                self.merge_blocks(survivor, right);
            }
        }
    }

    /// Delete `count` entries starting at `start` (negative `start` counts
    /// from the tail and deletes toward the end, at most `|start|` entries).
    /// Returns whether anything was deleted.
    pub fn del_range(&mut self, start: i64, count: i64) -> bool {
        if count <= 0 {
            return false;
        }

        let mut extent = count;
        if start >= 0 {
            // Cap to what actually exists past `start`.
            extent = extent.min(self.count as i64 - start);
        } else {
            // A tail-relative start can reach at most |start| entries.
            extent = extent.min(-start);
        }

        let Some(entry) = self.index(start) else {
            return false;
        };

        let mut node = entry.node;
        let mut offset = entry.offset;
        while extent > 0 {
            debug_assert!(node.exists());
            let next = self[node].next;
            let node_count = self[node].count as i64;

            let del;
            if offset == 0 && extent >= node_count {
                // The whole node goes; no block surgery needed.
                del = node_count;
                self.del_node(node);
            } else {
                if offset >= 0 && extent + offset >= node_count {
                    // The deletion runs past this node: take its tail slice.
                    del = node_count - offset;
                } else if offset < 0 {
                    // First iteration of a tail-relative start; |offset| is
                    // the distance from here to the end of this node.
                    del = (-offset).min(extent);
                } else {
                    del = extent;
                }
                self[node].block.delete_range(offset, del);
                self[node].count -= del as usize;
                self.count -= del as usize;
                if self[node].count == 0 {
                    self.del_node(node);
                }
            }

            extent -= del;
            node = next;
            offset = 0;
        }
        true
    }
}
