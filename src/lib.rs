//! A packed list is a flat positional sequence stored as a doubly linked
//! list of packed blocks ([`packblock::PackBlock`]), each holding up to
//! `fill` small entries in one contiguous serialized buffer. Compared to a
//! linked list of boxed values this trades some per-operation CPU for a much
//! smaller per-entry memory footprint.
//!
//! Nodes live in a `Vec` arena and reference each other by index rather than
//! by pointer. This performs at least as well as a pointer-chased list (runs
//! of nodes stay cache resident), and it means the whole structure works
//! without `unsafe`.
//!
//! The fill factor is passed to each mutating call rather than stored. It
//! only gates *new* placement decisions - shrinking `fill` between calls
//! never triggers retroactive compaction.
//!
//! ```rust
//! use packlist::{PackList, End, Direction};
//!
//! let mut list = PackList::new();
//! list.push_tail(32, b"first");
//! list.push(32, b"second", End::Tail);
//! list.push_head(32, b"zeroth");
//!
//! let entry = list.index(-2).unwrap();
//! assert_eq!(entry.value.as_bytes(), Some(&b"first"[..]));
//!
//! let values: Vec<_> = list.iter_mut(Direction::Forward)
//!     .map(|e| e.value)
//!     .collect();
//! assert_eq!(values.len(), 3);
//! ```

use std::ops::{Index, IndexMut};

use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use packblock::{PackBlock, PackCursor, PackValue};

pub use iter::Iter;

mod debug;
mod index;
mod iter;
mod mutations;

/// Which end of the list an operation applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

/// Traversal direction for iterators.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Head to tail.
    Forward,
    /// Tail to head.
    Reverse,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct NodeIdx(usize);

impl Default for NodeIdx {
    fn default() -> Self { Self::NONE }
}

impl NodeIdx {
    pub(crate) const NONE: NodeIdx = NodeIdx(usize::MAX);

    pub(crate) fn exists(self) -> bool { self.0 != usize::MAX }
}

/// One arena slot: a packed block plus its chain links. `count` mirrors
/// `block.len()` so positional walks can skip whole nodes without touching
/// the block.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub(crate) block: PackBlock,
    pub(crate) count: usize,
    pub(crate) prev: NodeIdx,
    pub(crate) next: NodeIdx,
}

/// The list container. See the crate docs for the layout.
///
/// Freed arena slots are kept on an internal pool (chained through `next`)
/// and reused by later node allocations, so node indexes stay stable for the
/// lifetime of the node they name.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default)]
pub struct PackList {
    nodes: Vec<Node>,
    free_head: NodeIdx,

    head: NodeIdx,
    tail: NodeIdx,
    /// Number of linked nodes (pool slots excluded).
    num_nodes: usize,
    /// Total entries across all linked nodes.
    count: usize,
}

/// A decoded entry value. Owned - an `Entry` stays usable after the list
/// moves on underneath it (though its *position* does not, see [`Entry`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Bytes(SmallVec<[u8; 32]>),
    Int(i64),
}

impl EntryValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EntryValue::Bytes(b) => Some(b),
            EntryValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            EntryValue::Int(v) => Some(*v),
            EntryValue::Bytes(_) => None,
        }
    }
}

impl From<PackValue<'_>> for EntryValue {
    fn from(value: PackValue<'_>) -> Self {
        match value {
            PackValue::Bytes(b) => EntryValue::Bytes(SmallVec::from_slice(b)),
            PackValue::Int(v) => EntryValue::Int(v),
        }
    }
}

/// A positioned entry, produced by [`PackList::index`] and by iteration.
///
/// The position (node + in-block cursor + offset) is a snapshot. Any list
/// mutation other than the documented iterator deletion protocol invalidates
/// it; using a stale entry with [`PackList::insert_before`] and friends is
/// not detected and yields unspecified (but memory safe) list contents.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) node: NodeIdx,
    pub(crate) cursor: PackCursor,
    /// Offset of this entry inside its node. Non-negative when found by a
    /// forward walk, negative (-1 = last) when found walking from the tail.
    pub offset: i64,
    pub value: EntryValue,
}

/// What [`PackList::pop`] hands back. `Bytes` carries whatever the saver
/// returned; integer entries skip the saver entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped<T> {
    Bytes(T),
    Int(i64),
}

impl Index<NodeIdx> for PackList {
    type Output = Node;

    fn index(&self, index: NodeIdx) -> &Node {
        &self.nodes[index.0]
    }
}

impl IndexMut<NodeIdx> for PackList {
    fn index_mut(&mut self, index: NodeIdx) -> &mut Node {
        &mut self.nodes[index.0]
    }
}

impl PackList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of linked nodes.
    pub fn node_count(&self) -> usize {
        self.num_nodes
    }

    /// Grab a slot from the free pool, or grow the arena.
    pub(crate) fn alloc_node(&mut self, block: PackBlock, count: usize) -> NodeIdx {
        if self.free_head.exists() {
            let idx = self.free_head;
            self.free_head = self[idx].next;
            let node = &mut self[idx];
            node.block = block;
            node.count = count;
            node.prev = NodeIdx::NONE;
            node.next = NodeIdx::NONE;
            idx
        } else {
            self.nodes.push(Node {
                block,
                count,
                prev: NodeIdx::NONE,
                next: NodeIdx::NONE,
            });
            NodeIdx(self.nodes.len() - 1)
        }
    }

    fn free_node(&mut self, idx: NodeIdx) {
        let free_head = self.free_head;
        let node = &mut self[idx];
        node.block = PackBlock::new();
        node.count = 0;
        node.prev = NodeIdx::NONE;
        node.next = free_head;
        self.free_head = idx;
    }

    /// Splice `new` into the chain after (`after == true`) or before
    /// `old`. `old` may be `NONE` only when the list is empty.
    pub(crate) fn insert_node(&mut self, old: NodeIdx, new: NodeIdx, after: bool) {
        if after {
            self[new].prev = old;
            if old.exists() {
                let old_next = self[old].next;
                self[new].next = old_next;
                if old_next.exists() {
                    self[old_next].prev = new;
                }
                self[old].next = new;
            }
            if self.tail == old {
                self.tail = new;
            }
        } else {
            self[new].next = old;
            if old.exists() {
                let old_prev = self[old].prev;
                self[new].prev = old_prev;
                if old_prev.exists() {
                    self[old_prev].next = new;
                }
                self[old].prev = new;
            }
            if self.head == old {
                self.head = new;
            }
        }
        // First node of the list becomes both ends.
        if self.num_nodes == 0 {
            self.head = new;
            self.tail = new;
        }
        self.num_nodes += 1;
    }

    /// Unlink `node`, subtract its entries from the cached total and return
    /// its slot to the pool.
    pub(crate) fn del_node(&mut self, node: NodeIdx) {
        let (prev, next, count) = (self[node].prev, self[node].next, self[node].count);
        if next.exists() {
            self[next].prev = prev;
        }
        if prev.exists() {
            self[prev].next = next;
        }
        if node == self.tail {
            self.tail = prev;
        }
        if node == self.head {
            self.head = next;
        }
        self.count -= count;
        self.num_nodes -= 1;
        self.free_node(node);
    }
}

impl Clone for PackList {
    /// Duplicate the list. Blocks are copied verbatim; the copy's arena is
    /// compact regardless of how fragmented the original's was.
    fn clone(&self) -> Self {
        let mut copy = PackList::new();
        let mut n = self.head;
        while n.exists() {
            let node = &self[n];
            let new = copy.alloc_node(node.block.clone(), node.count);
            copy.count += node.count;
            let tail = copy.tail;
            copy.insert_node(tail, new, true);
            n = node.next;
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_list_is_empty() {
        let list = PackList::new();
        assert_eq!(list.len(), 0);
        assert_eq!(list.node_count(), 0);
        assert!(list.is_empty());
        list.dbg_check();
    }

    #[test]
    fn clone_is_deep() {
        let mut list = PackList::new();
        for i in 0..100 {
            list.push_tail(8, format!("item{i}").as_bytes());
        }

        let mut copy = list.clone();
        copy.dbg_check();
        assert_eq!(copy.len(), list.len());
        assert_eq!(copy.node_count(), list.node_count());
        for i in 0..100i64 {
            assert_eq!(copy.index(i).unwrap().value, list.index(i).unwrap().value);
        }

        // Mutating the copy must leave the original alone.
        copy.del_range(0, 50);
        assert_eq!(copy.len(), 50);
        assert_eq!(list.len(), 100);
        assert_eq!(list.index(0).unwrap().value.as_bytes(), Some(&b"item0"[..]));
        list.dbg_check();
        copy.dbg_check();
    }

    #[test]
    fn clone_compacts_fragmented_arena() {
        let mut list = PackList::new();
        for i in 0..200 {
            list.push_tail(4, format!("{i}").as_bytes());
        }
        // Punch holes so the original's arena has free slots.
        list.del_range(20, 120);
        list.dbg_check();

        let copy = list.clone();
        copy.dbg_check();
        assert_eq!(copy.len(), list.len());
        assert_eq!(copy.nodes.len(), copy.num_nodes);
    }

    #[test]
    fn node_slots_are_recycled() {
        let mut list = PackList::new();
        for round in 0..10 {
            for i in 0..64 {
                list.push_tail(4, format!("{round}-{i}").as_bytes());
            }
            list.del_range(0, 64);
            assert!(list.is_empty());
            list.dbg_check();
        }
        // Every round allocated 16 nodes; the pool should have absorbed them.
        assert!(list.nodes.len() <= 16);
    }
}
