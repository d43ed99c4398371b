//! A packed block is a compact serialization of a sequence of small entries,
//! where each entry is either a byte string or a signed integer. The whole
//! sequence lives in one contiguous buffer, so a block full of short entries
//! costs a few bytes of overhead per entry instead of a heap allocation each.
//!
//! Reads and edits go through [`PackCursor`], an opaque position handle.
//! Cursors are byte offsets under the hood and are invalidated by *any*
//! mutation of the block - the only exception is [`PackBlock::delete`], which
//! hands back the cursor re-anchored at the deleted entry's successor.
//!
//! Entry layout is `header | payload | backlen`:
//!
//! - tag `0x00..=0x3f`: byte string, length in the tag byte, payload follows.
//! - tag `0x40`: byte string, LEB128 length then payload.
//! - tag `0x41`: integer, zigzag LEB128 payload.
//!
//! `backlen` is the byte length of `header | payload` in a reverse-readable
//! varint (see the `varint` module), which is what makes backwards traversal
//! possible.
//!
//! A pushed byte string that happens to be a canonical decimal integer is
//! stored in integer form. This keeps storage canonical when callers move
//! entries between blocks by formatting integers back to decimal text.

use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::varint::*;

mod varint;

const TAG_STR_SHORT_MAX: u8 = 0x3f;
const TAG_STR_LONG: u8 = 0x40;
const TAG_INT: u8 = 0x41;

/// A packed sequence of byte-string / integer entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PackBlock {
    data: Vec<u8>,
    num_entries: usize,
}

/// An opaque position inside a [`PackBlock`]. Only valid for the block that
/// produced it, and only until that block is next mutated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PackCursor(usize);

/// A decoded entry. Exactly one of the two variants applies; which one is a
/// property of the stored entry, not of the read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PackValue<'a> {
    Bytes(&'a [u8]),
    Int(i64),
}

impl<'a> PackValue<'a> {
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            PackValue::Bytes(b) => Some(b),
            PackValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            PackValue::Int(v) => Some(v),
            PackValue::Bytes(_) => None,
        }
    }
}

/// Decode the entry starting at `off`. Returns the value and the byte size of
/// the entry's header + payload (backlen excluded).
fn read_entry(data: &[u8], off: usize) -> (PackValue<'_>, usize) {
    let tag = data[off];
    if tag <= TAG_STR_SHORT_MAX {
        let len = tag as usize;
        let start = off + 1;
        (PackValue::Bytes(&data[start..start + len]), 1 + len)
    } else if tag == TAG_STR_LONG {
        let (len, n) = decode_leb_u64(&data[off + 1..]);
        let start = off + 1 + n;
        (PackValue::Bytes(&data[start..start + len as usize]), 1 + n + len as usize)
    } else {
        debug_assert_eq!(tag, TAG_INT);
        let (zz, n) = decode_leb_u64(&data[off + 1..]);
        (PackValue::Int(decode_zigzag_i64(zz)), 1 + n)
    }
}

/// Parse a canonical decimal i64: optional `-`, no leading zeros (`"0"`
/// itself is fine, `"-0"` is not), must fit in an i64.
fn parse_int(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() || bytes.len() > 20 {
        return None;
    }
    let (neg, digits) = match bytes[0] {
        b'-' => (true, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.is_empty() {
        return None;
    }
    if digits[0] == b'0' && (neg || digits.len() > 1) {
        return None;
    }
    let mut value: u64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((b - b'0') as u64)?;
    }
    if neg {
        if value > i64::MAX as u64 + 1 {
            return None;
        }
        Some((value as i64).wrapping_neg())
    } else {
        if value > i64::MAX as u64 {
            return None;
        }
        Some(value as i64)
    }
}

impl PackBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the block.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Total serialized size in bytes.
    pub fn blob_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn push_head(&mut self, value: &[u8]) {
        self.insert_at(0, value);
    }

    pub fn push_tail(&mut self, value: &[u8]) {
        self.insert_at(self.data.len(), value);
    }

    /// Cursor for the entry at `idx`: 0 is the first entry, -1 the last.
    pub fn index(&self, idx: i64) -> Option<PackCursor> {
        if idx >= 0 {
            let mut off = 0;
            let mut remaining = idx;
            while off < self.data.len() {
                if remaining == 0 {
                    return Some(PackCursor(off));
                }
                off = self.skip_entry(off);
                remaining -= 1;
            }
            None
        } else {
            let mut off = self.data.len();
            let mut remaining = idx.unsigned_abs();
            while off > 0 {
                off = self.prev_offset(off);
                remaining -= 1;
                if remaining == 0 {
                    return Some(PackCursor(off));
                }
            }
            None
        }
    }

    pub fn next(&self, cursor: PackCursor) -> Option<PackCursor> {
        let off = self.skip_entry(cursor.0);
        if off < self.data.len() {
            Some(PackCursor(off))
        } else {
            None
        }
    }

    pub fn prev(&self, cursor: PackCursor) -> Option<PackCursor> {
        if cursor.0 == 0 {
            None
        } else {
            Some(PackCursor(self.prev_offset(cursor.0)))
        }
    }

    /// Decode the entry under `cursor`.
    pub fn get(&self, cursor: PackCursor) -> PackValue<'_> {
        read_entry(&self.data, cursor.0).0
    }

    /// Insert a new entry immediately before `cursor`. The caller's other
    /// cursors into this block are invalidated; `cursor` itself now addresses
    /// the inserted entry.
    pub fn insert_before(&mut self, cursor: PackCursor, value: &[u8]) {
        debug_assert!(cursor.0 <= self.data.len());
        self.insert_at(cursor.0, value);
    }

    /// Delete the entry under `cursor`. Returns the cursor re-anchored at the
    /// successor entry, or `None` when the deleted entry was the last one.
    pub fn delete(&mut self, cursor: PackCursor) -> Option<PackCursor> {
        let body = read_entry(&self.data, cursor.0).1;
        let total = body + backlen_size(body);
        self.data.drain(cursor.0..cursor.0 + total);
        self.num_entries -= 1;
        if cursor.0 < self.data.len() {
            Some(cursor)
        } else {
            None
        }
    }

    /// Delete `count` entries starting at `start` (which may be negative,
    /// counting from the tail). A negative `count` means "until the end".
    /// Out-of-range starts delete nothing.
    pub fn delete_range(&mut self, start: i64, count: i64) {
        let Some(first) = self.index(start) else { return };
        let to_end = count < 0;
        let mut end = first.0;
        let mut removed = 0;
        while end < self.data.len() && (to_end || removed < count) {
            end = self.skip_entry(end);
            removed += 1;
        }
        self.data.drain(first.0..end);
        self.num_entries -= removed as usize;
    }

    /// Entry-vs-bytes equality. Integer entries compare numerically when the
    /// probe parses as a canonical integer; everything else is byte equality.
    pub fn compare(&self, cursor: PackCursor, other: &[u8]) -> bool {
        match self.get(cursor) {
            PackValue::Bytes(b) => b == other,
            PackValue::Int(v) => parse_int(other) == Some(v),
        }
    }

    /// Byte offset just past the entry starting at `off` (backlen included).
    fn skip_entry(&self, off: usize) -> usize {
        let body = read_entry(&self.data, off).1;
        off + body + backlen_size(body)
    }

    /// Start offset of the entry that ends just before `off`.
    fn prev_offset(&self, off: usize) -> usize {
        let (body, blen) = decode_backlen(&self.data, off);
        off - blen - body
    }

    fn insert_at(&mut self, pos: usize, value: &[u8]) {
        let mut buf: SmallVec<[u8; 32]> = SmallVec::new();
        let mut scratch = [0u8; 10];
        if let Some(v) = parse_int(value) {
            buf.push(TAG_INT);
            let n = encode_leb_u64(encode_zigzag_i64(v), &mut scratch);
            buf.extend_from_slice(&scratch[..n]);
        } else if value.len() <= TAG_STR_SHORT_MAX as usize {
            buf.push(value.len() as u8);
            buf.extend_from_slice(value);
        } else {
            buf.push(TAG_STR_LONG);
            let n = encode_leb_u64(value.len() as u64, &mut scratch);
            buf.extend_from_slice(&scratch[..n]);
            buf.extend_from_slice(value);
        }
        let body = buf.len();
        let mut blen = [0u8; 5];
        let n = encode_backlen(body, &mut blen);
        buf.extend_from_slice(&blen[..n]);

        self.data.splice(pos..pos, buf.iter().copied());
        self.num_entries += 1;
    }
}
