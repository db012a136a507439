//! Growable buffer for fixed-size kernel enumeration records.
//!
//! The pf table ioctls fill a caller-supplied buffer with a variable,
//! a-priori-unknown number of fixed-size records and report how many
//! records actually exist. `RecordBuffer` owns the byte region for such a
//! call: it grows monotonically (floor of 64 slots, doubling on demand),
//! zero-fills every newly added slot, and iterates the valid region only.

use crate::pf::types::{PfiKif, PfiocTransElem, PfrAddr, PfrAstats, PfrTable, PfrTstats};
use std::mem::size_of;

/// Initial slot count for an empty buffer.
pub const INITIAL_CAPACITY: usize = 64;

/// Identifies the element type held by a [`RecordBuffer`].
///
/// Each kind maps 1:1 to a fixed record byte size. The discriminants match
/// the pf buffer type enum (`PFRB_*`), where 0 is the invalid "unset" slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RecordKind {
    /// Table descriptors (`pfr_table`).
    Tables = 1,
    /// Table statistics (`pfr_tstats`).
    TableStats = 2,
    /// Address entries (`pfr_addr`).
    Addrs = 3,
    /// Address statistics (`pfr_astats`).
    AddrStats = 4,
    /// Interface descriptors (`pfi_kif`).
    Ifaces = 5,
    /// Transaction elements (`pfioc_trans_e`).
    Trans = 6,
}

impl RecordKind {
    /// Byte size of one record of this kind.
    pub fn element_size(self) -> usize {
        match self {
            RecordKind::Tables => size_of::<PfrTable>(),
            RecordKind::TableStats => size_of::<PfrTstats>(),
            RecordKind::Addrs => size_of::<PfrAddr>(),
            RecordKind::AddrStats => size_of::<PfrAstats>(),
            RecordKind::Ifaces => size_of::<PfiKif>(),
            RecordKind::Trans => size_of::<PfiocTransElem>(),
        }
    }

    /// Converts a raw pf buffer type value into a kind.
    ///
    /// Returns `InvalidKind` for 0 ("unset") and anything out of range,
    /// mirroring the `pfrb_type <= 0 || pfrb_type >= PFRB_MAX` check.
    pub fn from_raw(raw: i32) -> Result<Self, BufferError> {
        match raw {
            1 => Ok(RecordKind::Tables),
            2 => Ok(RecordKind::TableStats),
            3 => Ok(RecordKind::Addrs),
            4 => Ok(RecordKind::AddrStats),
            5 => Ok(RecordKind::Ifaces),
            6 => Ok(RecordKind::Trans),
            _ => Err(BufferError::InvalidKind(raw)),
        }
    }
}

/// Error type for buffer operations.
#[derive(Debug, PartialEq, Eq)]
pub enum BufferError {
    /// Raw record kind value is unset or out of range.
    InvalidKind(i32),
    /// Requested capacity overflows the addressable byte size.
    OutOfMemory { requested: usize },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::InvalidKind(raw) => write!(f, "invalid record kind {}", raw),
            BufferError::OutOfMemory { requested } => {
                write!(f, "cannot size buffer for {} records", requested)
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// Resizable, homogeneous array of fixed-size opaque records.
///
/// `count` is the number of records considered valid. It is set by the
/// caller to declare offered capacity before an enumeration call, then
/// overwritten with the kernel-reported true total afterwards - which may
/// exceed `capacity`. That is the truncation signal, not an error.
#[derive(Debug)]
pub struct RecordBuffer {
    kind: RecordKind,
    count: usize,
    capacity: usize,
    storage: Vec<u8>,
}

impl RecordBuffer {
    /// Creates an empty buffer for records of the given kind.
    ///
    /// No storage is allocated until the first [`grow`](Self::grow).
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            count: 0,
            capacity: 0,
            storage: Vec::new(),
        }
    }

    /// Record kind this buffer holds.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Byte size of one record slot.
    pub fn element_size(&self) -> usize {
        self.kind.element_size()
    }

    /// Number of records currently considered valid.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sets the valid record count.
    ///
    /// Values above `capacity` are legal: after a truncated enumeration the
    /// count carries the kernel's true total.
    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    /// Number of allocated record slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The allocated byte region, `capacity * element_size` bytes long.
    pub fn bytes(&self) -> &[u8] {
        &self.storage
    }

    /// Mutable view of the allocated byte region, for the enumeration call
    /// to fill.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Grows the buffer to hold at least `min_capacity` records.
    ///
    /// A `min_capacity` of 0 means "double the current capacity", or start
    /// at [`INITIAL_CAPACITY`] slots if the buffer is empty. A non-zero
    /// `min_capacity` at or below the current capacity is a no-op; a larger
    /// one is honored exactly. Existing record bytes are preserved and the
    /// newly added region is zero-filled. Capacity never shrinks.
    pub fn grow(&mut self, min_capacity: usize) -> Result<(), BufferError> {
        if min_capacity != 0 && min_capacity <= self.capacity {
            return Ok(());
        }
        let target = if self.capacity == 0 {
            min_capacity.max(INITIAL_CAPACITY)
        } else if min_capacity == 0 {
            self.capacity
                .checked_mul(2)
                .ok_or(BufferError::OutOfMemory {
                    requested: self.capacity,
                })?
        } else {
            min_capacity
        };
        let byte_len = target
            .checked_mul(self.element_size())
            .filter(|&len| len <= isize::MAX as usize)
            .ok_or(BufferError::OutOfMemory { requested: target })?;
        // Vec::resize preserves the existing prefix and zero-fills the tail.
        self.storage.resize(byte_len, 0);
        self.capacity = target;
        Ok(())
    }

    /// Steps forward from the record at byte offset `prev`.
    ///
    /// `None` restarts from the first valid record. Returns the byte offset
    /// of the following record, or `None` once the valid region is
    /// exhausted. The valid region is bounded by `count` records (clamped
    /// to `capacity`), never the allocated region.
    pub fn next(&self, prev: Option<usize>) -> Option<usize> {
        let valid = self.count.min(self.capacity);
        if valid == 0 {
            return None;
        }
        let offset = match prev {
            None => return Some(0),
            Some(offset) => offset,
        };
        let index = offset / self.element_size();
        if index + 1 >= valid {
            return None;
        }
        Some(offset + self.element_size())
    }

    /// Byte slice of the record at the given offset.
    pub fn record(&self, offset: usize) -> &[u8] {
        &self.storage[offset..offset + self.element_size()]
    }

    /// Iterates the valid records as byte slices.
    pub fn iter(&self) -> Records<'_> {
        Records {
            buffer: self,
            prev: None,
        }
    }
}

/// Forward iterator over a buffer's valid records.
pub struct Records<'a> {
    buffer: &'a RecordBuffer,
    prev: Option<usize>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let offset = self.buffer.next(self.prev)?;
        self.prev = Some(offset);
        Some(self.buffer.record(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = RecordBuffer::new(RecordKind::Addrs);
        assert_eq!(buf.capacity(), 0);
        assert_eq!(buf.count(), 0);
        assert!(buf.bytes().is_empty());
    }

    #[test]
    fn test_from_raw_valid_kinds() {
        for raw in 1..=6 {
            let kind = RecordKind::from_raw(raw).unwrap();
            assert_eq!(kind as i32, raw);
            assert!(kind.element_size() > 0);
        }
    }

    #[test]
    fn test_from_raw_rejects_unset_and_out_of_range() {
        assert_eq!(RecordKind::from_raw(0), Err(BufferError::InvalidKind(0)));
        assert_eq!(RecordKind::from_raw(-1), Err(BufferError::InvalidKind(-1)));
        assert_eq!(RecordKind::from_raw(7), Err(BufferError::InvalidKind(7)));
    }

    #[test]
    fn test_grow_empty_applies_floor() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        assert_eq!(buf.capacity(), INITIAL_CAPACITY);
        assert_eq!(buf.bytes().len(), INITIAL_CAPACITY * buf.element_size());
    }

    #[test]
    fn test_grow_empty_small_request_applies_floor() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(10).unwrap();
        assert_eq!(buf.capacity(), INITIAL_CAPACITY);
    }

    #[test]
    fn test_grow_empty_large_request_is_exact() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(1000).unwrap();
        assert_eq!(buf.capacity(), 1000);
    }

    #[test]
    fn test_grow_zero_doubles() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        buf.grow(0).unwrap();
        assert_eq!(buf.capacity(), 128);
        buf.grow(0).unwrap();
        assert_eq!(buf.capacity(), 256);
    }

    #[test]
    fn test_grow_at_or_below_capacity_is_noop() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(100).unwrap();
        buf.grow(100).unwrap();
        assert_eq!(buf.capacity(), 100);
        buf.grow(50).unwrap();
        assert_eq!(buf.capacity(), 100);
    }

    #[test]
    fn test_grow_explicit_target_is_exact() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        buf.grow(65).unwrap();
        // No doubling/floor when an explicit larger size is requested.
        assert_eq!(buf.capacity(), 65);
    }

    #[test]
    fn test_grow_preserves_written_bytes() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        let es = buf.element_size();
        for (i, slot) in buf.bytes_mut().chunks_exact_mut(es).enumerate() {
            slot[0] = (i + 1) as u8;
        }
        buf.grow(0).unwrap();
        let es = buf.element_size();
        for i in 0..INITIAL_CAPACITY {
            assert_eq!(buf.bytes()[i * es], (i + 1) as u8);
        }
    }

    #[test]
    fn test_grow_zero_fills_new_region() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        buf.bytes_mut().fill(0xff);
        buf.grow(0).unwrap();
        let boundary = INITIAL_CAPACITY * buf.element_size();
        assert!(buf.bytes()[..boundary].iter().all(|&b| b == 0xff));
        assert!(buf.bytes()[boundary..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_grow_overflow_is_out_of_memory() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        let err = buf.grow(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, BufferError::OutOfMemory { .. }));
        // Capacity is untouched on failure.
        assert_eq!(buf.capacity(), INITIAL_CAPACITY);
    }

    #[test]
    fn test_next_on_empty_buffer() {
        let buf = RecordBuffer::new(RecordKind::Addrs);
        assert_eq!(buf.next(None), None);
    }

    #[test]
    fn test_next_walks_valid_region_only() {
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        buf.set_count(3);
        let es = buf.element_size();

        let first = buf.next(None).unwrap();
        assert_eq!(first, 0);
        let second = buf.next(Some(first)).unwrap();
        assert_eq!(second, es);
        let third = buf.next(Some(second)).unwrap();
        assert_eq!(third, 2 * es);
        // Capacity is 64 but only 3 records are valid.
        assert_eq!(buf.next(Some(third)), None);
    }

    #[test]
    fn test_iter_yields_count_records() {
        let mut buf = RecordBuffer::new(RecordKind::Tables);
        buf.grow(0).unwrap();
        buf.set_count(5);
        assert_eq!(buf.iter().count(), 5);
        // Restartable from the beginning.
        assert_eq!(buf.iter().count(), 5);
    }

    #[test]
    fn test_iter_clamps_count_beyond_capacity() {
        // Mid-retry state: kernel reported more records than fit.
        let mut buf = RecordBuffer::new(RecordKind::Addrs);
        buf.grow(0).unwrap();
        buf.set_count(150);
        assert_eq!(buf.iter().count(), INITIAL_CAPACITY);
    }

    #[test]
    fn test_record_slices_have_element_size() {
        let mut buf = RecordBuffer::new(RecordKind::Tables);
        buf.grow(0).unwrap();
        buf.set_count(2);
        for rec in buf.iter() {
            assert_eq!(rec.len(), RecordKind::Tables.element_size());
        }
    }
}
