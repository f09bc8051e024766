//! Pre-allocated record storage.
//!
//! Allocated once, zeroed, never grown. Callers provide all
//! synchronization; the arena only does bounds-checked record copies.

use dmem_proto::RECORD_SIZE;

/// Fixed-capacity byte region holding encoded records.
pub struct Arena {
    bytes: Box<[u8]>,
}

impl Arena {
    /// Allocate a zeroed arena of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Arena size in bytes.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Check a whole record fits at `offset`.
    #[inline(always)]
    pub fn fits(&self, offset: usize) -> bool {
        offset
            .checked_add(RECORD_SIZE)
            .map_or(false, |end| end <= self.bytes.len())
    }

    /// Copy a staged record into the arena.
    ///
    /// Returns `false` (and writes nothing) if the record does not fit.
    #[inline(always)]
    pub fn write_record(&mut self, offset: usize, record: &[u8; RECORD_SIZE]) -> bool {
        if !self.fits(offset) {
            return false;
        }
        self.bytes[offset..offset + RECORD_SIZE].copy_from_slice(record);
        true
    }

    /// Copy one record out of the arena.
    #[inline(always)]
    pub fn read_record(&self, offset: usize) -> Option<[u8; RECORD_SIZE]> {
        if !self.fits(offset) {
            return None;
        }
        let mut out = [0u8; RECORD_SIZE];
        out.copy_from_slice(&self.bytes[offset..offset + RECORD_SIZE]);
        Some(out)
    }

    /// Zero every byte.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Raw view of the stored bytes.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let mut arena = Arena::new(RECORD_SIZE * 2);
        let record = [7u8; RECORD_SIZE];

        assert!(arena.write_record(RECORD_SIZE, &record));
        assert_eq!(arena.read_record(RECORD_SIZE), Some(record));
        assert_eq!(arena.read_record(0), Some([0u8; RECORD_SIZE]));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut arena = Arena::new(RECORD_SIZE + 10);
        assert!(!arena.write_record(11, &[1u8; RECORD_SIZE]));
        assert_eq!(arena.read_record(RECORD_SIZE), None);
        assert_eq!(arena.read_record(usize::MAX), None);
        assert!(arena.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_clear() {
        let mut arena = Arena::new(RECORD_SIZE);
        arena.write_record(0, &[9u8; RECORD_SIZE]);
        arena.clear();
        assert!(arena.as_bytes().iter().all(|&b| b == 0));
    }
}
