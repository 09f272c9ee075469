//! The slot table (index file): a flat array of `(next, value)` pointer
//! pairs, one per hash bucket plus one per overflow node appended since.
//!
//! Slot `i` lives at byte offset `i * 2 * pointer_width`; every other
//! component relies on that addressing contract.  A slot whose `next` field
//! equals its own index is the tail sentinel of its chain.

use crate::db::backend::Backend;
use crate::db_config::PointerWidth;
use crate::error::IndexError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

/// One fully read slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// The slot's own index; chain position is identity.
    pub index: u64,
    /// Index of the next slot in the chain (equal to `index` for a tail).
    pub next: u64,
    /// Byte offset of this node's record in the value log.
    pub value: u64,
}

impl Slot {
    /// This slot's chain linkage as an explicit state instead of the
    /// "next equals own index" on-disk convention.
    pub fn link(&self) -> ChainLink {
        if self.next == self.index {
            ChainLink::Tail
        } else {
            ChainLink::Next(self.next)
        }
    }
}

/// Chain linkage of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLink {
    /// End of the chain; the slot references itself on disk.
    Tail,
    /// The chain continues at this slot index.
    Next(u64),
}

/// The slot table over its backing storage.
pub struct SlotTable {
    backend: Backend,
    width: PointerWidth,
}

impl SlotTable {
    /// Wrap `backend` as a slot table with the given pointer width.
    pub fn new(backend: Backend, width: PointerWidth) -> Self {
        Self { backend, width }
    }

    /// Truncate the table and write `head_count` head slots, each a
    /// self-referencing tail with a zero value pointer.
    pub fn initialize(&mut self, head_count: u64) -> io::Result<()> {
        self.backend.truncate()?;
        let w = self.width.bytes();
        let mut image = Vec::with_capacity(head_count as usize * w * 2);
        for i in 0..head_count {
            image
                .write_uint::<LittleEndian>(i, w)
                .expect("write to Vec is infallible");
            image
                .write_uint::<LittleEndian>(0, w)
                .expect("write to Vec is infallible");
        }
        self.backend.write_all(&image)
    }

    /// Read the slot at `index`.  A short read is `CorruptIndex`; every
    /// context that calls this demands a fully written slot.
    pub fn read_slot(&mut self, index: u64) -> Result<Slot, IndexError> {
        self.backend.seek(SeekFrom::Start(self.offset(index)))?;
        let w = self.width.bytes();
        let mut pair = [0u8; 16];
        if let Err(e) = self.backend.read_exact(&mut pair[..w * 2]) {
            return Err(if e.kind() == ErrorKind::UnexpectedEof {
                IndexError::CorruptIndex { index }
            } else {
                IndexError::Io(e)
            });
        }
        let mut fields = &pair[..w * 2];
        let next = fields.read_uint::<LittleEndian>(w)?;
        let value = fields.read_uint::<LittleEndian>(w)?;
        Ok(Slot { index, next, value })
    }

    /// Probe the `next` field of the slot at `index`, tolerating a short
    /// read: `None` means the slot is not (fully) materialized yet, which is
    /// how the append path detects the current end of the overflow region.
    pub fn peek_next(&mut self, index: u64) -> Result<Option<u64>, IndexError> {
        self.backend.seek(SeekFrom::Start(self.offset(index)))?;
        let w = self.width.bytes();
        let mut field = [0u8; 8];
        match self.backend.read_exact(&mut field[..w]) {
            Ok(()) => Ok(Some(LittleEndian::read_uint(&field[..w], w))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(IndexError::Io(e)),
        }
    }

    /// Overwrite both fields of the slot at `index` unconditionally.  Writing
    /// past the initial head region is valid; that is how chains grow.
    pub fn write_slot(&mut self, index: u64, next: u64, value: u64) -> Result<(), IndexError> {
        let max = self.width.max_pointer();
        if next > max {
            return Err(IndexError::PointerOverflow { index, value: next });
        }
        if value > max {
            return Err(IndexError::PointerOverflow { index, value });
        }
        self.backend.seek(SeekFrom::Start(self.offset(index)))?;
        let w = self.width.bytes();
        self.backend.write_uint::<LittleEndian>(next, w)?;
        self.backend.write_uint::<LittleEndian>(value, w)?;
        Ok(())
    }

    /// Current table length in whole slots.
    pub fn len_slots(&mut self) -> Result<u64, IndexError> {
        Ok(self.backend.end()? / self.width.slot_bytes())
    }

    /// Write a buffered table back to its file.
    pub fn flush_to_disk(&mut self) -> io::Result<()> {
        self.backend.flush_to_disk()
    }

    /// Sync the backing file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.backend.sync()
    }

    fn offset(&self, index: u64) -> u64 {
        index * self.width.slot_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(width: PointerWidth) -> (tempfile::TempDir, SlotTable) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::open(&dir.path().join("t.idx"), false, true).unwrap();
        (dir, SlotTable::new(backend, width))
    }

    #[test]
    fn initialize_writes_self_loop_sentinels() {
        let (_dir, mut t) = table(PointerWidth::W8);
        t.initialize(8).unwrap();
        assert_eq!(t.len_slots().unwrap(), 8);
        for i in 0..8 {
            let slot = t.read_slot(i).unwrap();
            assert_eq!(slot.link(), ChainLink::Tail);
            assert_eq!(slot.value, 0);
        }
    }

    #[test]
    fn read_past_end_is_corrupt_index() {
        let (_dir, mut t) = table(PointerWidth::W8);
        t.initialize(4).unwrap();
        match t.read_slot(4) {
            Err(IndexError::CorruptIndex { index }) => assert_eq!(index, 4),
            other => panic!("expected CorruptIndex, got {:?}", other),
        }
    }

    #[test]
    fn peek_tolerates_missing_slot() {
        let (_dir, mut t) = table(PointerWidth::W8);
        t.initialize(4).unwrap();
        assert_eq!(t.peek_next(4).unwrap(), None);
        assert_eq!(t.peek_next(2).unwrap(), Some(2));
        t.write_slot(4, 4, 0).unwrap();
        assert_eq!(t.peek_next(4).unwrap(), Some(4));
    }

    #[test]
    fn rewrite_turns_tail_into_link() {
        let (_dir, mut t) = table(PointerWidth::W4);
        t.initialize(2).unwrap();
        t.write_slot(1, 2, 96).unwrap();
        let slot = t.read_slot(1).unwrap();
        assert_eq!(slot.link(), ChainLink::Next(2));
        assert_eq!(slot.value, 96);
        // Slot 0 is untouched.
        assert_eq!(t.read_slot(0).unwrap().link(), ChainLink::Tail);
    }

    #[test]
    fn narrow_pointers_reject_wide_values() {
        let (_dir, mut t) = table(PointerWidth::W2);
        t.initialize(2).unwrap();
        assert!(matches!(
            t.write_slot(0, 0x1_0000, 0),
            Err(IndexError::PointerOverflow { .. })
        ));
        assert!(matches!(
            t.write_slot(0, 1, 0x1_0000),
            Err(IndexError::PointerOverflow { .. })
        ));
    }
}
