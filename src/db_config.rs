//! Define the configuration used to create or open a chaindb store.

use crate::codec::{Codec, KeyFilter};
use crate::db::Db;
use crate::db_files::DbFiles;
use crate::error::OpenError;
use serde::{Deserialize, Serialize};
use std::hash::BuildHasher;
use std::path::PathBuf;
use std::sync::Arc;

/// Width in bytes of the slot table's pointer fields.
///
/// Fixed at store creation; every slot is two pointers wide and the value
/// log's length field is derived from it (`width / 4`, floored at one byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerWidth {
    /// 2 byte pointers.  Tiny stores only: slot indices and log offsets must
    /// stay below 64Ki.
    W2,
    /// 4 byte pointers.
    W4,
    /// 8 byte pointers.  The default.
    W8,
}

impl PointerWidth {
    /// Width of one pointer field in bytes.
    pub fn bytes(self) -> usize {
        match self {
            PointerWidth::W2 => 2,
            PointerWidth::W4 => 4,
            PointerWidth::W8 => 8,
        }
    }

    /// Size of one slot (a `next`/`value` pointer pair) in bytes.
    pub fn slot_bytes(self) -> u64 {
        (self.bytes() * 2) as u64
    }

    /// Width of the value log's record length field in bytes.
    pub fn size_field_bytes(self) -> usize {
        (self.bytes() / 4).max(1)
    }

    /// Largest payload length the record length field can represent.
    pub fn max_record_len(self) -> u64 {
        (1u64 << (self.size_field_bytes() * 8)) - 1
    }

    /// Largest value a pointer field can hold.
    pub fn max_pointer(self) -> u64 {
        match self {
            PointerWidth::W2 => 0xFFFF,
            PointerWidth::W4 => 0xFFFF_FFFF,
            PointerWidth::W8 => u64::MAX,
        }
    }
}

impl Default for PointerWidth {
    fn default() -> Self {
        PointerWidth::W8
    }
}

/// Configuration for a store.
///
/// `bucket_count` doubles as the hash mask, so uniform in-range buckets
/// require a value of the form `2^n - 1` (the default is `0xFFFF`).  This is
/// a caller contract, not validated here.
#[derive(Clone)]
pub struct DbConfig {
    pub(crate) files: DbFiles,
    pub(crate) bucket_count: u64,
    pub(crate) pointer_width: PointerWidth,
    pub(crate) create: bool,
    pub(crate) truncate: bool,
    pub(crate) buffered_index: bool,
    pub(crate) buffered_data: bool,
    pub(crate) default_filter: Option<Arc<KeyFilter>>,
}

impl DbConfig {
    /// Create a new config for the store at `base` (see [`DbFiles::new`])
    /// with default parameters.
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            files: DbFiles::new(base),
            bucket_count: 0xFFFF,
            pointer_width: PointerWidth::W8,
            create: false,
            truncate: false,
            buffered_index: false,
            buffered_data: false,
            default_filter: None,
        }
    }

    /// Use an explicit [`DbFiles`] instead of a base path.
    pub fn with_files(mut self, files: DbFiles) -> Self {
        self.files = files;
        self
    }

    /// Set the bucket mask.  Choose `2^n - 1`.
    /// Ignored when opening an existing store (the persisted parameters win).
    pub fn set_bucket_count(mut self, bucket_count: u64) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// Set the pointer width.
    /// Ignored when opening an existing store (the persisted parameters win).
    pub fn set_pointer_width(mut self, width: PointerWidth) -> Self {
        self.pointer_width = width;
        self
    }

    /// If the store does not exist then create it, otherwise open existing.
    /// Only a *missing* metadata file triggers creation; an unreadable or
    /// corrupt one is surfaced as an open error.
    pub fn create(mut self) -> Self {
        self.create = true;
        self
    }

    /// Rebuild the store from scratch with the configured parameters,
    /// discarding any existing contents.
    pub fn truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Hold the slot table fully in memory; [`Db::flush`](crate::db::Db::flush)
    /// writes it back.  Unflushed changes are lost on abrupt termination.
    pub fn buffered_index(mut self) -> Self {
        self.buffered_index = true;
        self
    }

    /// Hold the value log fully in memory; [`Db::flush`](crate::db::Db::flush)
    /// writes it back.  Unflushed changes are lost on abrupt termination.
    pub fn buffered_data(mut self) -> Self {
        self.buffered_data = true;
        self
    }

    /// Set the default key filter, used by lookups when the call site passes
    /// no filter of its own.
    pub fn set_key_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> bool + Send + Sync + 'static,
    {
        self.default_filter = Some(Arc::new(filter));
        self
    }

    /// Consumes the config and opens the store.
    pub fn build<C, S>(self) -> Result<Db<C, S>, OpenError>
    where
        C: Codec + Default,
        S: BuildHasher + Default,
    {
        Db::open(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_tables() {
        assert_eq!(PointerWidth::W8.bytes(), 8);
        assert_eq!(PointerWidth::W8.slot_bytes(), 16);
        assert_eq!(PointerWidth::W8.size_field_bytes(), 2);
        assert_eq!(PointerWidth::W8.max_record_len(), 0xFFFF);

        assert_eq!(PointerWidth::W4.size_field_bytes(), 1);
        assert_eq!(PointerWidth::W4.max_record_len(), 0xFF);

        // W2 / 4 would be a zero width length field; it is floored at one byte.
        assert_eq!(PointerWidth::W2.size_field_bytes(), 1);
        assert_eq!(PointerWidth::W2.max_pointer(), 0xFFFF);
    }
}
