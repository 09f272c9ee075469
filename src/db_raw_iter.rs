//! Raw iterator over a store's value log.  Walks records in write order
//! without touching the slot table, so it works on a data file alone (plus
//! the metadata side file for the pointer width).

use crate::db::backend::SnapshotReader;
use crate::db::meta::DbMeta;
use crate::db::value_log::decode_record_at;
use crate::db_config::PointerWidth;
use crate::db_files::DbFiles;
use crate::error::OpenError;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek};
use std::path::PathBuf;

/// Iterate over every record payload in a value log, oldest first.
///
/// The iterator stops at the first "no data" outcome (end of log or a zero
/// length record) and swallows read errors as end of iteration, the right
/// behavior for inspection and debugging passes.
pub struct DbRawIter<R: Read + Seek> {
    stream: R,
    offset: u64,
    width: PointerWidth,
}

impl DbRawIter<BufReader<File>> {
    /// Open the value log for the store at `base` directly from its files.
    /// Reads only what is on disk; a buffered store must flush first for its
    /// records to be visible here.
    pub fn open<P: Into<PathBuf>>(base: P) -> Result<Self, OpenError> {
        let files = DbFiles::new(base);
        let meta = DbMeta::load(&files.meta_path()).map_err(OpenError::MetaLoad)?;
        let file = OpenOptions::new()
            .read(true)
            .open(files.db_path())
            .map_err(OpenError::DataFileOpen)?;
        Ok(Self::with_stream(BufReader::new(file), meta.pointer_width))
    }
}

impl<R: Read + Seek> DbRawIter<R> {
    /// Iterate records from an already opened log stream.
    pub fn with_stream(stream: R, width: PointerWidth) -> Self {
        Self {
            stream,
            offset: 0,
            width,
        }
    }
}

impl<R: Read + Seek> Iterator for DbRawIter<R> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let payload = decode_record_at(&mut self.stream, self.offset, self.width)
            .ok()
            .flatten()?;
        self.offset += (self.width.size_field_bytes() + payload.len()) as u64;
        Some(payload)
    }
}

/// The iterator type returned by [`Db::raw_iter`](crate::db::Db::raw_iter).
pub type DbSnapshotIter = DbRawIter<SnapshotReader>;
