//! The value log (data file): a sequence of length-prefixed records
//! addressed by byte offset.
//!
//! The log grows by append only, with one exception: a record may be
//! rewritten in place when and only when the new payload has exactly the
//! stored length.  A record's footprint never changes once written and
//! nothing is ever freed.
//!
//! An absent or zero length field reads as "no data"; both scanning and
//! keyed reads treat that as a normal end-of-data outcome, never an error.

use crate::db::backend::{Backend, SnapshotReader};
use crate::db_config::PointerWidth;
use crate::error::LogError;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Frame `payload` with its fixed-width length prefix.
pub fn encode_record(payload: &[u8], width: PointerWidth) -> Result<Vec<u8>, LogError> {
    let max = width.max_record_len();
    if payload.len() as u64 > max {
        return Err(LogError::RecordTooLarge {
            len: payload.len(),
            max,
        });
    }
    let sfb = width.size_field_bytes();
    let mut framed = Vec::with_capacity(sfb + payload.len());
    framed
        .write_uint::<LittleEndian>(payload.len() as u64, sfb)
        .expect("write to Vec is infallible");
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Read the record framed at `offset`.
///
/// Returns `None` when the length field is absent (end of stream) or zero;
/// a present length field with a short payload behind it is `CorruptRecord`.
pub fn decode_record_at<R: Read + Seek>(
    stream: &mut R,
    offset: u64,
    width: PointerWidth,
) -> Result<Option<Vec<u8>>, LogError> {
    stream.seek(SeekFrom::Start(offset))?;
    let sfb = width.size_field_bytes();
    let mut field = [0u8; 8];
    match stream.read_exact(&mut field[..sfb]) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(LogError::Io(e)),
    }
    let len = LittleEndian::read_uint(&field[..sfb], sfb);
    if len == 0 {
        return Ok(None);
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            LogError::CorruptRecord { offset }
        } else {
            LogError::Io(e)
        }
    })?;
    Ok(Some(payload))
}

/// The value log over its backing storage.
pub struct ValueLog {
    backend: Backend,
    width: PointerWidth,
}

impl ValueLog {
    /// Wrap `backend` as a value log with the given pointer width.
    pub fn new(backend: Backend, width: PointerWidth) -> Self {
        Self { backend, width }
    }

    /// Width of the record length field in bytes.
    pub fn size_field_bytes(&self) -> usize {
        self.width.size_field_bytes()
    }

    /// Frame `payload` and write it at the end of the log, returning the
    /// byte offset it was written at.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64, LogError> {
        let framed = encode_record(payload, self.width)?;
        let offset = self.backend.end()?;
        self.backend.write_all(&framed)?;
        Ok(offset)
    }

    /// Read the record payload at `offset`; `None` at end of log or for a
    /// zero length record.
    pub fn read_at(&mut self, offset: u64) -> Result<Option<Vec<u8>>, LogError> {
        decode_record_at(&mut self.backend, offset, self.width)
    }

    /// Rewrite the record at `offset` in place.
    ///
    /// If no record was ever written there (length field unreadable or zero)
    /// this is an insert.  If one was, the new payload must have exactly the
    /// stored length or the call fails with `SizeMismatch` and the prior
    /// record stands.
    pub fn overwrite_at(&mut self, offset: u64, payload: &[u8]) -> Result<(), LogError> {
        let framed = encode_record(payload, self.width)?;
        self.backend.seek(SeekFrom::Start(offset))?;
        let sfb = self.width.size_field_bytes();
        let mut field = [0u8; 8];
        let stored = match self.backend.read_exact(&mut field[..sfb]) {
            Ok(()) => LittleEndian::read_uint(&field[..sfb], sfb),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => 0,
            Err(e) => return Err(LogError::Io(e)),
        };
        if stored > 0 && stored != payload.len() as u64 {
            debug!(
                offset,
                stored,
                new = payload.len(),
                "refusing size changing rewrite"
            );
            return Err(LogError::SizeMismatch {
                offset,
                stored,
                new: payload.len() as u64,
            });
        }
        self.backend.seek(SeekFrom::Start(offset))?;
        self.backend.write_all(&framed)?;
        Ok(())
    }

    /// Discard the whole log.
    pub fn truncate(&mut self) -> io::Result<()> {
        self.backend.truncate()
    }

    /// An independent reader over the log's current contents (buffered
    /// contents included).
    pub fn snapshot_reader(&self) -> io::Result<SnapshotReader> {
        self.backend.snapshot_reader()
    }

    /// Write a buffered log back to its file.
    pub fn flush_to_disk(&mut self) -> io::Result<()> {
        self.backend.flush_to_disk()
    }

    /// Sync the backing file.
    pub fn sync(&mut self) -> io::Result<()> {
        self.backend.sync()
    }
}
