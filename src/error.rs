//! Errors for a chaindb store.
//!
//! Each fallible operation surface gets its own enum so callers can match on
//! exactly the failures that operation can produce.  "No data" (end of chain,
//! end of log, zero length record) is never an error, it is an absent
//! `Option` in the API.

use std::io;
use thiserror::Error;

/// Error opening a store.
#[derive(Debug, Error)]
pub enum OpenError {
    /// Error opening the data (value log) file.
    #[error("data file open failed: {0}")]
    DataFileOpen(#[source] io::Error),
    /// Error opening the index (slot table) file.
    #[error("index file open failed: {0}")]
    IndexFileOpen(#[source] io::Error),
    /// The metadata side file exists but could not be read or parsed.
    /// This is never silently treated as "create a fresh store".
    #[error("metadata load failed: {0}")]
    MetaLoad(#[source] MetaError),
    /// Failed to persist the metadata side file for a fresh store.
    #[error("metadata store failed: {0}")]
    MetaStore(#[source] MetaError),
    /// Failed to write the initial slot table for a fresh store.
    #[error("index init failed: {0}")]
    IndexInit(#[source] io::Error),
    /// Failed to truncate the value log for a fresh store.
    #[error("data init failed: {0}")]
    DataInit(#[source] io::Error),
    /// The store does not exist and create mode was not requested.
    #[error("store does not exist (create not requested)")]
    NotFound,
    /// The configured bucket mask does not fit the configured pointer width.
    #[error("bucket count {bucket_count} does not fit a {width} byte pointer")]
    BucketRange {
        /// The configured bucket mask.
        bucket_count: u64,
        /// Pointer width in bytes.
        width: usize,
    },
}

/// Error loading or storing the metadata side file.
#[derive(Debug, Error)]
pub enum MetaError {
    /// An underlying IO error (includes "file not found").
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// The file exists but does not contain valid metadata.
    #[error("invalid metadata: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Error reading or writing the slot table.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A slot read returned fewer bytes than a full entry requires in a
    /// context that demands a fully written slot.
    #[error("corrupt index: short read at slot {index}")]
    CorruptIndex {
        /// The slot index that could not be read.
        index: u64,
    },
    /// A slot index or value pointer does not fit the configured pointer width.
    #[error("pointer {value} at slot {index} exceeds the configured pointer width")]
    PointerOverflow {
        /// The slot being written.
        index: u64,
        /// The offending value.
        value: u64,
    },
    /// An underlying IO error.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Error framing, reading or rewriting records in the value log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The payload length exceeds what the configured length field can hold.
    #[error("record too large: {len} bytes (max {max})")]
    RecordTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Largest encodable payload length.
        max: u64,
    },
    /// A length field was read but the payload behind it is short.
    #[error("corrupt record: short payload at offset {offset}")]
    CorruptRecord {
        /// Byte offset of the damaged record.
        offset: u64,
    },
    /// An in-place rewrite tried to change a record's stored length.
    /// The prior record is left unchanged; append a new record instead.
    #[error("size mismatch at offset {offset}: stored {stored}, new {new}")]
    SizeMismatch {
        /// Byte offset of the existing record.
        offset: u64,
        /// Length already on disk.
        stored: u64,
        /// Length of the rejected payload.
        new: u64,
    },
    /// An underlying IO error.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Error reading records for a key.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Chain traversal failed in the slot table.
    #[error("index: {0}")]
    Index(#[from] IndexError),
    /// Record read failed in the value log.
    #[error("log: {0}")]
    Log(#[from] LogError),
}

/// Error appending a record to a chain.
#[derive(Debug, Error)]
pub enum AppendError {
    /// Chain extension failed in the slot table.
    #[error("index: {0}")]
    Index(#[from] IndexError),
    /// Record write failed in the value log.
    #[error("log: {0}")]
    Log(#[from] LogError),
}

/// Error from upsert() or increment().
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Failed while searching the chain for an existing record.
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    /// Failed while appending the record as new.
    #[error("append: {0}")]
    Append(#[from] AppendError),
    /// Failed while rewriting the record in place (see [`LogError::SizeMismatch`]).
    #[error("log: {0}")]
    Log(LogError),
    /// increment() found a payload that is not a fixed width counter.
    #[error("counter payload must be 8 bytes, found {len}")]
    BadCounter {
        /// Length of the decoded payload.
        len: usize,
    },
}

/// Error flushing a store to disk.
#[derive(Debug, Error)]
pub enum FlushError {
    /// Failed writing the slot table back to its file.
    #[error("index flush: {0}")]
    WriteIndex(#[source] io::Error),
    /// Failed writing the value log back to its file.
    #[error("data flush: {0}")]
    WriteData(#[source] io::Error),
    /// Failed syncing the index file.
    #[error("index sync: {0}")]
    IndexSync(#[source] io::Error),
    /// Failed syncing the data file.
    #[error("data sync: {0}")]
    DataSync(#[source] io::Error),
}
