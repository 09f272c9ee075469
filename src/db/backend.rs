//! Storage backends for the slot table and value log.
//!
//! Both store files speak the same byte-addressed interface (`Read` +
//! `Write` + `Seek`) through one of two backends, chosen per file at open
//! time:
//!
//! - `Direct`: every operation goes straight to the file.
//! - `Buffered`: the whole file lives in memory for the process lifetime;
//!   [`Backend::flush_to_disk`] truncates the backing file and rewrites it in
//!   full.  Nothing is persisted implicitly, and unflushed changes are lost
//!   on abrupt termination.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A byte-addressed backing store for one store file.
pub enum Backend {
    /// Reads and writes go directly to the file.
    Direct(File),
    /// Reads and writes go to an in-memory image of the file.
    Buffered {
        /// The backing file, written only by [`Backend::flush_to_disk`].
        file: File,
        /// The in-memory image.
        buf: Cursor<Vec<u8>>,
    },
}

impl Backend {
    /// Open the file at `path`.  In buffered mode the current file contents
    /// are read into memory up front.
    pub fn open(path: &Path, buffered: bool, create: bool) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)?;
        if buffered {
            let mut bytes = Vec::new();
            file.seek(SeekFrom::Start(0))?;
            file.read_to_end(&mut bytes)?;
            Ok(Backend::Buffered {
                file,
                buf: Cursor::new(bytes),
            })
        } else {
            Ok(Backend::Direct(file))
        }
    }

    /// Current end of the backend in bytes.  Leaves the cursor at the end.
    pub fn end(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }

    /// Discard all contents and reset the cursor to the start.
    pub fn truncate(&mut self) -> io::Result<()> {
        match self {
            Backend::Direct(file) => {
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
            }
            Backend::Buffered { buf, .. } => {
                *buf = Cursor::new(Vec::new());
            }
        }
        Ok(())
    }

    /// Copy a buffered image back to its file (truncate, rewrite in full).
    /// A no-op for direct backends, whose writes already reached the file.
    pub fn flush_to_disk(&mut self) -> io::Result<()> {
        match self {
            Backend::Direct(file) => file.flush(),
            Backend::Buffered { file, buf } => {
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(buf.get_ref())
            }
        }
    }

    /// Sync the backing file to persistent storage.
    pub fn sync(&mut self) -> io::Result<()> {
        match self {
            Backend::Direct(file) | Backend::Buffered { file, .. } => file.sync_all(),
        }
    }

    /// An independent reader over the backend's current contents, positioned
    /// at the start.  Reads through it never disturb the backend's cursor.
    pub fn snapshot_reader(&self) -> io::Result<SnapshotReader> {
        match self {
            Backend::Direct(file) => Ok(SnapshotReader::File(BufReader::new(file.try_clone()?))),
            Backend::Buffered { buf, .. } => {
                Ok(SnapshotReader::Mem(Cursor::new(buf.get_ref().clone())))
            }
        }
    }
}

impl Read for Backend {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match self {
            Backend::Direct(file) => file.read(out),
            Backend::Buffered { buf, .. } => buf.read(out),
        }
    }
}

impl Write for Backend {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            Backend::Direct(file) => file.write(data),
            Backend::Buffered { buf, .. } => buf.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Backend::Direct(file) => file.flush(),
            Backend::Buffered { .. } => Ok(()),
        }
    }
}

impl Seek for Backend {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Backend::Direct(file) => file.seek(pos),
            Backend::Buffered { buf, .. } => buf.seek(pos),
        }
    }
}

/// Reader returned by [`Backend::snapshot_reader`].
pub enum SnapshotReader {
    /// A cloned handle on the backing file.
    File(BufReader<File>),
    /// A copy of the in-memory image.
    Mem(Cursor<Vec<u8>>),
}

impl Read for SnapshotReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match self {
            SnapshotReader::File(r) => r.read(out),
            SnapshotReader::Mem(r) => r.read(out),
        }
    }
}

impl Seek for SnapshotReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            SnapshotReader::File(r) => r.seek(pos),
            SnapshotReader::Mem(r) => r.seek(pos),
        }
    }
}
