//! Paths for the files that make up a store.
//!
//! A store is named by a base path; the individual files hang off it by
//! appending an extension: `<base>.idx` (slot table), `<base>.db` (value
//! log) and `<base>.meta` (persisted table parameters).

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Contains the file names and paths for all the files in a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbFiles {
    base: PathBuf,
}

impl DbFiles {
    /// Create a DbFiles from a base path, e.g. `/var/data/mystore`.
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        DbFiles { base: base.into() }
    }

    /// Create a DbFiles from a directory and a store name within it.
    pub fn with_dir<P, S>(dir: P, name: S) -> Self
    where
        P: Into<PathBuf>,
        S: AsRef<Path>,
    {
        DbFiles {
            base: dir.into().join(name.as_ref()),
        }
    }

    /// The base path the store files are derived from.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path to the slot table (index) file.
    pub fn idx_path(&self) -> PathBuf {
        self.with_ext("idx")
    }

    /// Path to the value log (data) file.
    pub fn db_path(&self) -> PathBuf {
        self.with_ext("db")
    }

    /// Path to the metadata side file.
    pub fn meta_path(&self) -> PathBuf {
        self.with_ext("meta")
    }

    /// Delete the store files.  Missing files are silently ignored.
    pub fn delete(self) {
        let _ = fs::remove_file(self.idx_path());
        let _ = fs::remove_file(self.db_path());
        let _ = fs::remove_file(self.meta_path());
    }

    // Appends ".ext" rather than using Path::with_extension so a dot in the
    // store name is not treated as an existing extension.
    fn with_ext(&self, ext: &str) -> PathBuf {
        let mut s: OsString = self.base.clone().into_os_string();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths() {
        let files = DbFiles::with_dir("/tmp/stores", "counts");
        assert_eq!(files.idx_path(), PathBuf::from("/tmp/stores/counts.idx"));
        assert_eq!(files.db_path(), PathBuf::from("/tmp/stores/counts.db"));
        assert_eq!(files.meta_path(), PathBuf::from("/tmp/stores/counts.meta"));
    }

    #[test]
    fn dotted_names_keep_their_dot() {
        let files = DbFiles::new("/tmp/archive.2024");
        assert_eq!(files.idx_path(), PathBuf::from("/tmp/archive.2024.idx"));
    }
}
