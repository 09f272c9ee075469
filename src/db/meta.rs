//! Persisted table parameters (the `.meta` side file).
//!
//! The slot table and value log carry no self-describing header, so the
//! parameters needed to read them back (bucket mask and pointer width) are
//! kept in a small JSON side file written once at store creation.

use crate::db_config::{DbConfig, PointerWidth};
use crate::error::MetaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Table parameters fixed at store creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbMeta {
    /// The bucket mask; head slots run from 0 through `bucket_count`.
    pub bucket_count: u64,
    /// Width of the slot table's pointer fields.
    pub pointer_width: PointerWidth,
}

impl DbMeta {
    /// Build the metadata a fresh store gets from its config.
    pub fn from_config(config: &DbConfig) -> Self {
        Self {
            bucket_count: config.bucket_count,
            pointer_width: config.pointer_width,
        }
    }

    /// Load metadata from `path`.
    ///
    /// A missing file surfaces as `MetaError::Io` with kind `NotFound`;
    /// callers that want open-or-create semantics match on exactly that and
    /// treat every other failure as fatal.
    pub fn load(path: &Path) -> Result<Self, MetaError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write metadata to `path`, replacing any previous contents.
    pub fn store(&self, path: &Path) -> Result<(), MetaError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.meta");
        let meta = DbMeta {
            bucket_count: 255,
            pointer_width: PointerWidth::W8,
        };
        meta.store(&path).unwrap();
        assert_eq!(DbMeta::load(&path).unwrap(), meta);
    }

    #[test]
    fn missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match DbMeta::load(&dir.path().join("absent.meta")) {
            Err(MetaError::Io(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("expected NotFound io error, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_invalid_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.meta");
        fs::write(&path, b"not json at all").unwrap();
        assert!(matches!(DbMeta::load(&path), Err(MetaError::Invalid(_))));
    }
}
