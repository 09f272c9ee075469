//! Chaindb, a small persistent key/value store.
//!
//! A store is three files derived from one base path: a slot table
//! (`<base>.idx`) of fixed width pointer pairs, an append-biased value log
//! (`<base>.db`) of length-prefixed records, and a JSON metadata side file
//! (`<base>.meta`) holding the parameters needed to read them back.
//!
//! Keys hash to buckets; a bucket heads a chain of slots and each chain node
//! points at one record in the log.  Appends are O(1) once a bucket's tail is
//! known, reads walk the chain oldest first, and hash collisions are resolved
//! by caller supplied key filters rather than by the store (see [`codec`]).
//! Records are immutable except for one constrained escape hatch: an in-place
//! rewrite that keeps the record's exact footprint.
//!
//! ```
//! use chaindb::{Db, DbConfig, key_prefix_filter, KeyPrefixCodec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let config = DbConfig::new(dir.path().join("events"))
//!     .set_bucket_count(255)
//!     .create();
//! let mut db: Db<KeyPrefixCodec> = config.build()?;
//!
//! db.push(b"sensor-a", b"21.5")?;
//! db.push(b"sensor-b", b"19.0")?;
//! db.push(b"sensor-a", b"21.7")?;
//!
//! let readings = db.get_all(b"sensor-a", Some(&key_prefix_filter))?;
//! assert_eq!(readings, vec![b"21.5".to_vec(), b"21.7".to_vec()]);
//!
//! db.flush()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod codec;
pub mod db;
pub mod db_config;
pub mod db_files;
pub mod db_raw_iter;
pub mod error;

pub use crate::codec::{key_prefix_filter, Codec, IdentityCodec, KeyFilter, KeyPrefixCodec};
pub use crate::db::meta::DbMeta;
pub use crate::db::{Db, NodeMatch};
pub use crate::db_config::{DbConfig, PointerWidth};
pub use crate::db_files::DbFiles;
pub use crate::db_raw_iter::{DbRawIter, DbSnapshotIter};
