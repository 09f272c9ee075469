//! Main module for a chaindb store.  This implements the core sync single
//! threaded access to the slot table and value log.
//!
//! A store maps a hashed key to a bucket, and a bucket to a chain of slots;
//! each non-tail slot points at one length-prefixed record in the value log.
//! Appends extend the chain with a fresh overflow slot; reads walk the chain
//! oldest first.  Hash collisions are expected and never resolved here: every
//! record in the bucket comes back, and the caller's key filter decides which
//! belong to the key (see [`crate::codec`]).
//!
//! Exactly one owning thread may mutate a store at a time.  There is no
//! locking, no transaction, and `increment` is a plain read-modify-write.

pub mod backend;
pub mod meta;
pub mod slot_table;
pub mod value_log;

use crate::codec::{Codec, IdentityCodec, KeyFilter};
use crate::db::backend::Backend;
use crate::db::meta::DbMeta;
use crate::db::slot_table::{ChainLink, SlotTable};
use crate::db::value_log::ValueLog;
use crate::db_config::{DbConfig, PointerWidth};
use crate::db_raw_iter::{DbRawIter, DbSnapshotIter};
use crate::error::{
    AppendError, FetchError, FlushError, IndexError, MetaError, OpenError, UpdateError,
};
use fxhash::{FxHashMap, FxHasher};
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};
use std::io::{self, ErrorKind};
use tracing::{debug, trace};

/// Index of the slot a fresh overflow node goes to: the next free position
/// past either the head region or the current overflow region, whichever is
/// larger.  This placement is part of the on-disk format.
fn next_overflow_index(len_slots: u64, bucket_count: u64) -> u64 {
    len_slots.max(bucket_count)
}

/// A matched chain node, as returned by [`Db::find_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMatch {
    /// Index of the slot holding the matched record.
    pub slot: u64,
    /// Index of the slot after it in the chain.
    pub next: u64,
    /// Byte offset of the matched record in the value log.
    pub offset: u64,
}

/// An instance of a store: slot table, value log and the per-bucket tail
/// cache, plus the injected codec and hasher.
pub struct Db<C = IdentityCodec, S = BuildHasherDefault<FxHasher>>
where
    C: Codec,
    S: BuildHasher + Default,
{
    slots: SlotTable,
    log: ValueLog,
    // Memoized tail slot per bucket.  An optimization only: populated by
    // appends, never consulted as a source of truth over the slot table.
    last_cache: FxHashMap<u64, u64>,
    meta: DbMeta,
    config: DbConfig,
    codec: C,
    hasher: S,
}

impl<C, S> Db<C, S>
where
    C: Codec,
    S: BuildHasher + Default,
{
    /// Open a new or existing store described by `config`, with a default
    /// constructed codec.
    pub fn open(config: DbConfig) -> Result<Self, OpenError>
    where
        C: Default,
    {
        Self::with_codec(config, C::default())
    }

    /// Open a new or existing store described by `config` using `codec`.
    ///
    /// An existing store's persisted parameters win over the configured
    /// ones.  With create mode, a *missing* metadata file means "build a
    /// fresh store"; an unreadable or corrupt one is always an error so a
    /// failing disk can never silently wipe a store.
    pub fn with_codec(config: DbConfig, codec: C) -> Result<Self, OpenError> {
        let meta_path = config.files.meta_path();
        let (meta, fresh) = if config.truncate {
            (DbMeta::from_config(&config), true)
        } else {
            match DbMeta::load(&meta_path) {
                Ok(meta) => (meta, false),
                Err(MetaError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    if config.create {
                        (DbMeta::from_config(&config), true)
                    } else {
                        return Err(OpenError::NotFound);
                    }
                }
                Err(e) => return Err(OpenError::MetaLoad(e)),
            }
        };
        let width = meta.pointer_width;
        // Overflow nodes get indices past bucket_count, so the mask itself
        // must leave pointer headroom.
        if meta.bucket_count >= width.max_pointer() {
            return Err(OpenError::BucketRange {
                bucket_count: meta.bucket_count,
                width: width.bytes(),
            });
        }
        let idx_backend = Backend::open(&config.files.idx_path(), config.buffered_index, fresh)
            .map_err(OpenError::IndexFileOpen)?;
        let log_backend = Backend::open(&config.files.db_path(), config.buffered_data, fresh)
            .map_err(OpenError::DataFileOpen)?;
        let mut slots = SlotTable::new(idx_backend, width);
        let mut log = ValueLog::new(log_backend, width);
        if fresh {
            // Head slots cover every index the mask can produce, 0..=mask.
            slots
                .initialize(meta.bucket_count + 1)
                .map_err(OpenError::IndexInit)?;
            log.truncate().map_err(OpenError::DataInit)?;
            meta.store(&meta_path).map_err(OpenError::MetaStore)?;
            debug!(
                base = %config.files.base().display(),
                bucket_count = meta.bucket_count,
                "created store"
            );
        } else {
            debug!(
                base = %config.files.base().display(),
                bucket_count = meta.bucket_count,
                "opened store"
            );
        }
        Ok(Self {
            slots,
            log,
            last_cache: FxHashMap::default(),
            meta,
            config,
            codec,
            hasher: S::default(),
        })
    }

    /// The bucket `key` hashes to: the 32 bit key hash masked by the
    /// configured bucket count.  Uniform, in-range buckets require a mask of
    /// the form `2^n - 1`; that is the caller's configuration contract.
    pub fn hash_to_bucket(&self, key: &[u8]) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        hasher.write(key);
        (hasher.finish() as u32 as u64) & self.meta.bucket_count
    }

    /// Encode `data` for `key` and append it to the key's bucket chain.
    pub fn push(&mut self, key: &[u8], data: &[u8]) -> Result<(), AppendError> {
        let encoded = self.codec.encode(key, data);
        let bucket = self.hash_to_bucket(key);
        self.append_raw(bucket, &encoded)
    }

    /// Append already encoded bytes to `bucket`'s chain.
    ///
    /// Writes the record, grows the chain by one overflow slot (the old tail
    /// sentinel becomes a live link) and remembers the new tail for O(1)
    /// follow-up appends.
    pub fn append_raw(&mut self, bucket: u64, raw: &[u8]) -> Result<(), AppendError> {
        let tail = self.last_node_of(bucket)?;
        let new_index = next_overflow_index(self.slots.len_slots()?, self.meta.bucket_count);
        let offset = self.log.append(raw)?;
        self.slots.write_slot(tail, new_index, offset)?;
        self.slots.write_slot(new_index, new_index, 0)?;
        self.last_cache.insert(bucket, new_index);
        Ok(())
    }

    /// Walk `key`'s chain oldest first and return the first node whose
    /// record passes the filter (the per-call filter, else the config
    /// default, else any present record matches).
    pub fn find_node(
        &mut self,
        key: &[u8],
        filter: Option<&KeyFilter>,
    ) -> Result<Option<NodeMatch>, FetchError> {
        let default = self.config.default_filter.clone();
        let pred = filter.or(default.as_deref());
        let bucket = self.hash_to_bucket(key);
        let mut slot = self.slots.read_slot(bucket)?;
        while let ChainLink::Next(next) = slot.link() {
            if let Some(raw) = self.log.read_at(slot.value)? {
                if pred.map_or(true, |p| p(key, &raw)) {
                    return Ok(Some(NodeMatch {
                        slot: slot.index,
                        next,
                        offset: slot.value,
                    }));
                }
            }
            slot = self.slots.read_slot(next)?;
        }
        Ok(None)
    }

    /// Decoded payload of the first record in `key`'s chain that passes the
    /// filter, or `None` when the bucket holds no matching record.
    pub fn get_one(
        &mut self,
        key: &[u8],
        filter: Option<&KeyFilter>,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        match self.find_node(key, filter)? {
            Some(found) => Ok(self
                .log
                .read_at(found.offset)?
                .map(|raw| self.codec.decode(key, &raw))),
            None => Ok(None),
        }
    }

    /// Every record in `key`'s bucket that passes the filter, decoded, in
    /// insertion order.
    ///
    /// The whole bucket is materialized first and filtered after; collided
    /// records from other keys are in there, and with no filter anywhere
    /// they are all returned.  Disambiguation is the filter's job.
    pub fn get_all(
        &mut self,
        key: &[u8],
        filter: Option<&KeyFilter>,
    ) -> Result<Vec<Vec<u8>>, FetchError> {
        let default = self.config.default_filter.clone();
        let pred = filter.or(default.as_deref());
        let bucket = self.hash_to_bucket(key);
        let records = self.chain_records(bucket)?;
        Ok(records
            .into_iter()
            .filter(|raw| pred.map_or(true, |p| p(key, raw)))
            .map(|raw| self.codec.decode(key, &raw))
            .collect())
    }

    /// Every stored (still encoded) record in `key`'s bucket, unfiltered.
    pub fn bucket_records(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>, FetchError> {
        let bucket = self.hash_to_bucket(key);
        self.chain_records(bucket)
    }

    /// Rewrite the first matching record for `key` in place, or append the
    /// record as new when no record matches.
    ///
    /// The in-place path may never change the record's footprint: a payload
    /// whose encoded length differs from the stored length fails with
    /// [`LogError::SizeMismatch`](crate::error::LogError::SizeMismatch) and
    /// the prior record stands.  Append a new record in that case.
    pub fn upsert(
        &mut self,
        key: &[u8],
        data: &[u8],
        filter: Option<&KeyFilter>,
    ) -> Result<(), UpdateError> {
        match self.find_node(key, filter)? {
            None => Ok(self.push(key, data)?),
            Some(found) => {
                let encoded = self.codec.encode(key, data);
                self.log
                    .overwrite_at(found.offset, &encoded)
                    .map_err(UpdateError::Log)
            }
        }
    }

    /// Add `amount` to the counter stored for `key` (an 8 byte little
    /// endian payload, so the in-place rewrite never changes its footprint)
    /// and return the new count.  A missing counter starts from zero.
    ///
    /// Plain read-modify-write; racing callers can lose updates.
    pub fn increment(
        &mut self,
        key: &[u8],
        amount: u64,
        filter: Option<&KeyFilter>,
    ) -> Result<u64, UpdateError> {
        let new = match self.get_one(key, filter)? {
            Some(bytes) => {
                let counter: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| UpdateError::BadCounter { len: bytes.len() })?;
                u64::from_le_bytes(counter).wrapping_add(amount)
            }
            None => amount,
        };
        self.upsert(key, &new.to_le_bytes(), filter)?;
        Ok(new)
    }

    /// Write any buffered state back to the store files and sync them.
    ///
    /// Buffered backends persist nothing until this is called; there is no
    /// implicit flush, not even on drop.
    pub fn flush(&mut self) -> Result<(), FlushError> {
        self.slots.flush_to_disk().map_err(FlushError::WriteIndex)?;
        self.log.flush_to_disk().map_err(FlushError::WriteData)?;
        self.slots.sync().map_err(FlushError::IndexSync)?;
        self.log.sync().map_err(FlushError::DataSync)?;
        debug!(base = %self.config.files.base().display(), "flushed store");
        Ok(())
    }

    /// Iterate every record payload in the value log in write order,
    /// ignoring the slot table.  Sees buffered contents.
    pub fn raw_iter(&self) -> io::Result<DbSnapshotIter> {
        Ok(DbRawIter::with_stream(
            self.log.snapshot_reader()?,
            self.meta.pointer_width,
        ))
    }

    /// Number of records in the value log.
    pub fn record_count(&mut self) -> Result<u64, FetchError> {
        let mut offset = 0u64;
        let mut count = 0u64;
        while let Some(payload) = self.log.read_at(offset)? {
            offset += (self.log.size_field_bytes() + payload.len()) as u64;
            count += 1;
        }
        Ok(count)
    }

    /// The store's bucket mask.
    pub fn bucket_count(&self) -> u64 {
        self.meta.bucket_count
    }

    /// The store's pointer width.
    pub fn pointer_width(&self) -> PointerWidth {
        self.meta.pointer_width
    }

    /// Tail slot of `bucket`'s chain: the cached value when an append
    /// already found it, otherwise a walk to the self-referencing slot
    /// (O(chain length), paid once per bucket per process).
    fn last_node_of(&mut self, bucket: u64) -> Result<u64, IndexError> {
        if let Some(&last) = self.last_cache.get(&bucket) {
            return Ok(last);
        }
        trace!(bucket, "cold tail walk");
        let mut current = bucket;
        while let Some(next) = self.slots.peek_next(current)? {
            if next == current {
                break;
            }
            current = next;
        }
        Ok(current)
    }

    fn chain_records(&mut self, bucket: u64) -> Result<Vec<Vec<u8>>, FetchError> {
        let mut records = Vec::new();
        let mut slot = self.slots.read_slot(bucket)?;
        while let ChainLink::Next(next) = slot.link() {
            if let Some(raw) = self.log.read_at(slot.value)? {
                records.push(raw);
            }
            slot = self.slots.read_slot(next)?;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{key_prefix_filter, KeyPrefixCodec};
    use crate::error::LogError;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    /// Hashes everything to 0; forces every key into one bucket.
    #[derive(Default)]
    struct ZeroHasher;

    impl Hasher for ZeroHasher {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    type TestDb = Db<IdentityCodec>;
    type PrefixDb = Db<KeyPrefixCodec>;
    type CollideDb = Db<KeyPrefixCodec, BuildHasherDefault<ZeroHasher>>;

    fn config(dir: &tempfile::TempDir, name: &str) -> DbConfig {
        DbConfig::new(dir.path().join(name))
            .set_bucket_count(255)
            .create()
    }

    #[test]
    fn push_then_get_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: TestDb = config(&dir, "basic").build().unwrap();
        db.push(b"alpha", b"one").unwrap();
        db.push(b"beta", b"two").unwrap();
        db.push(b"alpha", b"three").unwrap();

        let all = db.get_all(b"alpha", None).unwrap();
        assert!(all.contains(&b"one".to_vec()));
        assert!(all.contains(&b"three".to_vec()));
        assert_eq!(db.record_count().unwrap(), 3);
        // A filter nothing passes finds nothing.
        let none = db
            .get_one(b"alpha", Some(&|_: &[u8], d: &[u8]| d == &b"nope"[..]))
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn collisions_disambiguated_by_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: CollideDb = config(&dir, "collide").build().unwrap();
        db.push(b"k1", b"first of k1").unwrap();
        db.push(b"k2", b"only of k2").unwrap();
        db.push(b"k1", b"second of k1").unwrap();
        // Everything landed in bucket 0.
        assert_eq!(db.hash_to_bucket(b"k1"), db.hash_to_bucket(b"k2"));

        // Without a filter the whole bucket comes back, foreign records too.
        assert_eq!(db.get_all(b"k1", None).unwrap().len(), 3);

        let k1 = db.get_all(b"k1", Some(&key_prefix_filter)).unwrap();
        assert_eq!(k1, vec![b"first of k1".to_vec(), b"second of k1".to_vec()]);
        let k2 = db.get_all(b"k2", Some(&key_prefix_filter)).unwrap();
        assert_eq!(k2, vec![b"only of k2".to_vec()]);
        assert_eq!(
            db.get_one(b"k1", Some(&key_prefix_filter)).unwrap().unwrap(),
            b"first of k1"
        );
    }

    #[test]
    fn default_filter_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: CollideDb = config(&dir, "deffilter")
            .set_key_filter(key_prefix_filter)
            .build()
            .unwrap();
        db.push(b"k1", b"v1").unwrap();
        db.push(b"k2", b"v2").unwrap();
        assert_eq!(db.get_one(b"k2", None).unwrap().unwrap(), b"v2");
        assert_eq!(db.get_all(b"k1", None).unwrap(), vec![b"v1".to_vec()]);
    }

    #[test]
    fn first_overflow_slot_sits_past_the_head_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: TestDb = DbConfig::new(dir.path().join("growth"))
            .set_bucket_count(7)
            .create()
            .build()
            .unwrap();
        assert_eq!(db.slots.len_slots().unwrap(), 8);
        db.push(b"x", b"payload").unwrap();
        assert_eq!(db.slots.len_slots().unwrap(), 9);
        let bucket = db.hash_to_bucket(b"x");
        let head = db.slots.read_slot(bucket).unwrap();
        assert_eq!(head.link(), ChainLink::Next(8));
        let tail = db.slots.read_slot(8).unwrap();
        assert_eq!(tail.link(), ChainLink::Tail);
        assert_eq!(db.last_cache.get(&bucket), Some(&8));
    }

    #[test]
    fn chain_integrity_under_random_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: PrefixDb = DbConfig::new(dir.path().join("fuzz"))
            .set_bucket_count(15)
            .create()
            .build()
            .unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut expected: HashMap<String, Vec<String>> = HashMap::new();
        for i in 0..500 {
            let key = format!("key{}", rng.gen_range(0..50));
            let val = format!("value {}", i);
            db.push(key.as_bytes(), val.as_bytes()).unwrap();
            expected.entry(key).or_default().push(val);
        }

        // Every chain terminates in a bounded number of steps.
        for bucket in 0..=db.bucket_count() {
            let mut steps = 0;
            let mut slot = db.slots.read_slot(bucket).unwrap();
            while let ChainLink::Next(next) = slot.link() {
                steps += 1;
                assert!(steps <= 501, "chain for bucket {} does not terminate", bucket);
                slot = db.slots.read_slot(next).unwrap();
            }
        }

        // And every key reads back exactly its own values, oldest first.
        for (key, vals) in &expected {
            let got = db.get_all(key.as_bytes(), Some(&key_prefix_filter)).unwrap();
            let got: Vec<String> = got
                .into_iter()
                .map(|v| String::from_utf8(v).unwrap())
                .collect();
            assert_eq!(&got, vals, "mismatch for {}", key);
        }
    }

    #[test]
    fn upsert_rewrites_in_place_only_for_same_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: CollideDb = config(&dir, "upsert").build().unwrap();
        db.push(b"k1", b"aaaa").unwrap();
        db.push(b"k2", b"other").unwrap();

        db.upsert(b"k1", b"bbbb", Some(&key_prefix_filter)).unwrap();
        assert_eq!(
            db.get_one(b"k1", Some(&key_prefix_filter)).unwrap().unwrap(),
            b"bbbb"
        );
        assert_eq!(db.record_count().unwrap(), 2);

        match db.upsert(b"k1", b"much longer now", Some(&key_prefix_filter)) {
            Err(UpdateError::Log(LogError::SizeMismatch { stored, new, .. })) => {
                assert_eq!(stored, 3 + 4); // "k1:" + payload
                assert_eq!(new, 3 + 15);
            }
            other => panic!("expected SizeMismatch, got {:?}", other),
        }
        // Prior record untouched.
        assert_eq!(
            db.get_one(b"k1", Some(&key_prefix_filter)).unwrap().unwrap(),
            b"bbbb"
        );

        // No match appends as new.
        db.upsert(b"k3", b"fresh", Some(&key_prefix_filter)).unwrap();
        assert_eq!(
            db.get_one(b"k3", Some(&key_prefix_filter)).unwrap().unwrap(),
            b"fresh"
        );
    }

    #[test]
    fn increment_counts_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("counts");
        {
            let mut db: CollideDb = DbConfig::new(&base)
                .set_bucket_count(255)
                .create()
                .build()
                .unwrap();
            assert_eq!(db.increment(b"hits", 5, Some(&key_prefix_filter)).unwrap(), 5);
            assert_eq!(db.increment(b"hits", 7, Some(&key_prefix_filter)).unwrap(), 12);
            assert_eq!(db.increment(b"miss", 1, Some(&key_prefix_filter)).unwrap(), 1);
            db.flush().unwrap();
        }
        let mut db: CollideDb = DbConfig::new(&base).build().unwrap();
        assert_eq!(db.increment(b"hits", 1, Some(&key_prefix_filter)).unwrap(), 13);
    }

    #[test]
    fn reopen_reproduces_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("reopen");
        let written: Vec<(String, String)> = (0..100)
            .map(|i| (format!("key{}", i % 17), format!("record number {}", i)))
            .collect();
        {
            let mut db: PrefixDb = DbConfig::new(&base)
                .set_bucket_count(255)
                .create()
                .build()
                .unwrap();
            for (k, v) in &written {
                db.push(k.as_bytes(), v.as_bytes()).unwrap();
            }
            db.flush().unwrap();
        }
        let mut db: PrefixDb = DbConfig::new(&base).build().unwrap();
        assert_eq!(db.record_count().unwrap(), 100);
        for (k, _) in &written {
            let got = db.get_all(k.as_bytes(), Some(&key_prefix_filter)).unwrap();
            let want: Vec<Vec<u8>> = written
                .iter()
                .filter(|(wk, _)| wk == k)
                .map(|(_, wv)| wv.clone().into_bytes())
                .collect();
            assert_eq!(got, want);
        }
        // Raw order is write order.
        let raw: Vec<Vec<u8>> = db.raw_iter().unwrap().collect();
        let want_raw: Vec<Vec<u8>> = written
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v).into_bytes())
            .collect();
        assert_eq!(raw, want_raw);
    }

    #[test]
    fn missing_store_without_create_errors() {
        let dir = tempfile::tempdir().unwrap();
        let res: Result<TestDb, _> = DbConfig::new(dir.path().join("nothere")).build();
        assert!(matches!(res, Err(OpenError::NotFound)));
    }

    #[test]
    fn corrupt_meta_is_never_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("damaged");
        {
            let mut db: TestDb = DbConfig::new(&base).set_bucket_count(255).create().build().unwrap();
            db.push(b"k", b"v").unwrap();
            db.flush().unwrap();
        }
        std::fs::write(crate::db_files::DbFiles::new(&base).meta_path(), b"{broken").unwrap();
        // Even in create mode the store must not be silently rebuilt.
        let res: Result<TestDb, _> = DbConfig::new(&base).create().build();
        assert!(matches!(res, Err(OpenError::MetaLoad(_))));
        // The data file survived the failed open.
        assert!(std::fs::metadata(crate::db_files::DbFiles::new(&base).db_path()).unwrap().len() > 0);
    }

    #[test]
    fn truncate_rebuilds_with_new_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("rebuild");
        {
            let mut db: TestDb = DbConfig::new(&base).set_bucket_count(255).create().build().unwrap();
            db.push(b"k", b"v").unwrap();
            db.flush().unwrap();
        }
        let mut db: TestDb = DbConfig::new(&base)
            .set_bucket_count(15)
            .truncate()
            .build()
            .unwrap();
        assert_eq!(db.bucket_count(), 15);
        assert_eq!(db.record_count().unwrap(), 0);
        assert_eq!(db.slots.len_slots().unwrap(), 16);
    }

    #[test]
    fn buffered_store_persists_only_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("ram");
        let files = crate::db_files::DbFiles::new(&base);
        {
            let mut db: PrefixDb = DbConfig::new(&base)
                .set_bucket_count(15)
                .buffered_index()
                .buffered_data()
                .create()
                .build()
                .unwrap();
            db.push(b"k", b"in memory").unwrap();
            // Served from the buffers.
            assert_eq!(
                db.get_one(b"k", Some(&key_prefix_filter)).unwrap().unwrap(),
                b"in memory"
            );
            // Nothing on disk yet.
            assert_eq!(std::fs::metadata(files.idx_path()).unwrap().len(), 0);
            assert_eq!(std::fs::metadata(files.db_path()).unwrap().len(), 0);
            // The snapshot iterator still sees the buffered log.
            let raw: Vec<Vec<u8>> = db.raw_iter().unwrap().collect();
            assert_eq!(raw, vec![b"k:in memory".to_vec()]);
            db.flush().unwrap();
            assert!(std::fs::metadata(files.idx_path()).unwrap().len() > 0);
        }
        let mut db: PrefixDb = DbConfig::new(&base).build().unwrap();
        assert_eq!(
            db.get_one(b"k", Some(&key_prefix_filter)).unwrap().unwrap(),
            b"in memory"
        );
    }

    #[test]
    fn bucket_mask_must_fit_pointer_width() {
        let dir = tempfile::tempdir().unwrap();
        let res: Result<TestDb, _> = DbConfig::new(dir.path().join("wide"))
            .set_bucket_count(0xFFFF)
            .set_pointer_width(PointerWidth::W2)
            .create()
            .build();
        assert!(matches!(res, Err(OpenError::BucketRange { .. })));
    }

    // The 255 bucket / 1000 key scenario: every record carries its bucket as
    // a prefix, and filtered per-bucket reads account for every insert.
    #[test]
    fn bucket_prefix_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut db: TestDb = DbConfig::new(dir.path().join("scenario"))
            .set_bucket_count(255)
            .create()
            .build()
            .unwrap();
        let mut per_bucket: HashMap<u64, u64> = HashMap::new();
        for i in 0..1000u32 {
            let key = i.to_string();
            let bucket = db.hash_to_bucket(key.as_bytes());
            let payload = format!("{}:{}", bucket, i);
            db.push(key.as_bytes(), payload.as_bytes()).unwrap();
            *per_bucket.entry(bucket).or_default() += 1;
        }

        for i in 0..1000u32 {
            let key = i.to_string();
            let bucket = db.hash_to_bucket(key.as_bytes());
            let prefix = format!("{}:", bucket);
            let filter = move |_k: &[u8], d: &[u8]| d.starts_with(prefix.as_bytes());
            let got = db.get_all(key.as_bytes(), Some(&filter)).unwrap();
            // All records in a bucket share its prefix, so the filter keeps
            // the whole chain.
            assert_eq!(got.len() as u64, per_bucket[&bucket], "bucket {}", bucket);
        }
        assert_eq!(per_bucket.values().sum::<u64>(), 1000);
        assert_eq!(db.record_count().unwrap(), 1000);
    }
}
