//! World-state store
//!
//! The engine only ever sees three operations on the world state: latest
//! value lookup, versioned write, and a full per-key version history. The
//! commit boundary lives here: every operation runs inside a transaction
//! whose buffered writes become durable all-or-nothing on `commit`, and
//! vanish entirely if the transaction is dropped.
//!
//! # Column Families (RocksDB backend)
//!
//! - `state` - Latest value per key (key: customer_id)
//! - `history` - Committed versions (key: customer_id || 0x00 || seq)
//! - `meta` - Per-key version counter (key: customer_id)

use crate::{error::{Error, Result}, Config};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Column family names
const CF_STATE: &str = "state";
const CF_HISTORY: &str = "history";
const CF_META: &str = "meta";

/// One committed version of a key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVersion {
    /// Transaction that committed this version
    pub tx_id: String,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,

    /// Value bytes as written
    pub value: Vec<u8>,

    /// Whether this version deleted the key
    pub is_delete: bool,
}

/// Lazy, finite, forward-only sequence over a key's version log,
/// oldest-first. Callers drain or abandon the full sequence.
pub type HistoryIter<'a> = Box<dyn Iterator<Item = Result<KeyVersion>> + 'a>;

/// Per-transaction view of the world state
pub trait WorldState {
    /// Latest committed value for `key`, or `None`. Writes buffered in the
    /// same transaction are visible.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Buffer a new version of `key`; durable once the transaction commits.
    /// Keys must not contain NUL bytes, which the history key layout
    /// reserves as a separator.
    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Committed version history for `key`, oldest-first. Buffered writes
    /// from this transaction are not included.
    fn get_history(&self, key: &str) -> Result<HistoryIter<'_>>;
}

/// An in-progress transaction against a [`LedgerStore`]
///
/// Dropping without committing abandons every buffered write.
pub trait StoreTransaction: WorldState + Send {
    /// Commit all buffered writes atomically.
    fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// A versioned key-value store that backs one ledger
///
/// Passed explicitly, never a process-wide singleton; independent stores
/// (and therefore independent ledgers) can coexist in one process.
pub trait LedgerStore: Send + Sync + 'static {
    /// The transaction type used by this backend.
    type Tx: StoreTransaction;

    /// Begin a transaction. `tx_id` and `timestamp` are recorded on every
    /// version the transaction commits.
    fn begin(&self, tx_id: &str, timestamp: DateTime<Utc>) -> Result<Self::Tx>;
}

/// Buffered write set shared by both backends. One final value per key,
/// first-write order preserved for deterministic commits.
#[derive(Debug, Default)]
struct WriteSet {
    writes: Vec<(String, Vec<u8>)>,
}

/// NUL is the history-key separator; a key carrying one would make its
/// versions land inside another key's prefix scan.
fn check_key(key: &str) -> Result<()> {
    if key.contains('\0') {
        return Err(Error::Validation(
            "key cannot contain NUL bytes".to_string(),
        ));
    }
    Ok(())
}

impl WriteSet {
    fn put(&mut self, key: &str, value: Vec<u8>) {
        if let Some(entry) = self.writes.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.writes.push((key.to_string(), value));
        }
    }

    fn get(&self, key: &str) -> Option<&[u8]> {
        self.writes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-process versioned store, primarily for tests and embedders
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<KeyVersion>>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with at least one committed version
    pub fn key_count(&self) -> usize {
        self.inner.read().len()
    }
}

impl LedgerStore for MemoryStore {
    type Tx = MemoryTransaction;

    fn begin(&self, tx_id: &str, timestamp: DateTime<Utc>) -> Result<MemoryTransaction> {
        Ok(MemoryTransaction {
            store: self.clone(),
            tx_id: tx_id.to_string(),
            timestamp,
            writes: WriteSet::default(),
        })
    }
}

/// Transaction over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryTransaction {
    store: MemoryStore,
    tx_id: String,
    timestamp: DateTime<Utc>,
    writes: WriteSet,
}

impl WorldState for MemoryTransaction {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.to_vec()));
        }
        let inner = self.store.inner.read();
        Ok(inner
            .get(key)
            .and_then(|versions| versions.last())
            .filter(|version| !version.is_delete)
            .map(|version| version.value.clone()))
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        check_key(key)?;
        self.writes.put(key, value);
        Ok(())
    }

    fn get_history(&self, key: &str) -> Result<HistoryIter<'_>> {
        let versions = self
            .store
            .inner
            .read()
            .get(key)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(versions.into_iter().map(Ok)))
    }
}

impl StoreTransaction for MemoryTransaction {
    fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let mut inner = self.store.inner.write();
        for (key, value) in self.writes.writes {
            inner.entry(key).or_default().push(KeyVersion {
                tx_id: self.tx_id.clone(),
                timestamp: self.timestamp,
                value,
                is_delete: false,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RocksDB backend
// ---------------------------------------------------------------------------

/// RocksDB-backed versioned store
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    /// Open or create the database under `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy history log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_STATE, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_HISTORY, Self::cf_options_history()),
            ColumnFamilyDescriptor::new(CF_META, Self::cf_options_meta()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB world state at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Latest values are read on every operation, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_history() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_meta() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
        db.cf_handle(name)
            .ok_or_else(|| Error::Store(format!("Column family {} not found", name)))
    }

    /// History key layout: key bytes || 0x00 || big-endian sequence number.
    /// Big-endian keeps versions in commit order under lexicographic scans.
    fn history_key(key: &str, seq: u64) -> Vec<u8> {
        let mut bytes = key.as_bytes().to_vec();
        bytes.push(0u8);
        bytes.extend_from_slice(&seq.to_be_bytes());
        bytes
    }

    fn committed_seq(db: &DB, key: &str) -> Result<u64> {
        let cf = Self::cf_handle(db, CF_META)?;
        match db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Store(format!("corrupt version counter for '{}'", key)))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }
}

impl LedgerStore for RocksStore {
    type Tx = RocksTransaction;

    fn begin(&self, tx_id: &str, timestamp: DateTime<Utc>) -> Result<RocksTransaction> {
        Ok(RocksTransaction {
            db: self.db.clone(),
            tx_id: tx_id.to_string(),
            timestamp,
            writes: WriteSet::default(),
        })
    }
}

/// Transaction over a [`RocksStore`]
///
/// Writes are buffered and committed through a single `WriteBatch`, so the
/// latest value, the history entry, and the version counter for every
/// touched key land together or not at all.
pub struct RocksTransaction {
    db: Arc<DB>,
    tx_id: String,
    timestamp: DateTime<Utc>,
    writes: WriteSet,
}

impl WorldState for RocksTransaction {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.to_vec()));
        }
        let cf = RocksStore::cf_handle(&self.db, CF_STATE)?;
        Ok(self.db.get_cf(cf, key.as_bytes())?)
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        check_key(key)?;
        self.writes.put(key, value);
        Ok(())
    }

    fn get_history(&self, key: &str) -> Result<HistoryIter<'_>> {
        let cf = RocksStore::cf_handle(&self.db, CF_HISTORY)?;

        let mut prefix = key.as_bytes().to_vec();
        prefix.push(0u8);

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let entries = iter
            .map(|item| item.map_err(Error::from))
            .take_while(move |item| match item {
                Ok((k, _)) => k.starts_with(&prefix),
                // Let errors through so the caller sees them
                Err(_) => true,
            })
            .map(|item| {
                let (_, value) = item?;
                let version: KeyVersion = serde_json::from_slice(&value)?;
                Ok(version)
            });

        Ok(Box::new(entries))
    }
}

impl StoreTransaction for RocksTransaction {
    fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let cf_state = RocksStore::cf_handle(&self.db, CF_STATE)?;
        let cf_history = RocksStore::cf_handle(&self.db, CF_HISTORY)?;
        let cf_meta = RocksStore::cf_handle(&self.db, CF_META)?;

        let mut batch = WriteBatch::default();

        // The submission layer serializes commits, so reading the counter
        // outside the batch is safe.
        for (key, value) in &self.writes.writes {
            let seq = RocksStore::committed_seq(&self.db, key)? + 1;

            batch.put_cf(cf_state, key.as_bytes(), value);

            let version = KeyVersion {
                tx_id: self.tx_id.clone(),
                timestamp: self.timestamp,
                value: value.clone(),
                is_delete: false,
            };
            batch.put_cf(
                cf_history,
                RocksStore::history_key(key, seq),
                serde_json::to_vec(&version)?,
            );

            batch.put_cf(cf_meta, key.as_bytes(), seq.to_be_bytes());
        }

        self.db.write(batch)?;

        tracing::debug!(
            tx_id = %self.tx_id,
            keys = self.writes.writes.len(),
            "Transaction committed"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rocks_store() -> (RocksStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (RocksStore::open(&config).unwrap(), temp_dir)
    }

    fn commit_value(store: &impl LedgerStore, tx_id: &str, key: &str, value: &[u8]) {
        let mut tx = store.begin(tx_id, Utc::now()).unwrap();
        tx.put(key, value.to_vec()).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn memory_get_missing_key() {
        let store = MemoryStore::new();
        let tx = store.begin("tx-1", Utc::now()).unwrap();
        assert!(tx.get("nobody").unwrap().is_none());
    }

    #[test]
    fn memory_read_your_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin("tx-1", Utc::now()).unwrap();

        tx.put("alice", b"v1".to_vec()).unwrap();
        assert_eq!(tx.get("alice").unwrap().unwrap(), b"v1");

        // Not visible to other transactions until commit
        let other = store.begin("tx-2", Utc::now()).unwrap();
        assert!(other.get("alice").unwrap().is_none());

        tx.commit().unwrap();
        let after = store.begin("tx-3", Utc::now()).unwrap();
        assert_eq!(after.get("alice").unwrap().unwrap(), b"v1");
    }

    #[test]
    fn memory_abandoned_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let mut tx = store.begin("tx-1", Utc::now()).unwrap();
        tx.put("alice", b"v1".to_vec()).unwrap();
        drop(tx);

        assert_eq!(store.key_count(), 0);
        let probe = store.begin("tx-2", Utc::now()).unwrap();
        assert!(probe.get("alice").unwrap().is_none());
        assert_eq!(probe.get_history("alice").unwrap().count(), 0);
    }

    #[test]
    fn memory_history_preserves_commit_order() {
        let store = MemoryStore::new();
        commit_value(&store, "tx-1", "alice", b"v1");
        commit_value(&store, "tx-2", "alice", b"v2");
        commit_value(&store, "tx-3", "alice", b"v3");

        let tx = store.begin("tx-4", Utc::now()).unwrap();
        let versions: Vec<KeyVersion> = tx
            .get_history("alice")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].value, b"v1");
        assert_eq!(versions[2].value, b"v3");
        assert_eq!(versions[1].tx_id, "tx-2");
        assert!(versions.iter().all(|v| !v.is_delete));
    }

    #[test]
    fn memory_history_excludes_buffered_writes() {
        let store = MemoryStore::new();
        commit_value(&store, "tx-1", "alice", b"v1");

        let mut tx = store.begin("tx-2", Utc::now()).unwrap();
        tx.put("alice", b"v2".to_vec()).unwrap();
        assert_eq!(tx.get_history("alice").unwrap().count(), 1);
    }

    #[test]
    fn rocks_open_and_roundtrip() {
        let (store, _temp) = rocks_store();
        commit_value(&store, "tx-1", "alice", b"v1");

        let tx = store.begin("tx-2", Utc::now()).unwrap();
        assert_eq!(tx.get("alice").unwrap().unwrap(), b"v1");
        assert!(tx.get("bob").unwrap().is_none());
    }

    #[test]
    fn rocks_history_order_and_content() {
        let (store, _temp) = rocks_store();
        commit_value(&store, "tx-1", "alice", b"v1");
        commit_value(&store, "tx-2", "alice", b"v2");
        // A second key must not leak into alice's history
        commit_value(&store, "tx-3", "alice2", b"other");

        let tx = store.begin("tx-4", Utc::now()).unwrap();
        let versions: Vec<KeyVersion> = tx
            .get_history("alice")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].tx_id, "tx-1");
        assert_eq!(versions[0].value, b"v1");
        assert_eq!(versions[1].tx_id, "tx-2");
        assert_eq!(versions[1].value, b"v2");
    }

    #[test]
    fn rocks_multi_key_commit_is_atomic() {
        let (store, _temp) = rocks_store();

        let mut tx = store.begin("tx-1", Utc::now()).unwrap();
        tx.put("alice", b"a".to_vec()).unwrap();
        tx.put("bob", b"b".to_vec()).unwrap();
        tx.commit().unwrap();

        let probe = store.begin("tx-2", Utc::now()).unwrap();
        assert_eq!(probe.get("alice").unwrap().unwrap(), b"a");
        assert_eq!(probe.get("bob").unwrap().unwrap(), b"b");

        let alice_history: Vec<KeyVersion> = probe
            .get_history("alice")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(alice_history.len(), 1);
        assert_eq!(alice_history[0].tx_id, "tx-1");
    }

    #[test]
    fn rocks_abandoned_transaction_leaves_no_trace() {
        let (store, _temp) = rocks_store();
        commit_value(&store, "tx-1", "alice", b"v1");

        let mut tx = store.begin("tx-2", Utc::now()).unwrap();
        tx.put("alice", b"v2".to_vec()).unwrap();
        drop(tx);

        let probe = store.begin("tx-3", Utc::now()).unwrap();
        assert_eq!(probe.get("alice").unwrap().unwrap(), b"v1");
        assert_eq!(probe.get_history("alice").unwrap().count(), 1);
    }

    #[test]
    fn put_rejects_nul_bytes_in_keys() {
        let store = MemoryStore::new();
        let mut tx = store.begin("tx-1", Utc::now()).unwrap();
        assert_eq!(
            tx.put("a\0b", b"v".to_vec()).unwrap_err().kind(),
            "validation"
        );

        let (rocks, _temp) = rocks_store();
        let mut tx = rocks.begin("tx-1", Utc::now()).unwrap();
        assert_eq!(
            tx.put("a\0b", b"v".to_vec()).unwrap_err().kind(),
            "validation"
        );
        drop(tx);

        // With NUL keys rejected, a key's prefix scan can only ever see
        // its own versions
        commit_value(&rocks, "tx-2", "a", b"v1");
        let probe = rocks.begin("tx-3", Utc::now()).unwrap();
        let versions: Vec<KeyVersion> = probe
            .get_history("a")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].value, b"v1");
    }

    #[test]
    fn write_set_keeps_last_value_per_key() {
        let mut writes = WriteSet::default();
        writes.put("alice", b"v1".to_vec());
        writes.put("bob", b"b1".to_vec());
        writes.put("alice", b"v2".to_vec());

        assert_eq!(writes.writes.len(), 2);
        assert_eq!(writes.get("alice").unwrap(), b"v2");
        assert_eq!(writes.writes[0].0, "alice");
    }
}
