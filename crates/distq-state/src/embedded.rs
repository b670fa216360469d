//! EmbeddedStore: redb-backed string and hash storage.
//!
//! Strings live in one table keyed by the full key. Hash fields live in a
//! second table keyed by `{key}\x1f{field}`, so all fields of one hash are
//! contiguous and can be read with a single range scan. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, TableDefinition};
use tracing::debug;

use crate::error::StateResult;

/// Plain string values keyed by `{key}`.
const STRINGS: TableDefinition<&str, &str> = TableDefinition::new("strings");

/// Hash fields keyed by `{key}\x1f{field}`.
const HASH_FIELDS: TableDefinition<&str, &str> = TableDefinition::new("hash_fields");

/// Separates a hash key from its field name. Never appears in our keys.
const FIELD_SEP: char = '\x1f';

fn field_key(key: &str, field: &str) -> String {
    format!("{key}{FIELD_SEP}{field}")
}

fn field_prefix(key: &str) -> String {
    format!("{key}{FIELD_SEP}")
}

/// Thread-safe key-value store backed by redb.
#[derive(Clone)]
pub struct EmbeddedStore {
    db: Arc<Database>,
}

impl EmbeddedStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "embedded store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory embedded store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(STRINGS).map_err(map_err!(Table))?;
        txn.open_table(HASH_FIELDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn put(
        &self,
        table_def: TableDefinition<'static, &'static str, &'static str>,
        key: &str,
        value: &str,
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Strings ────────────────────────────────────────────────────

    pub fn set(&self, key: &str, value: &str) -> StateResult<()> {
        self.put(STRINGS, key, value)
    }

    pub fn get(&self, key: &str) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(STRINGS).map_err(map_err!(Table))?;
        let value = table
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    // ── Hashes ─────────────────────────────────────────────────────

    pub fn hset(&self, key: &str, field: &str, value: &str) -> StateResult<()> {
        self.put(HASH_FIELDS, &field_key(key, field), value)
    }

    pub fn hget(&self, key: &str, field: &str) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(HASH_FIELDS).map_err(map_err!(Table))?;
        let value = table
            .get(field_key(key, field).as_str())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    /// All fields of a hash. A missing hash is an empty map.
    pub fn hgetall(&self, key: &str) -> StateResult<HashMap<String, String>> {
        let prefix = field_prefix(key);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(HASH_FIELDS).map_err(map_err!(Table))?;
        let mut fields = HashMap::new();
        for entry in table.range::<&str>(prefix.as_str()..).map_err(map_err!(Read))? {
            let (k, v) = entry.map_err(map_err!(Read))?;
            let Some(field) = k.value().strip_prefix(prefix.as_str()) else {
                break;
            };
            fields.insert(field.to_string(), v.value().to_string());
        }
        Ok(fields)
    }

    /// Remove one hash field. Returns true if it existed.
    pub fn hdel(&self, key: &str, field: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(HASH_FIELDS).map_err(map_err!(Table))?;
            existed = table
                .remove(field_key(key, field).as_str())
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// True if `key` holds a string or a hash with at least one field.
    pub fn exists(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let strings = txn.open_table(STRINGS).map_err(map_err!(Table))?;
        if strings.get(key).map_err(map_err!(Read))?.is_some() {
            return Ok(true);
        }
        let prefix = field_prefix(key);
        let hashes = txn.open_table(HASH_FIELDS).map_err(map_err!(Table))?;
        let mut range = hashes.range::<&str>(prefix.as_str()..).map_err(map_err!(Read))?;
        match range.next() {
            Some(entry) => {
                let (k, _) = entry.map_err(map_err!(Read))?;
                Ok(k.value().starts_with(prefix.as_str()))
            }
            None => Ok(false),
        }
    }
}
