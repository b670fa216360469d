//! KvStore: the backend-agnostic handle used by the rest of distq.
//!
//! `KvStore` is `Clone` + `Send` + `Sync` and can be shared across request
//! handlers. Multi-key updates are sequences of independent calls; a
//! failure part way through leaves the earlier writes in place.

use std::collections::HashMap;

use distq_core::{StoreBackend, StoreConfig};
use tracing::{debug, info};

use crate::embedded::EmbeddedStore;
use crate::error::StateResult;
use crate::redis::RedisStore;

#[derive(Clone)]
pub enum KvStore {
    Embedded(EmbeddedStore),
    Redis(RedisStore),
}

impl KvStore {
    /// Open the configured backend and verify it answers.
    ///
    /// The server must not accept traffic against an unreachable store, so
    /// callers treat an error here as fatal.
    pub async fn connect(config: &StoreConfig) -> StateResult<Self> {
        let store = match config.backend {
            StoreBackend::Redis => Self::Redis(RedisStore::connect(&config.redis_url).await?),
            StoreBackend::Embedded => {
                if let Some(parent) = config.path.parent() {
                    std::fs::create_dir_all(parent).map_err(map_err!(Open))?;
                }
                Self::Embedded(EmbeddedStore::open(&config.path)?)
            }
        };
        store.ping().await?;
        info!(backend = %config.backend, "key-value store reachable");
        Ok(store)
    }

    /// Ephemeral embedded store (for testing).
    pub fn in_memory() -> StateResult<Self> {
        Ok(Self::Embedded(EmbeddedStore::open_in_memory()?))
    }

    pub fn backend(&self) -> StoreBackend {
        match self {
            Self::Embedded(_) => StoreBackend::Embedded,
            Self::Redis(_) => StoreBackend::Redis,
        }
    }

    pub async fn ping(&self) -> StateResult<()> {
        match self {
            // A read transaction proves the file is open and readable.
            Self::Embedded(store) => store.exists("").map(|_| ()),
            Self::Redis(store) => store.ping().await,
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> StateResult<()> {
        match self {
            Self::Embedded(store) => store.set(key, value)?,
            Self::Redis(store) => store.set(key, value).await?,
        }
        debug!(%key, "string stored");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> StateResult<Option<String>> {
        match self {
            Self::Embedded(store) => store.get(key),
            Self::Redis(store) => store.get(key).await,
        }
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> StateResult<()> {
        match self {
            Self::Embedded(store) => store.hset(key, field, value)?,
            Self::Redis(store) => store.hset(key, field, value).await?,
        }
        debug!(%key, %field, "hash field stored");
        Ok(())
    }

    pub async fn hget(&self, key: &str, field: &str) -> StateResult<Option<String>> {
        match self {
            Self::Embedded(store) => store.hget(key, field),
            Self::Redis(store) => store.hget(key, field).await,
        }
    }

    pub async fn hgetall(&self, key: &str) -> StateResult<HashMap<String, String>> {
        match self {
            Self::Embedded(store) => store.hgetall(key),
            Self::Redis(store) => store.hgetall(key).await,
        }
    }

    /// Remove one hash field. Returns true if it existed.
    pub async fn hdel(&self, key: &str, field: &str) -> StateResult<bool> {
        let existed = match self {
            Self::Embedded(store) => store.hdel(key, field)?,
            Self::Redis(store) => store.hdel(key, field).await?,
        };
        debug!(%key, %field, existed, "hash field deleted");
        Ok(existed)
    }

    pub async fn exists(&self, key: &str) -> StateResult<bool> {
        match self {
            Self::Embedded(store) => store.exists(key),
            Self::Redis(store) => store.exists(key).await,
        }
    }
}
