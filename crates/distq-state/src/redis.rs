//! Redis backend.
//!
//! Wraps a [`ConnectionManager`](::redis::aio::ConnectionManager), which
//! multiplexes commands over one connection and reconnects on failure.
//! Each call clones the manager handle; commands are sent exactly once and
//! errors are returned to the caller unchanged.

use std::collections::HashMap;
use std::time::Duration;

use ::redis::AsyncCommands;
use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::debug;

use crate::error::{StateError, StateResult};

/// Reconnect attempts before a connect or reconnect gives up.
const CONNECT_RETRIES: usize = 2;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to the Redis server at `url` (e.g. `redis://host:6379/0`).
    pub async fn connect(url: &str) -> StateResult<Self> {
        let client = ::redis::Client::open(url).map_err(map_err!(Connect))?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECT_RETRIES)
            .set_connection_timeout(CONNECT_TIMEOUT);
        let conn = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(map_err!(Connect))?;
        debug!("redis connection manager ready");
        Ok(Self { conn })
    }

    /// Round-trip a `PING`; anything but `PONG` is a connect error.
    pub async fn ping(&self) -> StateResult<()> {
        let mut conn = self.conn.clone();
        let reply: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_err!(Connect))?;
        if reply != "PONG" {
            return Err(StateError::Connect(format!("unexpected PING reply: {reply}")));
        }
        Ok(())
    }

    pub async fn set(&self, key: &str, value: &str) -> StateResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.map_err(map_err!(Redis))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> StateResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_err!(Redis))
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> StateResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hset(key, field, value).await.map_err(map_err!(Redis))?;
        Ok(())
    }

    pub async fn hget(&self, key: &str, field: &str) -> StateResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.hget(key, field).await.map_err(map_err!(Redis))
    }

    pub async fn hgetall(&self, key: &str) -> StateResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(map_err!(Redis))
    }

    pub async fn hdel(&self, key: &str, field: &str) -> StateResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.hdel(key, field).await.map_err(map_err!(Redis))?;
        Ok(removed > 0)
    }

    pub async fn exists(&self, key: &str) -> StateResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(map_err!(Redis))
    }
}
