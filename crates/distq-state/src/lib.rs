//! distq-state: key-value store adapter for distq.
//!
//! The store of record is an external Redis instance; an embedded
//! [redb](https://docs.rs/redb) backend offers the same string and hash
//! operations for single-node deployments and tests.
//!
//! # Architecture
//!
//! `KvStore` exposes the handful of operations the registry and query
//! lifecycle need: `set`/`get` for plain strings, `hset`/`hget`/`hgetall`/`hdel`
//! for hashes, and `exists`. There are no transactions. Callers that
//! touch several keys issue independent calls in a fixed order.
//!
//! The key layout lives in [`keys`].

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}

pub mod embedded;
pub mod error;
pub mod keys;
pub mod redis;
pub mod store;

pub use embedded::EmbeddedStore;
pub use error::{StateError, StateResult};
pub use self::redis::RedisStore;
pub use store::KvStore;
