//! QueryStore: scheduling, polling and result reporting.
//!
//! Each scheduled query is written to three hashes: the node's permanent
//! query map, the global pending index and the node's pending index. A
//! report moves it to the global complete record and removes it from both
//! pending indices. Both sequences run in that order and stop at the first
//! store error; earlier writes are not rolled back.

use std::collections::BTreeMap;

use distq_core::{TOKEN_LEN, random_token};
use distq_state::{KvStore, keys};
use serde_json::value::RawValue;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{NodeRegistry, redact};
use crate::types::*;

#[derive(Clone)]
pub struct QueryStore {
    store: KvStore,
    registry: NodeRegistry,
}

impl QueryStore {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            store: registry.store().clone(),
            registry,
        }
    }

    /// Schedule `sql` for the host enrolled as `uuid`. Returns the query name.
    pub async fn schedule(&self, uuid: &str, sql: &str) -> RegistryResult<String> {
        let (node_key, _) = self.registry.lookup(uuid).await?;
        let name = random_token(TOKEN_LEN)?;

        self.store.hset(&keys::node_queries(&node_key), &name, sql).await?;
        self.store.hset(keys::PENDING_QUERIES, &name, sql).await?;
        self.store
            .hset(&keys::node_pending_queries(&node_key), &name, sql)
            .await?;

        info!(%uuid, query_name = %name, "query scheduled");
        Ok(name)
    }

    /// Pending queries for a node key, by name.
    pub async fn poll(&self, node_key: &str) -> RegistryResult<BTreeMap<String, String>> {
        let pending = self
            .store
            .hgetall(&keys::node_pending_queries(node_key))
            .await?;
        if !pending.is_empty() {
            debug!(node_key = %redact(node_key), count = pending.len(), "handing out pending queries");
        }
        Ok(pending.into_iter().collect())
    }

    /// Record the results an agent reported.
    ///
    /// Only names pending for `node_key` are completed, each with its payload
    /// stored verbatim whatever its status code. Any other name is left
    /// untouched and listed in `not_pending`, so a completed result is never
    /// overwritten. Status codes for names missing from `results` are
    /// ignored and listed in `orphaned_statuses`.
    pub async fn report(
        &self,
        node_key: &str,
        results: &BTreeMap<String, Box<RawValue>>,
        statuses: &BTreeMap<String, i64>,
    ) -> RegistryResult<ReportOutcome> {
        let node_pending = keys::node_pending_queries(node_key);
        let mut outcome = ReportOutcome::default();

        for (name, payload) in results {
            if self.store.hget(&node_pending, name).await?.is_none() {
                warn!(
                    node_key = %redact(node_key),
                    query_name = %name,
                    "result for a query not pending on this node; ignoring"
                );
                outcome.not_pending.push(name.clone());
                continue;
            }

            self.store
                .hset(keys::COMPLETE_QUERIES, name, payload.get())
                .await?;
            self.store.hdel(keys::PENDING_QUERIES, name).await?;
            self.store.hdel(&node_pending, name).await?;

            if let Some(&code) = statuses.get(name).filter(|&&code| code != 0) {
                let marker = status_marker(code);
                warn!(query_name = %name, status = %marker, "query failed on host");
                outcome.failed.push(FailedQuery {
                    name: name.clone(),
                    code,
                    marker,
                });
            }
            outcome.completed.push(name.clone());
        }

        for name in statuses.keys().filter(|name| !results.contains_key(*name)) {
            warn!(query_name = %name, "status reported without results; ignoring");
            outcome.orphaned_statuses.push(name.clone());
        }

        info!(
            node_key = %redact(node_key),
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            ignored = outcome.not_pending.len(),
            "query results recorded"
        );
        Ok(outcome)
    }

    /// Look up a query by name. A name that was never scheduled is `Unknown`.
    pub async fn fetch(&self, name: &str) -> RegistryResult<QueryResult> {
        if let Some(payload) = self.store.hget(keys::COMPLETE_QUERIES, name).await? {
            let results = RawValue::from_string(payload)
                .map_err(|e| RegistryError::Corrupt(format!("result for {name}: {e}")))?;
            return Ok(QueryResult {
                name: name.to_string(),
                results,
                status: QueryStatus::Complete,
            });
        }

        let status = if self.store.hget(keys::PENDING_QUERIES, name).await?.is_some() {
            QueryStatus::Pending
        } else {
            QueryStatus::Unknown
        };
        let results = RawValue::from_string(EMPTY_RESULTS.to_string())
            .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
        Ok(QueryResult {
            name: name.to_string(),
            results,
            status,
        })
    }
}
