//! NodeRegistry: enrollment and node key authentication.

use std::collections::HashMap;
use std::sync::Arc;

use distq_core::{TOKEN_LEN, random_token};
use distq_state::{KvStore, keys};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::types::*;

/// Shorten a credential for log output.
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}…")
}

/// Maps host identifiers to node keys and node keys to host metadata.
#[derive(Clone)]
pub struct NodeRegistry {
    store: KvStore,
    enroll_secret: Arc<str>,
}

impl NodeRegistry {
    /// `enroll_secret` is fixed for the lifetime of the registry.
    pub fn new(store: KvStore, enroll_secret: impl Into<String>) -> Self {
        Self {
            store,
            enroll_secret: Arc::from(enroll_secret.into()),
        }
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    fn secret_matches(&self, presented: &str) -> bool {
        presented.as_bytes().ct_eq(self.enroll_secret.as_bytes()).into()
    }

    /// Enroll a host and return its new node key.
    ///
    /// A non-empty `host_identifier` replaces `host.uuid` as the identifier
    /// the host is indexed by. Enrolling the same identifier again mints a
    /// fresh key and repoints the identifier; the old key keeps its metadata
    /// and stays enrolled.
    pub async fn enroll(
        &self,
        secret: &str,
        host_identifier: &str,
        mut host: Host,
    ) -> RegistryResult<String> {
        if !self.secret_matches(secret) {
            warn!(uuid = %host.uuid, "enrollment rejected: incorrect secret");
            return Err(RegistryError::InvalidSecret);
        }
        if !host_identifier.is_empty() {
            host.uuid = host_identifier.to_string();
        }

        let node_key = random_token(TOKEN_LEN)?;
        let node_record = keys::node(&node_key);
        for (field, value) in host.fields() {
            self.store.hset(&node_record, field, value).await?;
        }
        self.store.set(&keys::host_uuid(&host.uuid), &node_key).await?;

        info!(
            uuid = %host.uuid,
            node_key = %redact(&node_key),
            platform = %host.platform,
            "host enrolled"
        );
        Ok(node_key)
    }

    /// Whether `node_key` maps to host metadata.
    pub async fn is_enrolled(&self, node_key: &str) -> RegistryResult<bool> {
        if node_key.is_empty() {
            return Ok(false);
        }
        Ok(self.store.exists(&keys::node(node_key)).await?)
    }

    /// Resolve a host identifier to its current node key and metadata.
    pub async fn lookup(&self, uuid: &str) -> RegistryResult<(String, Host)> {
        let node_key = self
            .store
            .get(&keys::host_uuid(uuid))
            .await?
            .ok_or_else(|| RegistryError::HostNotFound(uuid.to_string()))?;

        let mut fields = self.store.hgetall(&keys::node(&node_key)).await?;
        if fields.is_empty() {
            return Err(RegistryError::ReEnrollRequired {
                uuid: uuid.to_string(),
                reason: "no host information".to_string(),
            });
        }

        let host = Host {
            uuid: uuid.to_string(),
            computer_name: take_field(&mut fields, uuid, FIELD_COMPUTER_NAME)?,
            osquery_version: take_field(&mut fields, uuid, FIELD_OSQUERY_VERSION)?,
            platform: take_field(&mut fields, uuid, FIELD_PLATFORM)?,
        };
        Ok((node_key, host))
    }
}

fn take_field(
    fields: &mut HashMap<String, String>,
    uuid: &str,
    name: &str,
) -> RegistryResult<String> {
    fields.remove(name).ok_or_else(|| RegistryError::ReEnrollRequired {
        uuid: uuid.to_string(),
        reason: format!("host record is missing {name}"),
    })
}
