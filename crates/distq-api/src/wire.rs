//! Request and response bodies of the agent protocol.
//!
//! Agents omit fields freely, so every request field defaults.

use std::collections::BTreeMap;

use distq_registry::Host;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Poll interval, in seconds, suggested to an agent that has work queued.
pub const ACCELERATE_SECONDS: u32 = 300;

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnrollRequest {
    pub enroll_secret: String,
    pub host_identifier: String,
    pub host_details: HostDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HostDetails {
    pub system_info: SystemInfo,
    pub osquery_info: OsqueryInfo,
    pub os_version: OsVersion,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    pub uuid: String,
    pub computer_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OsqueryInfo {
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OsVersion {
    pub platform: String,
    pub version: String,
}

impl HostDetails {
    pub fn into_host(self) -> Host {
        Host {
            uuid: self.system_info.uuid,
            computer_name: self.system_info.computer_name,
            osquery_version: self.osquery_info.version,
            platform: format!("{}({})", self.os_version.platform, self.os_version.version),
        }
    }
}

/// Body of `/config` and `/distributedRead`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodeRequest {
    pub node_key: String,
}

/// Body of `/distributedWrite`. Results stay raw JSON.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DistributedWriteRequest {
    pub node_key: String,
    pub queries: BTreeMap<String, Box<RawValue>>,
    pub statuses: BTreeMap<String, i64>,
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub node_key: String,
}

/// `{"node_invalid":true}`, the protocol's authentication failure.
#[derive(Debug, Serialize)]
pub struct NodeInvalid {
    pub node_invalid: bool,
}

impl NodeInvalid {
    pub const TRUE: NodeInvalid = NodeInvalid { node_invalid: true };
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub schedule: BTreeMap<String, serde_json::Value>,
    pub node_invalid: bool,
}

#[derive(Debug, Serialize)]
pub struct DistributedReadResponse {
    pub queries: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerate: Option<u32>,
}

impl DistributedReadResponse {
    /// The accelerate hint is present iff there is work to hand out.
    pub fn new(queries: BTreeMap<String, String>) -> Self {
        let accelerate = (!queries.is_empty()).then_some(ACCELERATE_SECONDS);
        Self { queries, accelerate }
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    #[serde(rename = "queryName")]
    pub query_name: String,
}
