//! Domain types for enrolled hosts and scheduled queries.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Hash field names of the `nodekey:<node_key>` record.
pub const FIELD_UUID: &str = "UUID";
pub const FIELD_COMPUTER_NAME: &str = "ComputerName";
pub const FIELD_OSQUERY_VERSION: &str = "OsqueryVersion";
pub const FIELD_PLATFORM: &str = "Platform";

/// Placeholder result for queries that have not completed.
pub const EMPTY_RESULTS: &str = "[]";

// ── Host ───────────────────────────────────────────────────────────

/// Metadata recorded for an enrolled host.
///
/// Serialized with the same field names the store uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "ComputerName")]
    pub computer_name: String,
    #[serde(rename = "OsqueryVersion")]
    pub osquery_version: String,
    /// `<platform>(<os version>)`, e.g. `darwin(10.15.7)`.
    #[serde(rename = "Platform")]
    pub platform: String,
}

impl Host {
    /// Field/value pairs in the order they are written to the store.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            (FIELD_UUID, self.uuid.as_str()),
            (FIELD_COMPUTER_NAME, self.computer_name.as_str()),
            (FIELD_OSQUERY_VERSION, self.osquery_version.as_str()),
            (FIELD_PLATFORM, self.platform.as_str()),
        ]
    }
}

// ── Queries ────────────────────────────────────────────────────────

/// Lifecycle state of a scheduled query. `Unknown` is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryStatus {
    Pending,
    Complete,
    Unknown,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Complete => f.write_str("Complete"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// What `fetch` knows about a query name.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub name: String,
    /// The payload the agent reported, verbatim. `[]` unless complete.
    pub results: Box<RawValue>,
    pub status: QueryStatus,
}

/// A reported query whose agent-side status was non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedQuery {
    pub name: String,
    pub code: i64,
    /// `Status Code N`.
    pub marker: String,
}

/// Summary of one `report` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Names moved from pending to complete, including failed ones.
    pub completed: Vec<String>,
    pub failed: Vec<FailedQuery>,
    /// Names with a status code but no result. Ignored.
    pub orphaned_statuses: Vec<String>,
    /// Results for names not pending on the reporting node. Ignored.
    pub not_pending: Vec<String>,
}

/// Render an agent status code the way operators see it.
pub fn status_marker(code: i64) -> String {
    format!("Status Code {code}")
}
