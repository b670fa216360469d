//! Key layout shared by the node registry and the query lifecycle.
//!
//! | Key | Kind | Contents |
//! |---|---|---|
//! | `uuid:<uuid>` | string | node key currently bound to the host |
//! | `nodekey:<node_key>` | hash | `UUID`, `ComputerName`, `OsqueryVersion`, `Platform` |
//! | `queries:nodekey:<node_key>` | hash | query name → SQL, every query ever scheduled |
//! | `queries:pending` | hash | query name → SQL, all pending queries |
//! | `queries:pending:nodekey:<node_key>` | hash | query name → SQL, pending for one node |
//! | `queries:complete` | hash | query name → result JSON |

/// Global index of pending queries.
pub const PENDING_QUERIES: &str = "queries:pending";

/// Global record of completed query results.
pub const COMPLETE_QUERIES: &str = "queries:complete";

/// Pointer from a host identifier to its node key.
pub fn host_uuid(uuid: &str) -> String {
    format!("uuid:{uuid}")
}

/// Host metadata hash for a node key.
pub fn node(node_key: &str) -> String {
    format!("nodekey:{node_key}")
}

/// Permanent map of every query scheduled against a node key.
pub fn node_queries(node_key: &str) -> String {
    format!("queries:nodekey:{node_key}")
}

/// Pending queries for a single node key.
pub fn node_pending_queries(node_key: &str) -> String {
    format!("queries:pending:nodekey:{node_key}")
}
