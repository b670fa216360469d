//! distq-registry: host enrollment and the ad-hoc query lifecycle.
//!
//! Two stores share one [`KvStore`](distq_state::KvStore):
//!
//! - [`NodeRegistry`] mints node keys at enrollment, records host metadata
//!   under the node key and points the host identifier at it. Every later
//!   agent request is authenticated by checking that its node key still
//!   maps to host metadata.
//! - [`QueryStore`] schedules SQL against a host, hands pending queries to
//!   the polling agent and records the results it reports.
//!
//! # Query lifecycle
//!
//! ```text
//! schedule ──► Pending ──report──► Complete
//!              (queries:pending + queries:pending:nodekey:<key>)
//! ```
//!
//! A name found in neither record is `Unknown`. Writes spanning several keys
//! are ordered sequences, not transactions; the first failure aborts the
//! sequence and is returned to the caller.

pub mod error;
pub mod queries;
pub mod registry;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use queries::QueryStore;
pub use registry::NodeRegistry;
pub use types::*;
