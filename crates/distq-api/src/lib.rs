//! distq-api: HTTP API for distq.
//!
//! Serves the agent protocol (enroll, config, log, distributed read/write)
//! and the operator endpoints used to inspect hosts, schedule queries and
//! collect their results.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/enroll` | Exchange the enroll secret for a node key |
//! | POST | `/config` | Empty schedule + node key validity |
//! | POST | `/log` | Accepted and discarded |
//! | POST | `/distributedRead` | Pending queries for the node |
//! | POST | `/distributedWrite` | Report query results |
//! | GET/POST | `/checkHost?uuid=` | Host metadata (operator) |
//! | GET/POST | `/scheduleQuery?uuid=&query=` | Schedule a query (operator) |
//! | GET/POST | `/fetchResults?queryName=` | Query status and results (operator) |
//!
//! Agent endpoints answer an unknown node key with `{"node_invalid":true}`
//! and HTTP 200. Operator endpoints sit behind [`gate::require_operator`].

pub mod gate;
pub mod operator;
pub mod protocol;
pub mod wire;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use distq_registry::{NodeRegistry, QueryStore};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: NodeRegistry,
    pub queries: QueryStore,
    /// Bearer token for operator endpoints; `None` leaves them open.
    pub operator_token: Option<Arc<str>>,
}

impl ApiState {
    pub fn new(registry: NodeRegistry, operator_token: Option<String>) -> Self {
        Self {
            queries: QueryStore::new(registry.clone()),
            registry,
            operator_token: operator_token.map(Arc::from),
        }
    }
}

/// Body of operator error responses.
#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

/// Build the complete router (agent protocol + operator endpoints).
pub fn build_router(state: ApiState) -> Router {
    let agent_routes = Router::new()
        .route("/enroll", post(protocol::enroll))
        .route("/config", post(protocol::config))
        .route("/log", post(protocol::log))
        .route("/distributedRead", post(protocol::distributed_read))
        .route("/distributedWrite", post(protocol::distributed_write));

    let operator_routes = Router::new()
        .route("/checkHost", get(operator::check_host).post(operator::check_host))
        .route("/scheduleQuery", get(operator::schedule_query).post(operator::schedule_query))
        .route("/fetchResults", get(operator::fetch_results).post(operator::fetch_results))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::require_operator));

    agent_routes.merge(operator_routes).with_state(state)
}
