//! Agent protocol handlers.
//!
//! Every authenticated endpoint decodes its body first, then checks the
//! node key, and only then touches the query store. An unknown node key is
//! reported in the body with HTTP 200; agents branch on `node_invalid`,
//! not on the status code.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use distq_registry::RegistryError;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::ApiState;
use crate::wire::*;

fn decode<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Option<T> {
    match serde_json::from_slice(body) {
        Ok(req) => Some(req),
        Err(e) => {
            warn!(endpoint, error = %e, "could not decode request body");
            None
        }
    }
}

fn store_failure(endpoint: &str, e: RegistryError) -> Response {
    error!(endpoint, error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// `Ok(false)` for an unknown node key; `Err` only when the store fails.
async fn authenticate(state: &ApiState, endpoint: &str, node_key: &str) -> Result<bool, Response> {
    match state.registry.is_enrolled(node_key).await {
        Ok(true) => Ok(true),
        Ok(false) => {
            debug!(endpoint, "request with unknown node key");
            Ok(false)
        }
        Err(e) => Err(store_failure(endpoint, e)),
    }
}

/// POST /enroll
pub async fn enroll(State(state): State<ApiState>, body: Bytes) -> Response {
    let Some(req) = decode::<EnrollRequest>("enroll", &body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let host = req.host_details.into_host();
    match state
        .registry
        .enroll(&req.enroll_secret, &req.host_identifier, host)
        .await
    {
        Ok(node_key) => Json(EnrollResponse { node_key }).into_response(),
        Err(RegistryError::InvalidSecret) => {
            (StatusCode::BAD_REQUEST, Json(NodeInvalid::TRUE)).into_response()
        }
        Err(e) => store_failure("enroll", e),
    }
}

/// POST /config
pub async fn config(State(state): State<ApiState>, body: Bytes) -> Response {
    let Some(req) = decode::<NodeRequest>("config", &body) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let enrolled = match authenticate(&state, "config", &req.node_key).await {
        Ok(enrolled) => enrolled,
        Err(resp) => return resp,
    };

    Json(ConfigResponse {
        schedule: BTreeMap::new(),
        node_invalid: !enrolled,
    })
    .into_response()
}

/// POST /log
///
/// Agent status and result logs have no consumer yet.
pub async fn log(body: Bytes) -> StatusCode {
    debug!(bytes = body.len(), "agent log batch discarded");
    StatusCode::OK
}

/// POST /distributedRead
pub async fn distributed_read(State(state): State<ApiState>, body: Bytes) -> Response {
    let Some(req) = decode::<NodeRequest>("distributedRead", &body) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    match authenticate(&state, "distributedRead", &req.node_key).await {
        Ok(true) => {}
        Ok(false) => return Json(NodeInvalid::TRUE).into_response(),
        Err(resp) => return resp,
    }

    match state.queries.poll(&req.node_key).await {
        Ok(queries) => Json(DistributedReadResponse::new(queries)).into_response(),
        Err(e) => store_failure("distributedRead", e),
    }
}

/// POST /distributedWrite
pub async fn distributed_write(State(state): State<ApiState>, body: Bytes) -> Response {
    let Some(req) = decode::<DistributedWriteRequest>("distributedWrite", &body) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    match authenticate(&state, "distributedWrite", &req.node_key).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("results reported by a host that is not enrolled");
            return Json(NodeInvalid::TRUE).into_response();
        }
        Err(resp) => return resp,
    }

    match state
        .queries
        .report(&req.node_key, &req.queries, &req.statuses)
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => store_failure("distributedWrite", e),
    }
}
