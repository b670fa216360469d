//! Operator gate.
//!
//! Operator endpoints are fronted by an identity provider in production.
//! When an operator token is configured this middleware additionally
//! requires `Authorization: Bearer <token>`; without one it passes every
//! request through.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{ApiState, error_response};

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn require_operator(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.operator_token.as_deref() else {
        return next.run(req).await;
    };

    let authorized = bearer_token(&req)
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));
    if !authorized {
        warn!(path = %req.uri().path(), "operator request rejected");
        return error_response("operator authorization required", StatusCode::UNAUTHORIZED)
            .into_response();
    }
    next.run(req).await
}
