//! Operator endpoints: inspect hosts, schedule queries, fetch results.
//!
//! Parameters come from the query string, and on POST also from an
//! `application/x-www-form-urlencoded` body. A field present in both is
//! taken from the body.

use std::collections::HashMap;

use axum::extract::{Form, FromRequest, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use distq_registry::{QueryStatus, RegistryError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::wire::ScheduleResponse;
use crate::{ApiState, error_response};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Operator parameters merged from the query string and a form body.
#[derive(Debug)]
pub struct OperatorParams<T>(pub T);

fn has_form_body(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE))
}

impl<S, T> FromRequest<S> for OperatorParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(mut fields) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map_err(IntoResponse::into_response)?;
        if has_form_body(&req) {
            let Form(body) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            fields.extend(body);
        }

        let value = serde_json::to_value(fields).map_err(|e| {
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        })?;
        let params = serde_json::from_value(value).map_err(|e| {
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        })?;
        Ok(Self(params))
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckHostParams {
    pub uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleParams {
    pub uuid: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    #[serde(rename = "queryName")]
    pub query_name: Option<String>,
}

fn missing(param: &str) -> Response {
    error_response(&format!("missing parameter: {param}"), StatusCode::BAD_REQUEST).into_response()
}

fn failure(endpoint: &str, e: RegistryError) -> Response {
    if e.is_not_found() {
        return error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response();
    }
    error!(endpoint, error = %e, "operator request failed");
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// GET|POST /checkHost?uuid=
pub async fn check_host(
    State(state): State<ApiState>,
    OperatorParams(params): OperatorParams<CheckHostParams>,
) -> Response {
    let Some(uuid) = present(params.uuid) else {
        return missing("uuid");
    };
    info!(%uuid, "check host");

    match state.registry.lookup(&uuid).await {
        Ok((_, host)) => Json(host).into_response(),
        Err(e) => failure("checkHost", e),
    }
}

/// GET|POST /scheduleQuery?uuid=&query=
pub async fn schedule_query(
    State(state): State<ApiState>,
    OperatorParams(params): OperatorParams<ScheduleParams>,
) -> Response {
    let Some(uuid) = present(params.uuid) else {
        return missing("uuid");
    };
    let Some(query) = present(params.query) else {
        return missing("query");
    };

    match state.queries.schedule(&uuid, &query).await {
        Ok(query_name) => Json(ScheduleResponse { query_name }).into_response(),
        Err(e) => failure("scheduleQuery", e),
    }
}

/// GET|POST /fetchResults?queryName=
///
/// An unknown name answers 404 with the `Unknown` record as body.
pub async fn fetch_results(
    State(state): State<ApiState>,
    OperatorParams(params): OperatorParams<FetchParams>,
) -> Response {
    let Some(query_name) = present(params.query_name) else {
        return missing("queryName");
    };
    info!(%query_name, "fetch results");

    match state.queries.fetch(&query_name).await {
        Ok(result) if result.status == QueryStatus::Unknown => {
            (StatusCode::NOT_FOUND, Json(result)).into_response()
        }
        Ok(result) => Json(result).into_response(),
        Err(e) => failure("fetchResults", e),
    }
}
