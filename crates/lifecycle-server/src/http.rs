//! HTTP endpoint handlers
//!
//! Every lifecycle route goes through [`dispatch`], which turns the request
//! into a [`RequestContext`] and hands it to the core route table.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method as HttpMethod, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use lifecycle_core::{ErrorReply, LifecycleError, Method, RequestContext, TenantId, UploadedFile};

use crate::AppState;

pub const HEADER_TENANT: &str = "x-tenant-id";
pub const HEADER_USER: &str = "x-user-id";
pub const HEADER_ORGANIZATION: &str = "x-organization-id";
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const HEADER_FILE_ID: &str = "x-file-id";
pub const HEADER_FILE_NAME: &str = "x-file-name";
pub const HEADER_FILE_TYPE: &str = "x-file-type";
pub const HEADER_FILE_SIZE: &str = "x-file-size";

/// Liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Fallback handler routing every other request through the dispatcher
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: HttpMethod,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = header(&headers, HEADER_REQUEST_ID)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let path = uri.path().to_string();
    let span = tracing::info_span!(
        "request",
        method = %method,
        path = %path,
        tenant = tracing::field::Empty,
        request_id = %request_id,
    );

    let result = match build_context(&method, &path, query, &headers, &body) {
        Ok((method, ctx)) => {
            span.record("tenant", ctx.tenant.as_str());
            let handler_span = span.clone();
            let task = tokio::task::spawn_blocking(move || {
                handler_span.in_scope(|| state.dispatcher.dispatch(&state.store, method, &path, ctx))
            });
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    span.in_scope(|| tracing::error!(error = %e, "request handler task failed"));
                    let reply = ErrorReply {
                        status: 500,
                        error: "Internal server error".to_string(),
                    };
                    let response = (StatusCode::INTERNAL_SERVER_ERROR, Json(reply)).into_response();
                    return with_request_id(response, &request_id);
                }
            }
        }
        Err(e) => Err(e),
    };

    let response = span.in_scope(|| match result {
        Ok(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            tracing::debug!(status = reply.status, "request handled");
            (status, Json(reply)).into_response()
        }
        Err(err) => error_response(&err),
    });
    with_request_id(response, &request_id)
}

/// Map a lifecycle error onto a `{status, error}` response.
pub fn error_response(err: &LifecycleError) -> Response {
    let reply = ErrorReply::from(err);
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::warn!(status = reply.status, error = %err, "request failed");
    } else {
        tracing::debug!(status = reply.status, error = %err, "request rejected");
    }
    (status, Json(reply)).into_response()
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(HEADER_REQUEST_ID, value);
    }
    response
}

/// Derive the dispatcher method and request context from the raw request.
fn build_context(
    method: &HttpMethod,
    path: &str,
    query: HashMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(Method, RequestContext), LifecycleError> {
    let method: Method = method
        .as_str()
        .parse()
        .map_err(|_| LifecycleError::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })?;

    let tenant = header(headers, HEADER_TENANT)
        .ok_or_else(|| LifecycleError::InvalidTenant(format!("missing {} header", HEADER_TENANT)))?;
    let mut ctx = RequestContext::new(TenantId::parse(tenant)?);
    ctx.user_id = numeric_header(headers, HEADER_USER)?;
    ctx.organization_id = numeric_header(headers, HEADER_ORGANIZATION)?;
    ctx.query = query;

    if !body.iter().all(u8::is_ascii_whitespace) {
        ctx.body = serde_json::from_slice(body)
            .map_err(|e| LifecycleError::Validation(format!("request body is not valid JSON: {}", e)))?;
    }

    if let Some(id) = numeric_header(headers, HEADER_FILE_ID)? {
        ctx.file = Some(UploadedFile {
            id,
            filename: header(headers, HEADER_FILE_NAME).map(str::to_string),
            mimetype: header(headers, HEADER_FILE_TYPE).map(str::to_string),
            size: numeric_header::<u64>(headers, HEADER_FILE_SIZE)?,
        });
    }

    Ok((method, ctx))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn numeric_header<T: std::str::FromStr>(
    headers: &HeaderMap,
    name: &str,
) -> Result<Option<T>, LifecycleError> {
    header(headers, name)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                LifecycleError::Validation(format!("{} header must be numeric, got {:?}", name, raw))
            })
        })
        .transpose()
}
