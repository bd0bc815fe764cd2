use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body as AxumBody, Bytes};
use axum::extract::{Request as AxumRequest, State};
use axum::response::Response as AxumResponse;
use axum::Router;
use http::request::Parts;
use http_body_util::BodyExt;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;

use crate::context::{ContextManager, GlobalContext, LocalContextOptions};
use crate::errors::GatiError;
use crate::handler::request::{Body, QueryValue, Request};
use crate::handler::response::Response;
use crate::route::RouteManager;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to the single catch-all handler that backs every
/// request dispatched through the Route Manager.
#[derive(Clone)]
pub struct EngineState {
    pub routes: Arc<RouteManager>,
    pub gctx: Arc<GlobalContext>,
    pub context_manager: Arc<ContextManager>,
}

/// Builds the Axum router used as the HTTP transport for the Route Manager.
/// All dispatch goes through one fallback handler; Axum's own trie router
/// is never used for matching so registration-order precedence holds.
///
/// A zero `request_timeout` disables the deadline layer; handlers otherwise
/// remain responsible for their own internal timeouts.
pub fn build_router(state: EngineState, request_timeout: Duration) -> Router {
    let router = Router::new().fallback(dispatch).with_state(state);
    if request_timeout.is_zero() {
        router
    } else {
        router.layer(TimeoutLayer::new(request_timeout))
    }
}

async fn dispatch(State(state): State<EngineState>, req: AxumRequest) -> AxumResponse {
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = tracing::field::Empty,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let response = dispatch_inner(state, parts, body, method, path)
        .instrument(span.clone())
        .await;
    span.record("latency_ms", start.elapsed().as_millis() as u64);
    response
}

async fn dispatch_inner(
    state: EngineState,
    parts: Parts,
    body: AxumBody,
    method: http::Method,
    path: String,
) -> AxumResponse {
    let span = tracing::Span::current();
    let query = parse_query(parts.uri.query().unwrap_or(""));

    let seeded_request_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    // The LCtx is created up front so every exit path — including a 404/405
    // that never reaches a handler — carries a requestId and an echoed
    // `x-request-id` header.
    let mut lctx = state.context_manager.create_request_context(LocalContextOptions {
        request_id: seeded_request_id,
        trace_id: None,
        client_id: None,
    });
    span.record("request_id", lctx.request_id.as_str());

    let Some(route_match) = state.routes.match_path(&method, &path) else {
        let status = if state.routes.path_exists(&path) { 405 } else { 404 };
        let mut res = Response::new().status(status);
        res.json(&json!({
            "error": not_found_label(status),
            "path": path,
            "requestId": lctx.request_id,
        }));
        state.context_manager.cleanup_request_context(&mut lctx).await;
        let response = finish(res, &lctx.request_id);
        span.record("status", response.status().as_u16());
        return response;
    };

    let body_bytes: Bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };
    let body = parse_body(&parts.headers, body_bytes);

    let mut request = Request {
        method,
        path,
        headers: parts.headers,
        query,
        params: route_match.params,
        body,
    };

    let mut response = Response::new();
    let handler_result = route_match
        .route
        .handler
        .call(&mut request, &mut response, &state.gctx, &mut lctx)
        .await;

    if let Err(err) = handler_result {
        if response.is_sent() {
            tracing::error!(error = %err, request_id = %lctx.request_id, "handler errored after sending a response");
        } else {
            response = build_error_response(err, &lctx.request_id);
        }
    }

    state.context_manager.cleanup_request_context(&mut lctx).await;

    let response = finish(response, &lctx.request_id);
    span.record("status", response.status().as_u16());
    response
}

/// Commits a [`Response`] to the wire, stamping the `x-request-id` header
/// the external contract requires on every outbound response.
fn finish(response: Response, request_id: &str) -> AxumResponse {
    response.with_request_id(request_id).into_axum()
}

fn build_error_response(err: GatiError, request_id: &str) -> Response {
    let mut res = Response::new();
    match err {
        GatiError::HandlerFailure {
            status,
            message,
            context,
        } => {
            res = res.status(status);
            res.json(&json!({
                "error": message,
                "context": context,
                "requestId": request_id,
            }));
        }
        other => {
            tracing::error!(error = %other, %request_id, "unhandled error in handler");
            res = res.status(500);
            res.json(&json!({
                "error": "Internal Server Error",
                "requestId": request_id,
            }));
        }
    }
    res
}

fn not_found_label(status: u16) -> &'static str {
    if status == 405 {
        "Method Not Allowed"
    } else {
        "Not Found"
    }
}

/// Parses a raw query string into name→value(s), preserving every
/// occurrence of a repeated key as a [`QueryValue::Multi`] in arrival order.
fn parse_query(raw: &str) -> HashMap<String, QueryValue> {
    let mut map: HashMap<String, QueryValue> = HashMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        let key = urlencoding::decode(key).unwrap_or_default().into_owned();
        let value = urlencoding::decode(value).unwrap_or_default().into_owned();
        if key.is_empty() {
            continue;
        }
        map.entry(key)
            .and_modify(|existing| {
                match existing {
                    QueryValue::Single(first) => {
                        *existing = QueryValue::Multi(vec![first.clone(), value.clone()]);
                    }
                    QueryValue::Multi(values) => values.push(value.clone()),
                }
            })
            .or_insert_with(|| QueryValue::Single(value));
    }
    map
}

fn parse_body(headers: &http::HeaderMap, bytes: Bytes) -> Body {
    if bytes.is_empty() {
        return Body::Empty;
    }
    let is_json = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        match serde_json::from_slice(&bytes) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Raw(bytes.to_vec()),
        }
    } else {
        Body::Raw(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_preserves_repeated_keys() {
        let q = parse_query("tag=a&tag=b&name=x");
        assert_eq!(q.get("name").unwrap(), &QueryValue::Single("x".to_string()));
        assert_eq!(
            q.get("tag").unwrap(),
            &QueryValue::Multi(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn parse_query_decodes_percent_escapes() {
        let q = parse_query("q=hello%20world");
        assert_eq!(q.get("q").unwrap().first(), "hello world");
    }

    #[test]
    fn parse_query_empty_string_yields_empty_map() {
        assert!(parse_query("").is_empty());
    }
}
