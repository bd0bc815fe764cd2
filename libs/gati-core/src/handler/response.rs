use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

/// Accumulates status/headers for a single HTTP response and commits the
/// body exactly once.
///
/// Mirrors a conventional `res.status(...).header(...).json(...)` builder:
/// every setter is chainable and a no-op once the response has been sent.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    sent: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            sent: false,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, code: u16) -> Self {
        if self.sent {
            return self;
        }
        if let Ok(code) = StatusCode::from_u16(code) {
            self.status = code;
        }
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.sent {
            return self;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn json<T: Serialize>(&mut self, value: &T) {
        if self.sent {
            return;
        }
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        self.body = serde_json::to_vec(value).ok();
        self.sent = true;
    }

    pub fn text(&mut self, body: impl Into<String>) {
        if self.sent {
            return;
        }
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Some(body.into().into_bytes());
        self.sent = true;
    }

    pub fn send(&mut self, bytes: Vec<u8>) {
        if self.sent {
            return;
        }
        if !self.headers.contains_key(http::header::CONTENT_TYPE) {
            self.headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
        }
        self.body = Some(bytes);
        self.sent = true;
    }

    pub fn end(&mut self) {
        if self.sent {
            return;
        }
        self.body = Some(Vec::new());
        self.sent = true;
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Echoes the request's correlation id back to the caller, set on
    /// ingress if the client didn't supply one, echoed otherwise.
    pub(crate) fn with_request_id(mut self, request_id: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(request_id) {
            self.headers
                .insert(HeaderName::from_static("x-request-id"), value);
        }
        self
    }

    pub(crate) fn into_axum(mut self) -> axum::response::Response {
        if !self.sent {
            self.end();
        }
        let mut builder = axum::response::Response::builder().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder
            .body(axum::body::Body::from(self.body.unwrap_or_default()))
            .unwrap_or_else(|_| {
                axum::response::Response::new(axum::body::Body::from("response build failure"))
            })
    }
}
