use std::collections::HashMap;

use http::{HeaderMap, Method};
use serde_json::Value;

/// A query-string value: a single occurrence, or every value seen for a
/// repeated key (`?tag=a&tag=b`), preserved in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    /// The first (or only) value, for callers that don't care about repeats.
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(s) => s,
            QueryValue::Multi(v) => v.first().map(String::as_str).unwrap_or_default(),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(s) => vec![s.as_str()],
            QueryValue::Multi(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// An incoming HTTP request, materialized once per call and handed to the
/// matched handler alongside the route's bound path parameters.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: HashMap<String, QueryValue>,
    pub params: HashMap<String, String>,
    pub body: Body,
}

/// Request body, parsed into a typed JSON value when the `Content-Type`
/// indicates a known format, otherwise kept as raw bytes.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Raw(Vec<u8>),
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(QueryValue::first)
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_value_first_and_all() {
        let single = QueryValue::Single("a".to_string());
        assert_eq!(single.first(), "a");
        assert_eq!(single.all(), vec!["a"]);

        let multi = QueryValue::Multi(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(multi.first(), "a");
        assert_eq!(multi.all(), vec!["a", "b"]);
    }
}
