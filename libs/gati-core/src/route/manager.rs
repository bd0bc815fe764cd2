use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::errors::GatiError;
use crate::handler::Handler;
use crate::route::parser::{normalize_path, Pattern, PatternOptions};

/// A single registered endpoint: method, compiled pattern, and handler.
pub struct Route {
    pub method: Method,
    pub pattern: Pattern,
    pub handler: Arc<dyn Handler>,
}

/// The outcome of a successful [`RouteManager::match_path`] call.
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

/// Holds every registered [`Route`] and resolves incoming requests against
/// them in strict first-registered-wins order.
#[derive(Default)]
pub struct RouteManager {
    routes: Vec<Route>,
    options: PatternOptions,
}

impl RouteManager {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            options: PatternOptions::default(),
        }
    }

    pub fn with_options(options: PatternOptions) -> Self {
        Self {
            routes: Vec::new(),
            options,
        }
    }

    /// Registers a handler for `method`/`path`. The path is normalized and
    /// compiled; duplicate `(method, normalized-path)` pairs are rejected.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), GatiError> {
        let normalized = normalize_path(path);
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.source() == normalized)
        {
            return Err(GatiError::RouteConflict {
                method: method.to_string(),
                pattern: normalized,
            });
        }
        let pattern = Pattern::compile(&normalized, self.options)
            .map_err(|e| GatiError::Config(anyhow::anyhow!(e)))?;
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(())
    }

    pub fn get(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<(), GatiError> {
        self.register(Method::GET, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<(), GatiError> {
        self.register(Method::POST, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<(), GatiError> {
        self.register(Method::PUT, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<(), GatiError> {
        self.register(Method::DELETE, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<(), GatiError> {
        self.register(Method::PATCH, path, handler)
    }

    /// Walks registered routes in registration order and returns the first
    /// whose method and pattern both match.
    pub fn match_path(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let normalized = normalize_path(path);
        self.routes.iter().find_map(|route| {
            if &route.method != method {
                return None;
            }
            route
                .pattern
                .extract_params(&normalized)
                .map(|params| RouteMatch { route, params })
        })
    }

    /// True if some registered route's pattern matches `path` regardless of
    /// method — used to distinguish 404 from 405 at the ingress layer.
    pub fn path_exists(&self, path: &str) -> bool {
        let normalized = normalize_path(path);
        self.routes
            .iter()
            .any(|route| route.pattern.extract_params(&normalized).is_some())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn size(&self) -> usize {
        self.routes.len()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GlobalContext, LocalContext};
    use crate::handler::Response;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Handler for Noop {
        async fn call(
            &self,
            _req: &mut crate::handler::Request,
            _res: &mut Response,
            _gctx: &Arc<GlobalContext>,
            _lctx: &mut LocalContext,
        ) -> Result<(), GatiError> {
            Ok(())
        }
    }

    #[test]
    fn first_registered_wins_on_overlap() {
        let mut mgr = RouteManager::new();
        mgr.register(Method::GET, "/users/:id", Arc::new(Noop)).unwrap();
        mgr.register(Method::GET, "/users/me", Arc::new(Noop)).unwrap();

        // "/users/me" matches the earlier `/users/:id` pattern first.
        let m = mgr.match_path(&Method::GET, "/users/me").unwrap();
        assert_eq!(m.params.get("id").unwrap(), "me");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut mgr = RouteManager::new();
        mgr.register(Method::GET, "/a", Arc::new(Noop)).unwrap();
        let err = mgr.register(Method::GET, "/a", Arc::new(Noop)).unwrap_err();
        assert!(matches!(err, GatiError::RouteConflict { .. }));
    }

    #[test]
    fn no_match_returns_none() {
        let mgr = RouteManager::new();
        assert!(mgr.match_path(&Method::GET, "/missing").is_none());
    }

    #[test]
    fn size_and_clear() {
        let mut mgr = RouteManager::new();
        mgr.register(Method::GET, "/a", Arc::new(Noop)).unwrap();
        mgr.register(Method::GET, "/b", Arc::new(Noop)).unwrap();
        assert_eq!(mgr.size(), 2);
        mgr.clear();
        assert_eq!(mgr.size(), 0);
    }
}
