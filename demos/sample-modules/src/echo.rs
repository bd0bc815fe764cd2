use std::sync::Arc;

use async_trait::async_trait;
use gati_core::errors::GatiError;
use gati_core::handler::{Body, Handler, Request, Response};
use gati_core::{module, GlobalContext, LocalContext, Module};
use http::Method;
use serde_json::json;

/// Leaf-consumer module contributing the demo's parametric routes. Registers
/// `/users/:id` before `/users/me` on purpose: first-registered-wins means a
/// request for `/users/me` is bound by the `:id` pattern, not the literal one.
#[derive(Default)]
#[module(name = "echo", deps = ["health"])]
pub struct EchoModule;

#[async_trait]
impl Module for EchoModule {
    fn name(&self) -> &str {
        "echo"
    }

    fn dependencies(&self) -> &[&str] {
        &["health"]
    }

    async fn init(&self, _gctx: &GlobalContext) -> Result<(), GatiError> {
        Ok(())
    }

    fn routes(&self) -> Vec<(Method, &'static str, Arc<dyn Handler>)> {
        vec![
            (Method::GET, "/users/:id", Arc::new(UserByIdHandler)),
            (Method::GET, "/users/me", Arc::new(CurrentUserHandler)),
            (Method::POST, "/echo", Arc::new(EchoHandler)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gati_core::context::{GlobalContextOptions, LocalContextOptions};
    use gati_core::route::RouteManager;

    fn blank_contexts() -> (Arc<GlobalContext>, LocalContext) {
        let gctx = Arc::new(GlobalContext::new(GlobalContextOptions::default()));
        let lctx = LocalContext::create(LocalContextOptions::default());
        (gctx, lctx)
    }

    #[tokio::test]
    async fn user_by_id_handler_echoes_param() {
        let (gctx, mut lctx) = blank_contexts();
        let mut req = Request {
            method: Method::GET,
            path: "/users/42".to_string(),
            headers: Default::default(),
            query: Default::default(),
            params: [("id".to_string(), "42".to_string())].into(),
            body: Body::Empty,
        };
        let mut res = Response::new();
        UserByIdHandler.call(&mut req, &mut res, &gctx, &mut lctx).await.unwrap();
        assert!(res.is_sent());
    }

    #[tokio::test]
    async fn echo_handler_returns_json_body_verbatim() {
        let (gctx, mut lctx) = blank_contexts();
        let payload = serde_json::json!({"x": 1});
        let mut req = Request {
            method: Method::POST,
            path: "/echo".to_string(),
            headers: Default::default(),
            query: Default::default(),
            params: Default::default(),
            body: Body::Json(payload),
        };
        let mut res = Response::new();
        EchoHandler.call(&mut req, &mut res, &gctx, &mut lctx).await.unwrap();
        assert!(res.is_sent());
    }

    #[test]
    fn users_id_registered_before_users_me_shadows_it() {
        let mut routes = RouteManager::new();
        for (method, path, handler) in EchoModule.routes() {
            routes.register(method, path, handler).unwrap();
        }
        let m = routes.match_path(&Method::GET, "/users/me").unwrap();
        assert_eq!(m.params.get("id").unwrap(), "me");
    }
}

struct UserByIdHandler;

#[async_trait]
impl Handler for UserByIdHandler {
    async fn call(
        &self,
        req: &mut Request,
        res: &mut Response,
        _gctx: &Arc<GlobalContext>,
        _lctx: &mut LocalContext,
    ) -> Result<(), GatiError> {
        let id = req.param("id").unwrap_or_default().to_string();
        res.json(&json!({ "id": id }));
        Ok(())
    }
}

/// Unreachable while `/users/:id` is registered first — kept to make the
/// registration-order precedence rule demonstrable rather than assumed.
struct CurrentUserHandler;

#[async_trait]
impl Handler for CurrentUserHandler {
    async fn call(
        &self,
        _req: &mut Request,
        res: &mut Response,
        _gctx: &Arc<GlobalContext>,
        _lctx: &mut LocalContext,
    ) -> Result<(), GatiError> {
        res.json(&json!({ "id": "me", "note": "unreachable: shadowed by /users/:id" }));
        Ok(())
    }
}

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn call(
        &self,
        req: &mut Request,
        res: &mut Response,
        _gctx: &Arc<GlobalContext>,
        _lctx: &mut LocalContext,
    ) -> Result<(), GatiError> {
        match &req.body {
            Body::Json(value) => res.json(value),
            Body::Raw(bytes) => res.send(bytes.clone()),
            Body::Empty => res.json(&json!({})),
        }
        Ok(())
    }
}
