use std::sync::Arc;

use async_trait::async_trait;
use gati_core::errors::GatiError;
use gati_core::handler::{Handler, Request, Response};
use gati_core::{module, GlobalContext, LocalContext, Module};
use http::Method;
use serde_json::json;

use crate::config::ConfigExports;

/// Depends on `config` purely to demonstrate dependency-ordered init
/// (S4 in the runtime's testable-properties list); it doesn't otherwise
/// need `config`'s exports.
#[derive(Default)]
#[module(name = "health", deps = ["config"])]
pub struct HealthModule;

#[async_trait]
impl Module for HealthModule {
    fn name(&self) -> &str {
        "health"
    }

    fn dependencies(&self) -> &[&str] {
        &["config"]
    }

    async fn init(&self, gctx: &GlobalContext) -> Result<(), GatiError> {
        if gctx.module::<ConfigExports>("config").is_none() {
            return Err(GatiError::Config(anyhow::anyhow!(
                "health module expected 'config' to have already registered its exports"
            )));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn routes(&self) -> Vec<(Method, &'static str, Arc<dyn Handler>)> {
        vec![(Method::GET, "/healthz", Arc::new(HealthzHandler))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigModule;
    use gati_core::context::GlobalContextOptions;

    #[tokio::test]
    async fn init_fails_when_config_has_not_registered_yet() {
        let gctx = GlobalContext::new(GlobalContextOptions::default());
        let err = HealthModule.init(&gctx).await.unwrap_err();
        assert!(matches!(err, GatiError::Config(_)));
    }

    #[tokio::test]
    async fn init_succeeds_once_config_has_registered() {
        let gctx = GlobalContext::new(GlobalContextOptions::default());
        ConfigModule.init(&gctx).await.unwrap();
        HealthModule.init(&gctx).await.unwrap();
    }
}

struct HealthzHandler;

#[async_trait]
impl Handler for HealthzHandler {
    async fn call(
        &self,
        _req: &mut Request,
        res: &mut Response,
        _gctx: &Arc<GlobalContext>,
        _lctx: &mut LocalContext,
    ) -> Result<(), GatiError> {
        res.json(&json!({ "ok": true }));
        Ok(())
    }
}
