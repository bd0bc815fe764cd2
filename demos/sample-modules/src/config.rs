use std::sync::Arc;

use async_trait::async_trait;
use gati_core::errors::GatiError;
use gati_core::{module, GlobalContext, Module};

/// Leaf module: reads its own config section out of the `GlobalContext`
/// config map (seeded from `AppConfig.modules["config"]`) and republishes
/// it as a typed export other modules can look up by name.
#[derive(Default)]
#[module(name = "config")]
pub struct ConfigModule;

#[derive(Debug, Clone)]
pub struct ConfigExports {
    pub greeting: String,
}

#[async_trait]
impl Module for ConfigModule {
    fn name(&self) -> &str {
        "config"
    }

    async fn init(&self, gctx: &GlobalContext) -> Result<(), GatiError> {
        let greeting = gctx
            .get_config("config")
            .and_then(|v| v.get("greeting").and_then(|g| g.as_str().map(str::to_string)))
            .unwrap_or_else(|| "hello".to_string());

        gctx.register_module("config", Arc::new(ConfigExports { greeting }))
    }
}
