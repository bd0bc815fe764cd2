use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration provider trait for modules
pub trait ConfigProvider: Send + Sync {
    /// Get the configuration for a specific module
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;

    /// Get a specific config value by key
    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value>;

    /// The full per-module config map, handed to the `GlobalContext` at
    /// startup — the seam the module loader actually reads through, so it
    /// never needs to know about `AppConfig`'s own shape.
    fn module_configs(&self) -> HashMap<String, serde_json::Value>;
}

/// Implementation of ConfigProvider that uses AppConfig
pub struct AppConfigProvider(Arc<AppConfig>);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(config))
    }

    pub fn from_arc(config: Arc<AppConfig>) -> Self {
        Self(config)
    }

    pub fn inner(&self) -> &AppConfig {
        &self.0
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.modules.get(module_name)
    }

    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "server" => serde_json::to_value(&self.0.server).ok(),
            "logging" => serde_json::to_value(&self.0.logging).ok(),
            "environment" => Some(serde_json::Value::String(self.0.environment.clone())),
            _ => None,
        }
    }

    fn module_configs(&self) -> HashMap<String, serde_json::Value> {
        self.0.modules.clone()
    }
}
