use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::GatiError;

type ShutdownHook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Options seeding a freshly created [`GlobalContext`].
#[derive(Debug, Clone, Default)]
pub struct GlobalContextOptions {
    pub environment: String,
    pub config: HashMap<String, Value>,
    pub state: HashMap<String, Value>,
}

/// Process-wide container for modules, configuration, mutable state, and
/// the shutdown-hook registry. One instance exists per running process.
pub struct GlobalContext {
    environment: String,
    modules: DashMap<String, Arc<dyn Any + Send + Sync>>,
    config: DashMap<String, Value>,
    state: DashMap<String, Value>,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
    is_shutting_down: AtomicBool,
}

impl GlobalContext {
    pub fn new(options: GlobalContextOptions) -> Self {
        let config = DashMap::new();
        for (k, v) in options.config {
            config.insert(k, v);
        }
        let state = DashMap::new();
        for (k, v) in options.state {
            state.insert(k, v);
        }
        Self {
            environment: options.environment,
            modules: DashMap::new(),
            config,
            state,
            shutdown_hooks: Mutex::new(Vec::new()),
            is_shutting_down: AtomicBool::new(false),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Inserts a module's exports into the modules map. Errors if the name
    /// is already registered.
    pub fn register_module<T: Send + Sync + 'static>(
        &self,
        name: &str,
        exports: Arc<T>,
    ) -> Result<(), GatiError> {
        if self.modules.contains_key(name) {
            return Err(GatiError::ModuleDuplicate(name.to_string()));
        }
        self.modules
            .insert(name.to_string(), exports as Arc<dyn Any + Send + Sync>);
        Ok(())
    }

    /// Typed accessor over the modules map: downcasts the stored export to
    /// `T`, returning `None` if the name is unknown or the type doesn't match.
    pub fn module<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.modules
            .get(name)
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn set_config(&self, key: impl Into<String>, value: Value) {
        self.config.insert(key.into(), value);
    }

    pub fn get_config(&self, key: &str) -> Option<Value> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.state.get(key).map(|v| v.clone())
    }

    /// Appends a shutdown hook. Hooks run concurrently, at most once, when
    /// [`GlobalContext::shutdown`] is called.
    pub fn on_shutdown<F, Fut>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.shutdown_hooks.lock().push(Arc::new(move || {
            Box::pin(hook()) as Pin<Box<dyn Future<Output = ()> + Send>>
        }));
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    /// Runs every registered shutdown hook concurrently, isolating failures
    /// (a panicking hook is logged and does not stop the others), then marks
    /// the context as shut down. A no-op on any call after the first: hooks
    /// run at most once, matching `LocalContext::cleanup`'s drain-on-first-call
    /// discipline.
    pub async fn shutdown(&self) {
        if self.is_shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks = std::mem::take(&mut *self.shutdown_hooks.lock());
        let futures = hooks.into_iter().map(|hook| async move {
            let result = std::panic::AssertUnwindSafe(hook())
                .catch_unwind()
                .await;
            if result.is_err() {
                tracing::error!("global context shutdown hook panicked");
            }
        });
        futures::future::join_all(futures).await;
    }
}
