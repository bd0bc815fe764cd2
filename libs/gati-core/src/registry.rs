use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::context::GlobalContext;
use crate::contracts::Module;
use crate::errors::GatiError;

/// A module's constructor, submitted via `inventory::submit!` by the
/// `#[module(...)]` attribute macro so modules are discoverable without a
/// hand-maintained registration list.
pub struct Registrator {
    pub name: &'static str,
    pub deps: &'static [&'static str],
    pub factory: fn() -> Arc<dyn Module>,
}

impl Registrator {
    pub const fn new(
        name: &'static str,
        deps: &'static [&'static str],
        factory: fn() -> Arc<dyn Module>,
    ) -> Self {
        Self { name, deps, factory }
    }
}

inventory::collect!(Registrator);

/// Per-module lifecycle state. `Error` absorbs failures from either the
/// init or shutdown path and is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleState {
    Registered,
    Initializing,
    Initialized,
    ShuttingDown,
    ShutDown,
    Error(String),
}

/// Tunables for the [`ModuleLoader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub auto_init: bool,
    pub allow_circular_dependencies: bool,
    pub init_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            auto_init: false,
            allow_circular_dependencies: false,
            init_timeout: Duration::from_secs(30),
        }
    }
}

struct ModuleRecord {
    module: Arc<dyn Module>,
    deps: Vec<String>,
    state: RwLock<ModuleState>,
    #[allow(dead_code)]
    registration_index: usize,
    usage_count: AtomicU64,
    init_done: Notify,
}

/// Aggregate counts reported by [`ModuleLoader::statistics`].
#[derive(Debug, Clone, Default)]
pub struct LoaderStatistics {
    pub registered: usize,
    pub initializing: usize,
    pub initialized: usize,
    pub shutting_down: usize,
    pub shut_down: usize,
    pub error: usize,
    pub total_usage: u64,
}

/// Manages a named, versioned, dependency-ordered collection of [`Module`]s.
pub struct ModuleLoader {
    modules: DashMap<String, Arc<ModuleRecord>>,
    order: RwLock<Vec<String>>,
    config: LoaderConfig,
}

impl ModuleLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            modules: DashMap::new(),
            order: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Discovers every module submitted via `inventory::submit!` (i.e.
    /// every struct annotated with `#[module(...)]` linked into the
    /// binary) and registers it, using the attribute's own `deps = [...]`
    /// list as the dependency order — the canonical source for
    /// inventory-discovered modules, so the attribute is never allowed to
    /// drift from what the loader actually orders on.
    pub fn discover(config: LoaderConfig) -> Result<Self, GatiError> {
        let loader = Self::new(config);
        for registrator in inventory::iter::<Registrator> {
            let module = (registrator.factory)();
            let deps = registrator.deps.iter().map(|d| d.to_string()).collect();
            loader.register_with_deps(module, deps, None)?;
        }
        Ok(loader)
    }

    /// Validates the name is unique and inserts the module as `Registered`,
    /// deriving its dependency list from `Module::dependencies()`. Intended
    /// for modules constructed and registered by hand (outside
    /// `#[module(...)]`/`discover`); see [`Self::discover`] for the
    /// inventory-discovered path, which instead trusts the attribute's own
    /// `deps` list. If `auto_init` is set and a `GlobalContext` is supplied,
    /// the module is initialized immediately.
    pub fn register(
        &self,
        module: Arc<dyn Module>,
        gctx: Option<&Arc<GlobalContext>>,
    ) -> Result<(), GatiError> {
        let deps = module.dependencies().iter().map(|d| d.to_string()).collect();
        self.register_with_deps(module, deps, gctx)
    }

    fn register_with_deps(
        &self,
        module: Arc<dyn Module>,
        deps: Vec<String>,
        gctx: Option<&Arc<GlobalContext>>,
    ) -> Result<(), GatiError> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(GatiError::ModuleDuplicate(name));
        }
        let registration_index = self.order.read().len();
        let record = Arc::new(ModuleRecord {
            module,
            deps,
            state: RwLock::new(ModuleState::Registered),
            registration_index,
            usage_count: AtomicU64::new(0),
            init_done: Notify::new(),
        });
        self.modules.insert(name.clone(), record);
        self.order.write().push(name.clone());

        if self.config.auto_init {
            if let Some(gctx) = gctx {
                let gctx = gctx.clone();
                let name = name.clone();
                // register() is synchronous but initialize() is async;
                // callers relying on auto_init must be inside an async
                // context (module discovery happens at startup).
                return futures::executor::block_on(self.initialize(&name, &gctx));
            }
        }
        Ok(())
    }

    fn record(&self, name: &str) -> Option<Arc<ModuleRecord>> {
        self.modules.get(name).map(|r| r.clone())
    }

    /// Initializes `name`, recursively initializing its dependencies first.
    /// Idempotent once `Initialized`; fails fast if already `Error`.
    pub fn initialize<'a>(
        &'a self,
        name: &'a str,
        gctx: &'a Arc<GlobalContext>,
    ) -> Pin<Box<dyn Future<Output = Result<(), GatiError>> + Send + 'a>> {
        self.initialize_with_stack(name, gctx, Vec::new())
    }

    fn initialize_with_stack<'a>(
        &'a self,
        name: &'a str,
        gctx: &'a Arc<GlobalContext>,
        mut stack: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<(), GatiError>> + Send + 'a>> {
        Box::pin(async move {
            let record = self
                .record(name)
                .ok_or_else(|| GatiError::ModuleUnknownDependency("<loader>".into(), name.into()))?;

            // A name reappearing on *this call's own* recursion stack is a
            // genuine cycle and must be caught before we ever look at the
            // shared state machine: by the time we recurse back into `name`,
            // the outer call already holds it at `Initializing` on this same
            // sequential async chain, and nothing else will ever notify it.
            // Checking the stack first tells that apart from a *different*
            // task legitimately waiting on an in-flight init of the same
            // module.
            if stack.contains(&name.to_string()) {
                if self.config.allow_circular_dependencies {
                    return Ok(());
                }
                let mut path = stack.clone();
                path.push(name.to_string());
                return Err(GatiError::ModuleCycle { path });
            }

            loop {
                let current = record.state.read().clone();
                match current {
                    ModuleState::Initialized => return Ok(()),
                    ModuleState::Error(reason) => {
                        return Err(GatiError::ModuleInitFailure {
                            module: name.to_string(),
                            source: Box::new(GatiError::Config(anyhow::anyhow!(reason))),
                        })
                    }
                    ModuleState::Initializing => {
                        // Concurrent-init guard: wait for the in-flight
                        // caller to finish, then re-check the outcome.
                        record.init_done.notified().await;
                        continue;
                    }
                    ModuleState::Registered => break,
                    _ => return Ok(()),
                }
            }

            {
                let mut state = record.state.write();
                if *state != ModuleState::Registered {
                    drop(state);
                    return self.initialize_with_stack(name, gctx, stack).await;
                }
                *state = ModuleState::Initializing;
            }
            stack.push(name.to_string());

            for dep in record.deps.clone() {
                if let Err(err) = self.initialize_with_stack(&dep, gctx, stack.clone()).await {
                    self.fail(&record, format!("dependency '{dep}' failed: {err}"));
                    return Err(GatiError::ModuleInitFailure {
                        module: name.to_string(),
                        source: Box::new(err),
                    });
                }
            }

            let result = tokio::time::timeout(self.config.init_timeout, record.module.init(gctx)).await;
            match result {
                Ok(Ok(())) => {
                    *record.state.write() = ModuleState::Initialized;
                    record.init_done.notify_waiters();
                    Ok(())
                }
                Ok(Err(err)) => {
                    self.fail(&record, err.to_string());
                    Err(GatiError::ModuleInitFailure {
                        module: name.to_string(),
                        source: Box::new(err),
                    })
                }
                Err(_) => {
                    self.fail(&record, "init timed out".to_string());
                    Err(GatiError::ModuleInitTimeout(name.to_string()))
                }
            }
        })
    }

    fn fail(&self, record: &ModuleRecord, reason: String) {
        *record.state.write() = ModuleState::Error(reason);
        record.init_done.notify_waiters();
    }

    /// Lazily initializes `name` if needed, then returns the module handle,
    /// incrementing the usage counter. Fails if the module is in `Error`.
    pub async fn get(&self, name: &str, gctx: &Arc<GlobalContext>) -> Result<Arc<dyn Module>, GatiError> {
        self.initialize(name, gctx).await?;
        self.get_sync(name)
    }

    /// Returns the module handle only if already `Initialized`; intended
    /// for hot paths after warmup, when no awaiting is acceptable.
    pub fn get_sync(&self, name: &str) -> Result<Arc<dyn Module>, GatiError> {
        let record = self
            .record(name)
            .ok_or_else(|| GatiError::ModuleUnknownDependency("<loader>".into(), name.into()))?;
        if *record.state.read() != ModuleState::Initialized {
            return Err(GatiError::ModuleInitFailure {
                module: name.to_string(),
                source: Box::new(GatiError::Config(anyhow::anyhow!("module not initialized"))),
            });
        }
        record.usage_count.fetch_add(1, Ordering::Relaxed);
        Ok(record.module.clone())
    }

    /// For every module: `false` if not `Initialized`; otherwise the
    /// module's own `health_check` result.
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let names: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        let mut results = HashMap::with_capacity(names.len());
        for name in names {
            let record = self.record(&name).unwrap();
            let healthy = if *record.state.read() != ModuleState::Initialized {
                false
            } else {
                record.module.health_check().await
            };
            results.insert(name, healthy);
        }
        results
    }

    /// Shuts down a single module. A no-op unless it is `Initialized`;
    /// shutting down twice is a no-op.
    pub async fn shutdown(&self, name: &str) -> Result<(), GatiError> {
        let Some(record) = self.record(name) else {
            return Ok(());
        };
        {
            let state = record.state.read().clone();
            if state != ModuleState::Initialized {
                return Ok(());
            }
        }
        *record.state.write() = ModuleState::ShuttingDown;
        match record.module.shutdown().await {
            Ok(()) => {
                *record.state.write() = ModuleState::ShutDown;
                Ok(())
            }
            Err(err) => {
                self.fail(&record, err.to_string());
                Err(GatiError::ModuleShutdownFailure {
                    module: name.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    /// Shuts down every initialized module in reverse registration order.
    /// Failures are captured but never abort the sweep.
    pub async fn shutdown_all(&self) -> Vec<(String, Result<(), GatiError>)> {
        let order = self.order.read().clone();
        let mut results = Vec::with_capacity(order.len());
        for name in order.into_iter().rev() {
            let result = self.shutdown(&name).await;
            results.push((name, result));
        }
        results
    }

    pub fn statistics(&self) -> LoaderStatistics {
        let mut stats = LoaderStatistics::default();
        for entry in self.modules.iter() {
            let record = entry.value();
            match &*record.state.read() {
                ModuleState::Registered => stats.registered += 1,
                ModuleState::Initializing => stats.initializing += 1,
                ModuleState::Initialized => stats.initialized += 1,
                ModuleState::ShuttingDown => stats.shutting_down += 1,
                ModuleState::ShutDown => stats.shut_down += 1,
                ModuleState::Error(_) => stats.error += 1,
            }
            stats.total_usage += record.usage_count.load(Ordering::Relaxed);
        }
        stats
    }

    /// Initializes every registered module in dependency order, used by
    /// the runtime's startup phase.
    pub async fn init_all(&self, gctx: &Arc<GlobalContext>) -> Result<(), GatiError> {
        let order = self.order.read().clone();
        for name in &order {
            self.initialize(name, gctx).await?;
        }
        Ok(())
    }

    pub fn registration_order(&self) -> Vec<String> {
        self.order.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Leaf;
    #[async_trait]
    impl Module for Leaf {
        fn name(&self) -> &str {
            "leaf"
        }
        async fn init(&self, _gctx: &GlobalContext) -> Result<(), GatiError> {
            Ok(())
        }
    }

    struct Branch {
        deps: Vec<&'static str>,
    }
    #[async_trait]
    impl Module for Branch {
        fn name(&self) -> &str {
            "branch"
        }
        fn dependencies(&self) -> &[&str] {
            &self.deps
        }
        async fn init(&self, _gctx: &GlobalContext) -> Result<(), GatiError> {
            Ok(())
        }
    }

    fn gctx() -> Arc<GlobalContext> {
        Arc::new(GlobalContext::new(crate::context::GlobalContextOptions::default()))
    }

    #[tokio::test]
    async fn initializes_dependency_before_dependent() {
        let loader = ModuleLoader::new(LoaderConfig::default());
        loader.register(Arc::new(Leaf), None).unwrap();
        loader
            .register(Arc::new(Branch { deps: vec!["leaf"] }), None)
            .unwrap();
        let g = gctx();
        loader.initialize("branch", &g).await.unwrap();
        let stats = loader.statistics();
        assert_eq!(stats.initialized, 2);
    }

    #[tokio::test]
    async fn detects_cycle() {
        struct A;
        #[async_trait]
        impl Module for A {
            fn name(&self) -> &str {
                "a"
            }
            fn dependencies(&self) -> &[&str] {
                &["b"]
            }
            async fn init(&self, _gctx: &GlobalContext) -> Result<(), GatiError> {
                Ok(())
            }
        }
        struct B;
        #[async_trait]
        impl Module for B {
            fn name(&self) -> &str {
                "b"
            }
            fn dependencies(&self) -> &[&str] {
                &["a"]
            }
            async fn init(&self, _gctx: &GlobalContext) -> Result<(), GatiError> {
                Ok(())
            }
        }

        let loader = ModuleLoader::new(LoaderConfig::default());
        loader.register(Arc::new(A), None).unwrap();
        loader.register(Arc::new(B), None).unwrap();
        let g = gctx();
        let err = loader.initialize("a", &g).await.unwrap_err();
        assert!(matches!(err, GatiError::ModuleInitFailure { .. }));
    }

    #[tokio::test]
    async fn shutdown_all_runs_in_reverse_order() {
        let loader = ModuleLoader::new(LoaderConfig::default());
        loader.register(Arc::new(Leaf), None).unwrap();
        loader
            .register(Arc::new(Branch { deps: vec!["leaf"] }), None)
            .unwrap();
        let g = gctx();
        loader.initialize("branch", &g).await.unwrap();
        let results = loader.shutdown_all().await;
        assert_eq!(results[0].0, "branch");
        assert_eq!(results[1].0, "leaf");
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let loader = ModuleLoader::new(LoaderConfig::default());
        loader.register(Arc::new(Leaf), None).unwrap();
        let err = loader.register(Arc::new(Leaf), None).unwrap_err();
        assert!(matches!(err, GatiError::ModuleDuplicate(_)));
    }
}
