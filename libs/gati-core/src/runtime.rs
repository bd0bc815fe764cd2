//! Startup/shutdown orchestration: wires a [`GlobalContext`], brings up
//! every discovered module in dependency order, assembles the Route
//! Manager from each module's contributed routes, binds the HTTP ingress,
//! and runs an orderly graceful shutdown.
//!
//! This is the thin runner a bootstrap binary calls into; it owns none of
//! the process's own argument parsing or logging setup (see `gati-bootstrap`
//! for those).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use gati_bootstrap::{AppConfig, AppConfigProvider, ConfigProvider};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::context::{ContextManager, GlobalContextOptions};
use crate::handler::{build_router, EngineState};
use crate::registry::{LoaderConfig, ModuleLoader};
use crate::route::RouteManager;

/// How the runtime decides when to stop accepting new requests.
pub enum ShutdownOptions {
    /// Listen for Ctrl+C / SIGTERM.
    Signals,
    /// An externally owned token; the caller controls cancellation.
    Token(CancellationToken),
    /// Shut down once this future resolves.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Everything [`run`] needs to bring the server up.
pub struct RunOptions {
    pub config: AppConfig,
    pub loader_config: LoaderConfig,
    pub shutdown: ShutdownOptions,
}

impl RunOptions {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            loader_config: LoaderConfig::default(),
            shutdown: ShutdownOptions::Signals,
        }
    }
}

/// Full cycle: wire GCtx → discover & init modules → assemble routes →
/// bind socket → serve → graceful shutdown → module/GCtx teardown.
pub async fn run(opts: RunOptions) -> Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                if let Err(err) = gati_bootstrap::wait_for_shutdown().await {
                    tracing::warn!(%err, "shutdown signal waiter failed");
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: externally owned token controls lifecycle");
        }
    }

    // Goes through `ConfigProvider` rather than reading `opts.config.modules`
    // directly, so the module loader's config seam stays decoupled from
    // `AppConfig`'s own concrete shape.
    let config_provider = AppConfigProvider::new(opts.config.clone());

    let context_manager = Arc::new(ContextManager::new());
    let gctx = context_manager
        .initialize_global_context(GlobalContextOptions {
            environment: opts.config.environment.clone(),
            config: config_provider.module_configs(),
            state: Default::default(),
        })
        .context("global context already initialized")?;

    let loader = Arc::new(
        ModuleLoader::discover(opts.loader_config).context("module registration failed")?,
    );
    loader
        .init_all(&gctx)
        .await
        .context("module initialization failed")?;

    let health = loader.health_check().await;
    for (name, healthy) in &health {
        if !healthy {
            tracing::warn!(module = %name, "module reported unhealthy at startup");
        }
    }

    let mut routes = RouteManager::new();
    for name in loader.registration_order() {
        let module = loader
            .get_sync(&name)
            .context("module vanished between init and route assembly")?;
        for (method, path, handler) in module.routes() {
            routes
                .register(method, path, handler)
                .with_context(|| format!("module '{name}' contributed a conflicting route"))?;
        }
    }
    tracing::info!(routes = routes.size(), "routes registered");

    let state = EngineState {
        routes: Arc::new(routes),
        gctx: gctx.clone(),
        context_manager: context_manager.clone(),
    };
    let request_timeout = std::time::Duration::from_secs(opts.config.server.request_timeout_secs);
    let router = build_router(state, request_timeout);

    let addr = format!("{}:{}", opts.config.server.host, opts.config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, environment = %opts.config.environment, "gati server listening");

    let shutdown_signal = {
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            tracing::info!("stopping ingress: draining in-flight requests");
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("server error")?;

    tracing::info!("running global context shutdown hooks");
    context_manager.shutdown().await;

    tracing::info!("shutting down modules in reverse registration order");
    for (name, result) in loader.shutdown_all().await {
        if let Err(err) = result {
            tracing::error!(module = %name, error = %err, "module shutdown failed");
        }
    }

    Ok(())
}
