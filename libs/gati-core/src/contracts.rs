use std::sync::Arc;

use async_trait::async_trait;
use http::Method;

use crate::context::GlobalContext;
use crate::errors::GatiError;
use crate::handler::Handler;

/// A unit of application behavior loaded and driven by the Module Loader.
///
/// Implementors declare their identity and dependencies so the loader can
/// order initialization; the async lifecycle methods are invoked in that
/// order during startup and in reverse during shutdown.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Stable, unique identifier used for dependency references and logs.
    fn name(&self) -> &str;

    /// Semantic version string, surfaced in diagnostics only.
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Names of other modules that must be `Initialized` before this one.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    /// Runs once, after all dependencies have reached `Initialized`.
    ///
    /// Implementors typically register routes and/or install objects into
    /// the [`GlobalContext`] here.
    async fn init(&self, gctx: &GlobalContext) -> Result<(), GatiError>;

    /// Runs once during an orderly shutdown, in reverse dependency order.
    ///
    /// The default implementation does nothing; modules holding resources
    /// that need explicit teardown (connections, background tasks) should
    /// override it.
    async fn shutdown(&self) -> Result<(), GatiError> {
        Ok(())
    }

    /// Lightweight liveness probe, not run on the init/shutdown path.
    async fn health_check(&self) -> bool {
        true
    }

    /// Endpoints this module contributes, registered with the Route
    /// Manager once every module has finished initializing. This is the
    /// in-memory equivalent of a handler module exposing `METHOD`/`ROUTE`
    /// constants alongside its handler function (see the handler discovery
    /// contract); the runtime never scans the filesystem for these.
    ///
    /// Registration order across modules follows module registration
    /// order, so two modules contributing overlapping patterns still
    /// resolve deterministically by first-registered-wins.
    fn routes(&self) -> Vec<(Method, &'static str, Arc<dyn Handler>)> {
        Vec::new()
    }
}
