use thiserror::Error;

/// Unified error type surfaced by every Gati subsystem.
#[derive(Debug, Error)]
pub enum GatiError {
    #[error("route conflict: {method} {pattern} collides with an already-registered route")]
    RouteConflict { method: String, pattern: String },

    #[error("no route matches {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("module '{0}' is already registered")]
    ModuleDuplicate(String),

    #[error("dependency cycle detected: {}", path.join(" -> "))]
    ModuleCycle { path: Vec<String> },

    #[error("module '{0}' depends on unknown module '{1}'")]
    ModuleUnknownDependency(String, String),

    #[error("module '{module}' failed to initialize: {source}")]
    ModuleInitFailure {
        module: String,
        #[source]
        source: Box<GatiError>,
    },

    #[error("module '{module}' failed to shut down: {source}")]
    ModuleShutdownFailure {
        module: String,
        #[source]
        source: Box<GatiError>,
    },

    #[error("module '{0}' initialization timed out")]
    ModuleInitTimeout(String),

    #[error("global context has already been initialized")]
    ContextDoubleInit,

    #[error("global context has not been initialized yet")]
    ContextNotInitialized,

    #[error("handler failed with status {status}: {message}")]
    HandlerFailure {
        status: u16,
        message: String,
        context: Option<serde_json::Value>,
    },

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

impl GatiError {
    pub fn handler(status: u16, message: impl Into<String>) -> Self {
        GatiError::HandlerFailure {
            status,
            message: message.into(),
            context: None,
        }
    }

    pub fn handler_with_context(
        status: u16,
        message: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        GatiError::HandlerFailure {
            status,
            message: message.into(),
            context: Some(context),
        }
    }
}
