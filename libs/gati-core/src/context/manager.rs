use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::context::{GlobalContext, GlobalContextOptions, LocalContext, LocalContextOptions};
use crate::errors::GatiError;

/// Orchestrates the singleton [`GlobalContext`] and the factory for
/// [`LocalContext`] instances, tying their lifecycles to runtime
/// startup/shutdown and per-request begin/end.
#[derive(Default)]
pub struct ContextManager {
    gctx: ArcSwapOption<GlobalContext>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            gctx: ArcSwapOption::empty(),
        }
    }

    /// Creates the singleton `GlobalContext`. Fails if one is already live;
    /// re-initialization is permitted after `shutdown`.
    pub fn initialize_global_context(
        &self,
        options: GlobalContextOptions,
    ) -> Result<Arc<GlobalContext>, GatiError> {
        if self.gctx.load().is_some() {
            return Err(GatiError::ContextDoubleInit);
        }
        let gctx = Arc::new(GlobalContext::new(options));
        self.gctx.store(Some(gctx.clone()));
        Ok(gctx)
    }

    pub fn global_context(&self) -> Option<Arc<GlobalContext>> {
        self.gctx.load_full()
    }

    pub fn create_request_context(&self, options: LocalContextOptions) -> LocalContext {
        LocalContext::create(options)
    }

    pub async fn cleanup_request_context(&self, lctx: &mut LocalContext) {
        lctx.cleanup().await;
    }

    /// Runs the GCtx shutdown hooks (if a context exists) and clears the
    /// singleton reference. Safe to call when uninitialized.
    pub async fn shutdown(&self) {
        if let Some(gctx) = self.gctx.load_full() {
            gctx.shutdown().await;
        }
        self.gctx.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_init_fails() {
        let mgr = ContextManager::new();
        mgr.initialize_global_context(GlobalContextOptions::default())
            .unwrap();
        let err = mgr
            .initialize_global_context(GlobalContextOptions::default())
            .unwrap_err();
        assert!(matches!(err, GatiError::ContextDoubleInit));
    }

    #[tokio::test]
    async fn shutdown_then_reinitialize_is_allowed() {
        let mgr = ContextManager::new();
        mgr.initialize_global_context(GlobalContextOptions::default())
            .unwrap();
        mgr.shutdown().await;
        assert!(mgr.global_context().is_none());
        mgr.initialize_global_context(GlobalContextOptions::default())
            .unwrap();
        assert!(mgr.global_context().is_some());
    }
}
