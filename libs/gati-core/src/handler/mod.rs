mod engine;
mod request;
mod response;

use std::sync::Arc;

use async_trait::async_trait;

pub use engine::{build_router, EngineState};
pub use request::{Body, QueryValue, Request};
pub use response::Response;

use crate::context::{GlobalContext, LocalContext};
use crate::errors::GatiError;

/// A registered endpoint's business logic. Invoked by the Handler Engine
/// with the incoming request, a response builder, the process-wide
/// [`GlobalContext`], and a fresh per-request [`LocalContext`].
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(
        &self,
        req: &mut Request,
        res: &mut Response,
        gctx: &Arc<GlobalContext>,
        lctx: &mut LocalContext,
    ) -> Result<(), GatiError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request, Arc<GlobalContext>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Response, GatiError>> + Send + 'static,
{
    async fn call(
        &self,
        req: &mut Request,
        res: &mut Response,
        gctx: &Arc<GlobalContext>,
        _lctx: &mut LocalContext,
    ) -> Result<(), GatiError> {
        let produced = (self)(req.clone(), gctx.clone()).await?;
        *res = produced;
        Ok(())
    }
}
