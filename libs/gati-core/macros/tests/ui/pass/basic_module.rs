use async_trait::async_trait;
use gati_core::errors::GatiError;
use gati_core::{module, GlobalContext, Module};

#[derive(Default)]
#[module(name = "demo", deps = ["config"])]
struct DemoModule;

#[async_trait]
impl Module for DemoModule {
    fn name(&self) -> &str {
        "demo"
    }

    fn dependencies(&self) -> &[&str] {
        &["config"]
    }

    async fn init(&self, _gctx: &GlobalContext) -> Result<(), GatiError> {
        Ok(())
    }
}

fn main() {}
