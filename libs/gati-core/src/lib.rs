//! # Gati - Declarative Module System & Request-Serving Runtime
//!
//! Gati discovers `#[module(...)]`-annotated types via `inventory`, brings
//! them up in dependency order, wires a process-wide [`GlobalContext`], and
//! serves HTTP requests through a hand-rolled [`route::RouteManager`] whose
//! matching semantics are strictly first-registered-wins.
//!
//! ## Basic module example
//!
//! ```rust,ignore
//! use gati_core::{async_trait, module, Module, GlobalContext};
//! use gati_core::errors::GatiError;
//!
//! #[derive(Default)]
//! #[module(name = "cache", deps = ["config"])]
//! pub struct CacheModule;
//!
//! #[async_trait]
//! impl Module for CacheModule {
//!     fn name(&self) -> &str { "cache" }
//!     async fn init(&self, gctx: &GlobalContext) -> Result<(), GatiError> {
//!         gctx.register_module("cache", std::sync::Arc::new(()))
//!     }
//! }
//! ```
//!
//! `deps` on the attribute is what [`registry::ModuleLoader::discover`]
//! actually orders on; overriding [`Module::dependencies`] only matters for
//! modules registered by hand via [`registry::ModuleLoader::register`].

pub use anyhow::Result;
pub use async_trait::async_trait;

// Re-export inventory for the `#[module(...)]` macro's generated code.
pub use inventory;

pub mod contracts;
pub use contracts::Module;

pub mod context;
pub use context::{ContextManager, GlobalContext, GlobalContextOptions, LocalContext};

pub mod registry;
pub use registry::{LoaderConfig, ModuleLoader, Registrator};

pub mod route;
pub use route::{RouteManager, RouteMatch};

pub mod handler;
pub use handler::{Handler, Request, Response};

pub mod errors;
pub use errors::GatiError;

pub mod runtime;
pub use runtime::{run, RunOptions, ShutdownOptions};

// Re-export the `#[module(...)]` attribute macro from the proc-macro crate.
pub use gati_macros::module;
