mod global;
mod local;
mod manager;

pub use global::{GlobalContext, GlobalContextOptions};
pub use local::{ContextSnapshot, LocalContext, LocalContextOptions, Phase};
pub use manager::ContextManager;
