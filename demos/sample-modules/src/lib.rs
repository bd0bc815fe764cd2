//! Reference modules exercising the full `Module` contract: a dependency
//! chain (`config` → `health` → `echo`), a couple of routes demonstrating
//! parametric matching and registration-order precedence, and a
//! `health_check` override.
//!
//! These are demo wiring, not library code a real deployment would keep;
//! they exist so `gati-server` has something to serve out of the box and
//! so the request-serving runtime's contract is exercised end-to-end.

mod config;
mod echo;
mod health;

pub use config::ConfigModule;
pub use echo::EchoModule;
pub use health::HealthModule;
