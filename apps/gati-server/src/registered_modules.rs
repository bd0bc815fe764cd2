// Keeps `sample-modules` linked into the binary so its `#[module(...)]`
// types reach `inventory::submit!` and are picked up by
// `ModuleLoader::discover`. Once a real module-loading story exists (e.g. a
// build.rs that walks a `modules/` directory), this file goes away.
#![allow(unused_imports)]

use sample_modules::{ConfigModule, EchoModule, HealthModule};

#[allow(dead_code)]
fn _ensure_modules_linked() {
    let _ = std::any::type_name::<ConfigModule>();
    let _ = std::any::type_name::<HealthModule>();
    let _ = std::any::type_name::<EchoModule>();
}
