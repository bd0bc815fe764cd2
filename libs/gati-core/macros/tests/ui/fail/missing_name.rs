use gati_core::module;

#[derive(Default)]
#[module(deps = ["config"])]
struct Incomplete;

fn main() {}
