use gati_core::module;

#[derive(Default)]
#[module(name = "bad")]
struct Bad;

fn main() {}
