#[macro_use]
extern crate tracing;

#[macro_use]
extern crate eyre;

pub mod cogs;
pub mod core;
