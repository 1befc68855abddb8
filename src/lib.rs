#[macro_use]
extern crate tracing;

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod http;
pub mod server;
pub mod signal;
pub mod target_group;
pub mod telemetry;
pub mod trace;
pub mod writer;

#[cfg(test)]
mod testing;
