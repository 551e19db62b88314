//! Integration test aggregator
//!
//! Drives the controller against real child processes. Individual test
//! modules are declared in `suite/mod.rs`.

mod common;
mod suite;
