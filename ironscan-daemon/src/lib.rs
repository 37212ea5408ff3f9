//! Ironscan daemon library.
//!
//! Exposes the daemon's modules for integration testing. In production
//! `ironscand` is used as a binary (main.rs).

pub mod cli;
pub mod handler;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod protocol;
pub mod server;
