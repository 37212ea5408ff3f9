//! `ironscan` command-line client.
//!
//! The binary in `main.rs` is a thin wrapper; everything testable lives here.

pub mod cli;
pub mod client;
pub mod commands;
pub mod error;
pub mod output;
pub mod run;
