//! E2E integration tests for ironscand.
//!
//! Each test builds a full daemon (in-memory state store, `/bin/sh` scanner
//! scripts, a temporary feed directory) and talks to it over the control
//! socket exactly as a client would.
//!
//! # Test Structure
//!
//! - `helpers/` -- Config builder, running daemon handle, socket client
//! - `scenarios/` -- Tests grouped by scenario
//!
//! # Running
//!
//! ```bash
//! cargo test -p ironscan-daemon --test e2e
//! ```

mod helpers;
mod scenarios;
