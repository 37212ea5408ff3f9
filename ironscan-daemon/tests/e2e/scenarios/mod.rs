//! E2E test scenarios.

mod faults;
mod lifecycle;
mod scan_flow;
mod shutdown;
