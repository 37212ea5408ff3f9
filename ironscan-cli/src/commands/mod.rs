//! Command handlers -- one module per subcommand

pub mod config;
pub mod details;
pub mod scan;
pub mod start;
pub mod status;
pub mod vts;
