//! Exit codes for the CLI.
//!
//! Usage errors (bad arguments) exit with 2; clap handles those before any
//! command runs.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// Any configuration, resolution or server failure
pub const GENERAL_ERROR: u8 = 1;
