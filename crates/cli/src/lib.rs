//! Careflow CLI
//!
//! Command implementations and output formatting for the `careflow` binary.

pub mod commands;
pub mod output;
