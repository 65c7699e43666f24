//! Core services for the OHDSI WebAPI MCP server.
//!
//! This crate owns the typed client adapter for the remote WebAPI, the cohort
//! expression assembler and validator, and the control plane that turns every
//! tool invocation into a `ToolText` result.

pub mod client;
pub mod cohort;
pub mod control;
pub mod services;
pub mod text;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
