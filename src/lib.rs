//! device-mcp: MCP tool-calling layer for a voice-assistant backend
//!
//! Enumerates the tools a device or provider advertises over a duplex
//! connection, exposes them to the function-calling layer and invokes them
//! with id-correlated, timed calls. A fleet manager routes calls across
//! several providers and rebuilds sessions that fail mid-call.

pub mod auth;
pub mod config;
pub mod core;
pub mod transport;
pub mod utils;

pub use crate::config::Settings;
pub use crate::core::{FleetManager, McpSession, ToolArguments};
pub use crate::utils::errors::{McpError, McpResult};
