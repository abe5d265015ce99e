//! # toolmesh testing
//!
//! Helpers shared by the integration tests and benchmarks:
//!
//! - [`ScriptedOracle`] and [`FnOracle`], deterministic decision oracles
//! - [`spawn_tool_server`], a live MCP server on a loopback port
//! - [`unreachable_endpoint`], an address that refuses connections
//! - tool registries: [`math_registry`], [`weather_registry`], [`DelayTool`]

pub mod oracle;
pub mod server;
pub mod tools;

pub use oracle::{FnOracle, ScriptedOracle, Seen, Step};
pub use server::{TestServer, spawn_tool_server, spawn_with_config, test_config, unreachable_endpoint};
pub use tools::{DelayTool, math_registry, weather_registry};
