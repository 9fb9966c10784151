//! # Application Module
//!
//! - [`agent`] - Tool catalog, reply grammar, argument coercion and the bounded control loop
//! - [`stdio`] - JSON-lines front end over standard input/output
//! - [`tooling`] - MCP server process and the tool channel trait

pub mod agent;
pub mod stdio;
pub mod tooling;
