//! MCP server exposing accessors over stdio.

pub mod session;
pub mod tools;
pub mod types;

pub use tools::RawRegServer;
