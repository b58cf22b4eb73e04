//! Rendering of Cortex results for MCP clients.

pub mod generator;

pub use generator::*;
