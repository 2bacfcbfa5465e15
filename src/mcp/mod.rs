//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the Model Context Protocol for exposing protocols.io
//! operations as tools to AI assistants. The server speaks newline-delimited
//! JSON-RPC 2.0 over stdio or over TCP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐  │
//! │  │  Transport  │───▶│   Session   │───▶│  Tool registry   │  │
//! │  │ (stdio/tcp) │    │ (lifecycle) │    │    (handlers)    │  │
//! │  └─────────────┘    └─────────────┘    └──────────────────┘  │
//! │                                                 │            │
//! │                                                 ▼            │
//! │                                       ┌──────────────────┐   │
//! │                                       │  Resource bridge │──────▶ protocols.io
//! │                                       └──────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{Response, MCP_PROTOCOL_VERSION};
pub use server::{McpServer, Session};
pub use tools::{ToolCallResult, ToolRegistry};
pub use transport::{LineTransport, StdioTransport, TcpTransport};
