//! protocols-io-mcp: MCP server for the protocols.io API
//!
//! This library exposes protocols.io (profile lookup, protocol creation and
//! search, step editing) as MCP tools for AI assistants.
//!
//! # Architecture
//!
//! - **Resource bridge**: every API call goes through one function that adds
//!   the bearer token, bounds the call with a timeout, and turns every failure
//!   into an `{error, message, url}` record instead of an error
//! - **Step model**: protocol steps form a linked list through `previous_guid`
//! - **Tools**: thin functions mapping arguments to a path and a body
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types
//! - [`mcp`] — MCP protocol implementation
//! - [`protocols_io`] — protocols.io API access

pub mod config;
pub mod error;
pub mod mcp;
pub mod protocols_io;
