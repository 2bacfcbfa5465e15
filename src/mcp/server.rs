//! MCP server implementation for protocols.io.
//!
//! This module implements the MCP session lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls and other requests
//! 3. **Shutdown**: The client closes its side of the transport, or the
//!    process receives a termination signal
//!
//! A [`Session`] is one conversation over one [`LineTransport`]. The
//! [`McpServer`] runs a single session on stdio, or accepts TCP connections
//! and runs one session task per connection. Sessions share the
//! [`ToolRegistry`] read-only.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::mcp::protocol::{
    parse_message, IncomingMessage, Notification, Request, RequestId, Response,
    MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::tools::ToolRegistry;
use crate::mcp::transport::{LineTransport, StdioTransport, TcpTransport};

/// Guidance sent to the client in the initialize result.
pub const SERVER_INSTRUCTIONS: &str = "\
This server gives access to protocols.io for finding, reading and writing scientific protocols.

When creating or changing protocol content:
1. Ground every element in existing protocols.io protocols found with get_public_protocol_list_by_keyword; do not write content from general knowledge alone.
2. Support each element with at least two or three independent protocols from those search results.
3. Use plain text in every field. Markdown and HTML are not rendered by protocols.io.
4. Cite sources with numbers such as [1], [2] inside the text, and put the full numbered reference list in the protocol_references field of update_protocol.
5. Cross-check details across the referenced protocols before finalising.

Before creating or modifying a protocol, search with relevant keywords to collect references first.
New step guids come from generate_guids; steps are ordered through previous_guid.";

/// Session state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: &'static str,
    /// Server version.
    pub version: &'static str,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// One MCP conversation over one transport.
pub struct Session<R, W> {
    state: ServerState,
    transport: LineTransport<R, W>,
    registry: Arc<ToolRegistry>,
    protocol_version: Option<String>,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a session awaiting `initialize`.
    pub const fn new(transport: LineTransport<R, W>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport,
            registry,
            protocol_version: None,
        }
    }

    /// Returns the current session state.
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the negotiated protocol version, once initialised.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Serves messages until the peer closes the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> io::Result<()> {
        while self.state != ServerState::ShuttingDown {
            let Some(line) = self.transport.read_line().await? else {
                debug!("Transport closed by client");
                self.state = ServerState::ShuttingDown;
                break;
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                self.transport.send(&response).await?;
            }
        }
        Ok(())
    }

    /// Handles one line and returns the response to send, if any.
    pub async fn handle_line(&mut self, line: &str) -> Option<Response> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(req).await),
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
                None
            }
            Err(error) => Some(error),
        }
    }

    async fn handle_request(&mut self, req: Request) -> Response {
        let outcome = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req).await,
            "ping" => Ok(Response::success(req.id.clone(), json!({}))),
            _ => Err(Response::method_not_found(req.id.clone(), &req.method)),
        };
        outcome.unwrap_or_else(|error| error)
    }

    fn handle_notification(&mut self, notif: &Notification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                info!("Client initialised, session running");
                self.state = ServerState::Running;
            }
            "notifications/cancelled" => {
                // Calls run to completion; there is nothing to cancel.
                debug!(params = ?notif.params, "Ignoring cancellation notification");
            }
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    fn handle_initialize(&mut self, req: &Request) -> Result<Response, Response> {
        if self.state != ServerState::AwaitingInit {
            return Err(Response::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req.parse_params()?;
        if let Some(client) = &params.client_info {
            info!(
                client = %client.name,
                client_version = client.version.as_deref().unwrap_or("unknown"),
                requested_version = %params.protocol_version,
                "Initialising session"
            );
        }

        if params.protocol_version != MCP_PROTOCOL_VERSION {
            debug!(
                requested = %params.protocol_version,
                offered = MCP_PROTOCOL_VERSION,
                "Client requested a different protocol version"
            );
        }

        self.protocol_version = Some(MCP_PROTOCOL_VERSION.to_string());
        self.state = ServerState::Initialising;

        let capabilities = ServerCapabilities {
            tools: ToolCapabilities::default(),
        };
        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": capabilities,
            "serverInfo": ServerInfo::default(),
            "instructions": SERVER_INSTRUCTIONS,
        });

        Ok(Response::success(req.id.clone(), result))
    }

    fn handle_tools_list(&self, req: &Request) -> Result<Response, Response> {
        self.require_running(&req.id)?;

        let result = json!({
            "tools": self.registry.definitions(),
        });

        Ok(Response::success(req.id.clone(), result))
    }

    async fn handle_tools_call(&self, req: &Request) -> Result<Response, Response> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = req.parse_params()?;
        let result = self.registry.call(&params.name, params.arguments).await;

        let value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            Response::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(Response::success(req.id.clone(), value))
    }

    fn require_running(&self, id: &RequestId) -> Result<(), Response> {
        if self.state != ServerState::Running {
            return Err(Response::invalid_request(
                Some(id.clone()),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}

/// The protocols.io MCP server.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Creates a server exposing `registry`.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Serves a single session on stdin/stdout.
    ///
    /// Returns when stdin closes or a termination signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve_stdio(&self) -> io::Result<()> {
        let mut session = Session::new(StdioTransport::stdio(), Arc::clone(&self.registry));

        tokio::select! {
            result = session.run() => result,
            signal = shutdown_signal() => signal,
        }
    }

    /// Accepts TCP connections on `addr`, one session per connection.
    ///
    /// Returns when a termination signal arrives. Sessions still running at
    /// that point are dropped with the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn serve_tcp(&self, addr: SocketAddr) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Listening for MCP connections");

        tokio::select! {
            () = self.accept_loop(&listener) => Ok(()),
            signal = shutdown_signal() => signal,
        }
    }

    /// Accepts connections forever, spawning a session for each.
    pub async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            info!(%peer, "Client connected");
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                let mut session = Session::new(TcpTransport::tcp(stream), registry);
                match session.run().await {
                    Ok(()) => info!(%peer, "Client disconnected"),
                    Err(e) => warn!(%peer, error = %e, "Session ended with an I/O error"),
                }
            });
        }
    }
}

/// Completes when the process is asked to terminate.
#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
    Ok(())
}

/// Completes when the process is asked to terminate.
#[cfg(windows)]
async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}
