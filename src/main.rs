//! protocols-io-mcp: MCP server for the protocols.io API
//!
//! This tool exposes protocols.io profile, protocol and step operations as
//! MCP tools so AI assistants can search, create and edit protocols.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use protocols_io_mcp::config::{self, TransportKind};
use protocols_io_mcp::mcp::{McpServer, ToolRegistry};
use protocols_io_mcp::protocols_io::ProtocolsIo;

/// MCP server for the protocols.io API.
///
/// Exposes protocols.io profile lookup, protocol search, creation and step
/// editing as tools for AI assistants.
#[derive(Parser, Debug)]
#[command(name = "protocols-io-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Transport to serve MCP on (overrides the config file)
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// Listen address for the tcp transport
    #[arg(long)]
    host: Option<String>,

    /// Listen port for the tcp transport
    #[arg(short, long)]
    port: Option<u16>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr: stdout carries MCP messages in stdio mode.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for the protocols-io-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Credentials may live in a local .env file
    let dotenv = dotenvy::dotenv();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            eprintln!(
                "\nSet {} (and optionally {}) in the environment or a .env file,",
                config::ACCESS_TOKEN_ENV,
                config::API_URL_ENV
            );
            if let Some(default_path) = config::default_config_path() {
                eprintln!("or create a config file at: {}", default_path.display());
            }
            return ExitCode::FAILURE;
        }
    };

    if let Some(transport) = args.transport {
        cfg.server.transport = transport;
    }
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    if let Ok(path) = &dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting protocols-io-mcp server"
    );
    info!(api = ?cfg.api, "API configured");

    let api = match ProtocolsIo::new(&cfg.api) {
        Ok(api) => api,
        Err(e) => {
            error!(error = %e, "Failed to initialise protocols.io client");
            return ExitCode::FAILURE;
        }
    };
    let server = McpServer::new(ToolRegistry::protocols_io(api));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = match cfg.server.transport {
        TransportKind::Stdio => {
            info!("MCP server ready on stdio, waiting for client connection...");
            runtime.block_on(server.serve_stdio())
        }
        TransportKind::Tcp => {
            let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
            match addr.parse::<SocketAddr>() {
                Ok(addr) => runtime.block_on(server.serve_tcp(addr)),
                Err(e) => {
                    error!(addr = %addr, error = %e, "Invalid listen address");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
