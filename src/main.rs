//! vat-mcp: MCP server for Swedish VAT declarations
//!
//! Serves VAT drafts, submissions and decisions to AI assistants over stdio.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use vat_mcp::config::{self, Backend};
use vat_mcp::mcp::server::{shutdown_signal, Dispatcher, McpServer};
use vat_mcp::mcp::{Session, StdioTransport};
use vat_mcp::vat::{HttpVatApi, MemoryVatApi, VatApi};

/// MCP server for Swedish VAT declarations.
///
/// Exposes the Skatteverket VAT declaration API as MCP tools, resources and
/// prompts over stdio.
#[derive(Parser, Debug)]
#[command(name = "vat-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Serve from an in-memory store instead of the REST API
    #[arg(long)]
    memory: bool,
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
/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the startup notice required by GPLv3 section 5d to stderr.
fn print_license_notice() {
    eprintln!(
        "vat-mcp {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under {}.", env!("CARGO_PKG_LICENSE"));
    eprintln!("Source: {}", env!("CARGO_PKG_REPOSITORY"));
    eprintln!();
}

/// Entry point for the vat-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if let Some(default_path) = config::default_config_path() {
                eprintln!("\nDefault config location: {}", default_path.display());
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    if !args.quiet {
        print_license_notice();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting vat-mcp server"
    );

    let backend = if args.memory {
        Backend::Memory
    } else {
        cfg.api.backend
    };

    let api: Arc<dyn VatApi> = match backend {
        Backend::Memory => {
            warn!("Using in-memory VAT store; nothing is sent to Skatteverket");
            Arc::new(MemoryVatApi::new())
        }
        Backend::Http => match HttpVatApi::new(&cfg.api.http()) {
            Ok(api) => {
                info!(base_url = %api.base_url(), "Using VAT REST API");
                Arc::new(api)
            }
            Err(e) => {
                error!(error = %e, "Failed to create VAT API client");
                return ExitCode::FAILURE;
            }
        },
    };

    let collaborators = match vat_mcp::build_collaborators(api) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            error!(error = %e, "Failed to register tools");
            return ExitCode::FAILURE;
        }
    };

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

    let result = runtime.block_on(async {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            match shutdown_signal().await {
                Ok(()) => signal_token.cancel(),
                Err(e) => warn!(error = %e, "Failed to install signal handlers"),
            }
        });

        let dispatcher = Dispatcher::new(collaborators, Arc::new(Session::new()));
        let mut server = McpServer::new(
            dispatcher,
            StdioTransport::stdio(),
            cfg.server.max_concurrent_requests,
        );

        info!("MCP server ready, waiting for client connection...");
        server.run(shutdown).await
    });

    // A pending stdin read holds a blocking thread; do not wait for it.
    runtime.shutdown_background();

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
