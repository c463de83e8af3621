//! STP proxy CLI binary.
//!
//! Session-typed mediation proxy between message clients and servers.
//!
//! # Commands
//!
//! - `proxy` - Start the mediation proxy
//! - `check` - Decode and echo a session-type protocol text
//! - `validate` - Validate a JSON value against a payload type

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stp::{
    config::Config,
    proxy::ProxyServer,
    schema::{parse_type, validate},
    session::{codec, Role},
    VERSION,
};

#[derive(Parser)]
#[command(name = "stp")]
#[command(version = VERSION)]
#[command(about = "STP - Session-typed mediation proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the mediation proxy
    Proxy {
        /// TCP listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen host
        #[arg(long)]
        host: Option<String>,

        /// Upstream server address (host:port)
        #[arg(short, long)]
        upstream: Option<String>,

        /// Receive timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode a session-type protocol text and echo both role views
    Check {
        /// Session text (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Validate a JSON value against a payload type
    Validate {
        /// Payload type text, e.g. '{ type: "number" }'
        r#type: String,

        /// JSON value (or - for stdin)
        value: Option<String>,

        /// Input file path for the value
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Proxy {
            port,
            host,
            upstream,
            timeout,
            config,
            verbose,
        } => cmd_proxy(port, host, upstream, timeout, config, verbose),

        Commands::Check { input, file } => cmd_check(input, file),

        Commands::Validate {
            r#type: ty,
            value,
            file,
        } => cmd_validate(&ty, value, file),
    }
}

fn cmd_proxy(
    port: Option<u16>,
    host: Option<String>,
    upstream: Option<String>,
    timeout: Option<u64>,
    config_path: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Config file < environment < CLI flags
    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };
    if let Some(port) = port {
        config.proxy.port = port;
    }
    if let Some(host) = host {
        config.proxy.host = host;
    }
    if let Some(upstream) = upstream {
        config.proxy.upstream = upstream;
    }
    if let Some(timeout) = timeout {
        config.proxy.timeout_secs = timeout;
    }

    let server = ProxyServer::new(config.proxy_config()?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async { server.run().await.map_err(|e| anyhow::anyhow!("{}", e)) })
}

fn cmd_check(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let text = content.trim();

    let server_view = codec::decode_for_role(text, Role::Server)?;
    let client_view = codec::decode_for_role(text, Role::Client)?;

    println!("Server view: {}", codec::encode(&server_view));
    println!("Client view: {}", codec::encode(&client_view));

    Ok(())
}

fn cmd_validate(ty: &str, value: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let ty = parse_type(ty)?;
    let content = read_input(value, file)?;
    let value: serde_json::Value = serde_json::from_str(content.trim())?;

    match validate(&value, &ty) {
        Ok(()) => {
            println!("OK: value matches {ty}");
            Ok(())
        },
        Err(e) => {
            eprintln!("INVALID: {e}");
            std::process::exit(1);
        },
    }
}

// Helper functions

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
