//! # Lease Queue CLI
//!
//! Command-line interface for lease-queue.
//!
//! This module provides CLI commands for:
//! - Creating, locating and deleting a queue
//! - Sending items and claiming them under a lease
//! - Releasing, deleting and extending claimed items by handle
//! - Reporting approximate queue counts
//!
//! Configuration is resolved from files and `LEASE_QUEUE__*` environment
//! variables; see [`load_config`].

use anyhow::Context;
use clap::{Parser, Subcommand};
use lease_queue::{
    transport_for, Enqueue, Item, QueueClient, QueueConfig, QueueError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Prefix of environment variables overriding configuration values
pub const ENV_PREFIX: &str = "LEASE_QUEUE";

const SYSTEM_CONFIG: &str = "/etc/lease-queue/config";
const LOCAL_CONFIG: &str = "config/lease-queue";

// ============================================================================
// CLI Structure
// ============================================================================

/// Lease Queue CLI - claim, release and delete work items on a queue
#[derive(Parser, Debug)]
#[command(name = "lease-queue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lease-based work queue client")]
#[command(
    long_about = "Claims items from an at-least-once queue under a time-limited lease; \
                  unacknowledged items become available again when the lease runs out"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LEASE_QUEUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logical queue name (the configured prefix is applied)
    #[arg(short, long, env = "LEASE_QUEUE_NAME")]
    pub queue: String,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Create the queue if it does not exist and print its address
    CreateQueue,

    /// Delete the queue and all items in it
    DeleteQueue {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Print the queue address, or null when the queue does not exist
    Url,

    /// Send an item; the payload is parsed as JSON, otherwise sent as a string
    Send {
        /// Item payload
        payload: String,
    },

    /// Claim one item and print it as JSON (null when none is available)
    Claim {
        /// Lease in seconds; 0 uses the configured default
        #[arg(short, long, default_value = "0")]
        lease: u32,
    },

    /// Make a claimed item available again immediately
    Release {
        /// Handle printed by `claim`
        #[arg(long)]
        handle: String,
    },

    /// Acknowledge a claimed item, removing it permanently
    Delete {
        /// Handle printed by `claim`
        #[arg(long)]
        handle: String,
    },

    /// Extend the lease of a claimed item
    Extend {
        /// Handle printed by `claim`
        #[arg(long)]
        handle: String,

        /// New lease length from now
        #[arg(short, long)]
        seconds: u32,
    },

    /// Print approximate available and claimed counts
    Count,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Queue '{queue}' does not exist")]
    QueueMissing { queue: String },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code: 2 for usage and configuration problems, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::InvalidArgument { .. } => 2,
            Self::Queue(QueueError::Configuration(_)) | Self::Queue(QueueError::Validation(_)) => 2,
            Self::QueueMissing { .. } | Self::Queue(_) | Self::Output(_) => 1,
        }
    }
}

/// Exit code for an error returned by [`run`]
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<CliError>()
        .map(CliError::exit_code)
        .unwrap_or(1)
}

// ============================================================================
// Logging and Configuration
// ============================================================================

/// Install the global tracing subscriber; logs go to stderr.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lease_queue={level},lease_queue_cli={level}")));

    let registry = tracing_subscriber::registry().with(filter);

    // A second initialisation (tests) keeps the first subscriber
    let _ = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
}

/// Resolve the queue configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/lease-queue/config.{toml,yaml,json}` (optional)
///  2. `./config/lease-queue.{toml,yaml,json}` (optional)
///  3. `explicit` (must exist when given)
///  4. Environment variables prefixed `LEASE_QUEUE__` with `__` as the
///     nesting separator, e.g. `LEASE_QUEUE__CREDENTIALS__ACCESS_KEY_ID`
///
/// The result is validated before it is returned.
pub fn load_config(explicit: Option<&Path>) -> Result<QueueConfig, CliError> {
    load_config_with_env(explicit, None)
}

/// As [`load_config`], reading environment overrides from `environment`
/// instead of the process environment when it is given
pub fn load_config_with_env(
    explicit: Option<&Path>,
    environment: Option<HashMap<String, String>>,
) -> Result<QueueConfig, CliError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name(SYSTEM_CONFIG).required(false))
        .add_source(config::File::with_name(LOCAL_CONFIG).required(false));

    if let Some(path) = explicit {
        debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .source(environment),
        )
        .build()
        .map_err(|e| CliError::Configuration {
            message: e.to_string(),
        })?;

    let queue_config: QueueConfig =
        settings
            .try_deserialize()
            .map_err(|e| CliError::Configuration {
                message: e.to_string(),
            })?;

    queue_config
        .validate()
        .map_err(|e| CliError::Configuration {
            message: e.to_string(),
        })?;

    Ok(queue_config)
}

/// Interpret a command-line payload as JSON, falling back to a JSON string
pub fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ============================================================================
// Command Execution
// ============================================================================

/// Run a parsed command line, writing results to stdout
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.command == (Commands::DeleteQueue { yes: false }) {
        return Err(CliError::InvalidArgument {
            arg: "--yes".to_string(),
            message: "deleting a queue removes all of its items; pass --yes to confirm"
                .to_string(),
        }
        .into());
    }

    let config = load_config(cli.config.as_deref())?;
    let transport = transport_for(&config).map_err(QueueError::from).map_err(CliError::from)?;
    let client = QueueClient::new(&cli.queue, config, transport).map_err(CliError::from)?;

    for line in execute(&client, cli.command)
        .await
        .with_context(|| format!("queue '{}'", cli.queue))?
    {
        println!("{}", line);
    }
    Ok(())
}

/// Execute one command against `client`, returning the lines to print
pub async fn execute(client: &QueueClient, command: Commands) -> Result<Vec<String>, CliError> {
    let output = match command {
        Commands::CreateQueue => {
            let address = client.create_queue().await?;
            vec![address.to_string()]
        }
        Commands::Url => match client.resolve_queue().await? {
            Some(address) => vec![address.to_string()],
            None => vec![Value::Null.to_string()],
        },
        Commands::DeleteQueue { .. } => {
            if client.resolve_queue().await?.is_none() {
                return Err(CliError::QueueMissing {
                    queue: client.handle().name().to_string(),
                });
            }
            client.delete_queue().await?;
            info!(queue = %client.handle().name(), "Queue deleted");
            Vec::new()
        }
        Commands::Send { payload } => {
            client.create_queue().await?;
            let sent = client.create_item(Enqueue::Payload(parse_payload(&payload))).await?;
            vec![sent.to_string()]
        }
        Commands::Claim { lease } => {
            client.create_queue().await?;
            let item = client.claim_item::<Value>(lease).await?;
            vec![serde_json::to_string(&item)?]
        }
        Commands::Release { handle } => {
            client.create_queue().await?;
            let released = client.release_item(&handle_only(handle)).await?;
            vec![released.to_string()]
        }
        Commands::Delete { handle } => {
            client.create_queue().await?;
            client.delete_item(&handle_only(handle)).await?;
            Vec::new()
        }
        Commands::Extend { handle, seconds } => {
            client.create_queue().await?;
            client.extend_lease(&handle_only(handle), seconds).await?;
            Vec::new()
        }
        Commands::Count => {
            client.create_queue().await?;
            let available = client.number_of_items().await?;
            let claimed = client.number_of_claimed_items().await?;
            vec![serde_json::json!({ "available": available, "claimed": claimed }).to_string()]
        }
    };
    Ok(output)
}

/// An item known only by its handle, as passed between processes
fn handle_only(handle: String) -> Item<Value> {
    Item::new(Value::Null, handle)
}
