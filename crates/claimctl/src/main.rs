//! claimctl: Command-line interface for a Claimguard database.
//!
//! Provides commands for managing access grants, recording and removing
//! claims, and asking the registry whether an action would be allowed.

mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use claimguard::{ActionKind, Config, Coordinate, Identity, ProtectionService, WorldId};

/// Command-line interface for a Claimguard database.
#[derive(Parser)]
#[command(name = "claimctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// A block position given on the command line.
#[derive(Args, Clone, Copy, Debug)]
pub struct Position {
    /// World id
    world: WorldId,
    #[arg(allow_negative_numbers = true)]
    x: i32,
    #[arg(allow_negative_numbers = true)]
    y: i32,
    #[arg(allow_negative_numbers = true)]
    z: i32,
}

impl From<Position> for Coordinate {
    fn from(position: Position) -> Self {
        Coordinate::new(position.world, position.x, position.y, position.z)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Let GRANTEE act near GRANTOR's claims
    Allow { grantor: Identity, grantee: Identity },
    /// Withdraw one grant, or every grant GRANTOR made
    Disallow {
        grantor: Identity,
        grantee: Option<Identity>,
    },
    /// List who IDENTITY has granted access to
    Allowlist {
        identity: Identity,
        /// List who granted IDENTITY access instead
        #[arg(long)]
        grantors: bool,
    },
    /// Ask whether an action would be allowed at a position
    Check {
        /// Action kind: natural, read or write
        kind: ActionKind,
        #[command(flatten)]
        position: Position,
        /// Acting identity (omit for natural effects)
        #[arg(short, long)]
        actor: Option<Identity>,
    },
    /// Record a block placement
    Place {
        owner: Identity,
        #[command(flatten)]
        position: Position,
    },
    /// Remove the claim at a position, or every claim around it
    Remove {
        #[command(flatten)]
        position: Position,
        /// Remove every claim within this radius
        #[arg(short, long)]
        radius: Option<i32>,
    },
    /// Show the claims around a position
    Inspect {
        #[command(flatten)]
        position: Position,
        /// Search radius
        #[arg(short, long, default_value = "0")]
        radius: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    claimguard::observability::tracing::init_tracing(&cli.config.log_level);

    if let Some(endpoint) = cli.config.otel_endpoint.as_deref() {
        claimguard::observability::metrics::init_metrics_with_endpoint(Some(endpoint));
    }

    let storage = cli.config.storage();
    if let Some(parent) = storage.database.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create database directory: {}", parent.display())
        })?;
    }
    let service = ProtectionService::open(&storage, cli.config.protection())
        .with_context(|| format!("failed to open database: {}", storage.database.display()))?;

    let result = match cli.command {
        Commands::Allow { grantor, grantee } => {
            commands::access::allow(&service, grantor, grantee, cli.output).await
        }
        Commands::Disallow { grantor, grantee } => {
            commands::access::disallow(&service, grantor, grantee, cli.output).await
        }
        Commands::Allowlist { identity, grantors } => {
            commands::access::list(&service, identity, grantors, cli.output).await
        }
        Commands::Check {
            kind,
            position,
            actor,
        } => commands::check::run(&service, kind, position.into(), actor, cli.output).await,
        Commands::Place { owner, position } => {
            commands::claims::place(&service, owner, position.into(), cli.output).await
        }
        Commands::Remove { position, radius } => {
            commands::claims::remove(&service, position.into(), radius, cli.output).await
        }
        Commands::Inspect { position, radius } => {
            commands::claims::inspect(&service, position.into(), radius, cli.output).await
        }
    };

    // Shutdown may wait out the grace period
    tokio::task::spawn_blocking(move || service.shutdown())
        .await
        .context("storage shutdown task failed")?;
    result
}
