// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod admin;

use anyhow::Result;
use clap::{Parser, Subcommand};

use admin::{AdminClient, ConnectionArgs, CredentialArgs, IdentityArgs, PurgeArgs};

/// Caption gate admin CLI
#[derive(Parser, Debug)]
#[command(name = "caption-admin")]
#[command(version)]
#[command(about = "Operator tools for the caption gate", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pool usage, cache hit-rate and active block count
    Status,

    /// Remaining quota for an identity
    Quota(IdentityArgs),

    /// List active blocks
    Blocks,

    /// Lift a block before it expires
    Unblock(IdentityArgs),

    /// Take a credential out of rotation
    Deactivate(CredentialArgs),

    /// Put a credential back into rotation
    Reactivate(CredentialArgs),

    /// Reactivate every credential and clear cooldowns
    ReactivateAll,

    /// Delete old cache entries
    PurgeCache(PurgeArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let client = AdminClient::new(&cli.connection)?;
    let output = match cli.command {
        Commands::Status => client.status().await?,
        Commands::Quota(args) => client.quota(&args.identity).await?,
        Commands::Blocks => client.blocks().await?,
        Commands::Unblock(args) => client.unblock(&args.identity).await?,
        Commands::Deactivate(args) => client.deactivate(&args.id).await?,
        Commands::Reactivate(args) => client.reactivate(&args.id).await?,
        Commands::ReactivateAll => client.reactivate_all().await?,
        Commands::PurgeCache(args) => client.purge_cache(args.older_than_days).await?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
