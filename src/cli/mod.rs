// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir Session CLI
#[derive(Parser, Debug)]
#[command(name = "session-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Create, resume and invalidate encrypted sessions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a session protecting a share
    Create(session::CreateArgs),

    /// Fetch and decrypt the share of the stored session
    Authorize(session::AuthorizeArgs),

    /// Expire the stored session at the service
    Invalidate(session::InvalidateArgs),

    /// Show the stored session and service reachability
    Status(session::StatusArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Create(args) => session::create(args).await,
        Commands::Authorize(args) => session::authorize(args).await,
        Commands::Invalidate(args) => session::invalidate(args).await,
        Commands::Status(args) => session::status(args).await,
    }
}
