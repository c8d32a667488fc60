// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::SessionConfig;
use crate::crypto::{CryptoProvider, SessionKeyPair};
use crate::session::{
    EncryptedFileStore, HttpTransport, Reachability, SessionError, SessionManager, SessionState,
    TcpReachability,
};

/// Connection and store options shared by every command
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// TOML config file (overridden by SESSION_* env vars)
    #[arg(long, env = "SESSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session service base URL
    #[arg(long, env = "SESSION_SERVER_URL")]
    pub server_url: Option<String>,

    /// Encrypted secret store location
    #[arg(long, env = "SESSION_STORE_PATH")]
    pub store: Option<PathBuf>,

    /// Passphrase protecting the secret store
    #[arg(long, env = "SESSION_STORE_PASSPHRASE", hide_env_values = true)]
    pub passphrase: String,
}

/// Arguments for create command
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Share to protect, as a UTF-8 string
    #[arg(long, conflicts_with = "payload_file", required_unless_present = "payload_file")]
    pub payload: Option<String>,

    /// Read the share from a file instead
    #[arg(long)]
    pub payload_file: Option<PathBuf>,

    /// Requested session lifetime in seconds (capped at 7 days)
    #[arg(long, default_value_t = 86_400)]
    pub timeout: u64,
}

/// Arguments for authorize command
#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Envelope uses the legacy big-integer ciphertext encoding
    #[arg(long)]
    pub legacy: bool,

    /// Write the share to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Arguments for invalidate command
#[derive(Args, Debug)]
pub struct InvalidateArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

struct SessionContext {
    config: SessionConfig,
    manager: SessionManager,
    reachability: Arc<TcpReachability>,
}

impl SessionContext {
    async fn open(args: &StoreArgs) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match &args.config {
            Some(path) => SessionConfig::from_file(path)?,
            None => SessionConfig::from_env()?,
        };
        if let Some(url) = &args.server_url {
            config.server_url = url.clone();
        }
        if let Some(path) = &args.store {
            config.store_path = path.clone();
        }
        config.validate()?;

        let store = EncryptedFileStore::open(&config.store_path, &args.passphrase)
            .await
            .with_context(|| format!("Failed to open secret store {:?}", config.store_path))?;
        let transport = HttpTransport::from_config(&config)?;
        let reachability = Arc::new(TcpReachability::new(&config.server_url, config.request_timeout())?);

        let manager = SessionManager::new(
            Arc::new(store),
            Arc::new(transport),
            reachability.clone(),
            CryptoProvider::system(),
            &config,
        );

        Ok(Self {
            config,
            manager,
            reachability,
        })
    }
}

/// Create a session for the given share
pub async fn create(args: CreateArgs) -> Result<()> {
    let payload = match (&args.payload, &args.payload_file) {
        (Some(payload), _) => payload.as_bytes().to_vec(),
        (None, Some(path)) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read payload file {:?}", path))?,
        (None, None) => return Err(anyhow!("Use --payload or --payload-file")),
    };

    let ctx = SessionContext::open(&args.store).await?;
    println!("🔐 Creating session at {}...", ctx.config.server_url);

    ctx.manager.create(&payload, args.timeout).await?;

    println!("✅ Session created");
    if let SessionState::Active { public_key } = ctx.manager.state().await {
        println!("   Public key: {}", public_key);
    }
    println!("   Session id stored in {:?}", ctx.config.store_path);
    Ok(())
}

/// Resume the stored session and print its share
pub async fn authorize(args: AuthorizeArgs) -> Result<()> {
    let ctx = SessionContext::open(&args.store).await?;

    let share = match ctx.manager.authorize_stored(args.legacy).await {
        Ok(share) => share,
        Err(SessionError::SessionExpired) => {
            println!("❌ Session expired or unknown to the service");
            println!("   💡 Run `session-cli create` to start a new session");
            return Err(SessionError::SessionExpired.into());
        }
        Err(e @ SessionError::UserNotFound(_)) if !args.legacy => {
            println!("❌ Envelope could not be opened");
            println!("   💡 Older services encode ciphertext differently, try --legacy");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &share)
                .await
                .with_context(|| format!("Failed to write share to {:?}", path))?;
            info!("Wrote {} byte share to {:?}", share.len(), path);
            println!("✅ Share written to {:?}", path);
        }
        None => println!("{}", String::from_utf8_lossy(&share)),
    }
    Ok(())
}

/// Expire the stored session
pub async fn invalidate(args: InvalidateArgs) -> Result<()> {
    let ctx = SessionContext::open(&args.store).await?;

    if ctx.manager.invalidate_stored().await? {
        println!("✅ Session invalidated");
    } else {
        println!("⚠️  Nothing to invalidate");
        println!("   💡 Run `session-cli authorize` first so the envelope fields are cached");
    }
    Ok(())
}

/// Show configuration, stored session and service reachability
pub async fn status(args: StatusArgs) -> Result<()> {
    let ctx = SessionContext::open(&args.store).await?;

    println!("\n📋 Session Status:");
    println!("  Server:     {}", ctx.config.server_url);
    println!("  Store:      {:?}", ctx.config.store_path);

    match ctx.manager.stored_session_id().await? {
        Some(session_id) => {
            let key = SessionKeyPair::from_session_id(&session_id)?;
            println!("  Session:    {}", key.prefixed_public_key());
        }
        None => println!("  Session:    none"),
    }

    let reachable = ctx.reachability.is_reachable().await;
    println!(
        "  Reachable:  {}",
        if reachable { "✅ yes" } else { "❌ no" }
    );
    Ok(())
}
