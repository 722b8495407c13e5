//! CLI administration tool for linkgate.
//!
//! Provides commands for session maintenance, user listing and database
//! checks without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Delete expired refresh tokens now
//! cargo run --bin admin -- sessions sweep
//!
//! # Sign a user out everywhere
//! cargo run --bin admin -- sessions revoke-all user@example.com
//!
//! # List registered users
//! cargo run --bin admin -- users list --limit 50
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` or `DB_*` components (required): PostgreSQL connection
//! - `TOKEN_HASH_SECRET` / `JWT_SECRET`: same keys as the server

use linkgate::application::services::SessionService;
use linkgate::config::{Config, DEV_JWT_SECRET};
use linkgate::domain::entities::normalize_email;
use linkgate::domain::repositories::UserRepository;
use linkgate::infrastructure::persistence::{PgRefreshTokenRepository, PgUserRepository};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing linkgate.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage refresh sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Inspect user accounts
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Delete every expired refresh token
    Sweep,

    /// Revoke every live refresh token of a user
    RevokeAll {
        /// Account email (case and surrounding whitespace are ignored)
        email: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List registered users, newest first
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: i64,

        #[arg(short, long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = Config::load_database_url().context("Database is not configured")?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Sessions { action } => handle_session_action(action, &pool).await?,
        Commands::Users { action } => handle_user_action(action, &pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

fn session_service(pool: &PgPool) -> SessionService<PgRefreshTokenRepository> {
    let hash_secret = std::env::var("TOKEN_HASH_SECRET")
        .or_else(|_| std::env::var("JWT_SECRET"))
        .unwrap_or_else(|_| DEV_JWT_SECRET.to_string());

    SessionService::new(
        Arc::new(PgRefreshTokenRepository::new(Arc::new(pool.clone()))),
        hash_secret,
    )
}

/// Dispatches session commands.
async fn handle_session_action(action: SessionAction, pool: &PgPool) -> Result<()> {
    let sessions = session_service(pool);

    match action {
        SessionAction::Sweep => {
            println!("{}", "🧹 Sweep Expired Sessions".bright_blue().bold());
            println!();

            let removed = sessions
                .sweep_expired()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to sweep sessions: {}", e))?;

            println!(
                "  Removed: {}",
                removed.to_string().bright_white().bold()
            );
            println!();
        }
        SessionAction::RevokeAll { email, yes } => {
            revoke_all(&sessions, pool, &email, yes).await?;
        }
    }

    Ok(())
}

/// Revokes every live session of the user behind `email`.
///
/// Requires confirmation (default: No) unless `--yes` is given.
async fn revoke_all(
    sessions: &SessionService<PgRefreshTokenRepository>,
    pool: &PgPool,
    email: &str,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔒 Revoke All Sessions".bright_blue().bold());
    println!();

    let users = PgUserRepository::new(Arc::new(pool.clone()));
    let email = normalize_email(email);

    let user = users
        .find_by_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("User not found")?;

    println!("  User: {}", user.email.cyan());
    println!("  ID:   {}", user.id.to_string().bright_black());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Revoke every session of this user?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let revoked = sessions
        .revoke_all(user.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to revoke sessions: {}", e))?;

    println!();
    println!(
        "{} {}",
        "✅ Sessions revoked:".green().bold(),
        revoked.to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

/// Dispatches user commands.
async fn handle_user_action(action: UserAction, pool: &PgPool) -> Result<()> {
    let UserAction::List { limit, offset } = action;
    let users = PgUserRepository::new(Arc::new(pool.clone()));

    println!("{}", "👥 Users".bright_blue().bold());
    println!();

    let list = users
        .list(limit, offset)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;

    if list.is_empty() {
        println!("{}", "  No users found".yellow());
        return Ok(());
    }

    println!(
        "  {:<36} {:<40} {:<20}",
        "ID".bright_white().bold(),
        "Email".bright_white().bold(),
        "Registered".bright_white().bold()
    );
    println!("  {}", "─".repeat(96).bright_black());

    for user in &list {
        println!(
            "  {:<36} {:<40} {}",
            user.id.to_string().bright_black(),
            user.email.cyan(),
            user.created_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black()
        );
    }

    println!();
    println!("  Shown: {}", list.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

/// Dispatches database operation commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
            if one != 1 {
                anyhow::bail!("Unexpected probe result: {one}");
            }

            let migrated: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
                    .fetch_one(pool)
                    .await
                    .unwrap_or(0);

            println!("{}", "✅ Database connection OK".green().bold());
            println!(
                "  Applied migrations: {}",
                migrated.to_string().bright_white()
            );
        }
    }

    Ok(())
}
