//! Fernleaf CLI - Database migrations and admin management.
//!
//! # Usage
//!
//! ```bash
//! # Apply SQL migrations to the backend database
//! fl-cli migrate
//!
//! # Grant or revoke the admin flag on an existing account
//! fl-cli admin grant --email owner@fernleaf.shop
//! fl-cli admin revoke --email owner@fernleaf.shop
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin grant` / `admin revoke` - Set `user_profiles.is_admin`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fl-cli")]
#[command(author, version, about = "Fernleaf CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the admin flag
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an account admin access
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Take admin access away from an account
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { email } => {
                commands::admin::grant(&email).await?;
            }
            AdminAction::Revoke { email } => {
                commands::admin::revoke(&email).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_admin_grant_parses_email() {
        let cli = Cli::try_parse_from(["fl-cli", "admin", "grant", "--email", "a@b.co"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin {
                action: AdminAction::Grant { .. }
            })
        ));
    }
}
