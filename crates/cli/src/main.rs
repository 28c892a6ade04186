//! Bazaar CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bazaar-cli migrate
//!
//! # Promote an account to admin
//! bazaar-cli user set-role -e admin@example.com -r admin
//!
//! # End an account's session
//! bazaar-cli user sign-out -e someone@example.com
//!
//! # Rebuild the featured products cache
//! bazaar-cli featured rebuild
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage the featured products cache
    Featured {
        #[command(subcommand)]
        action: FeaturedAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Change an account's role
    SetRole {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// New role (`customer`, `seller` or `admin`)
        #[arg(short, long)]
        role: String,
    },
    /// Revoke an account's refresh token
    SignOut {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum FeaturedAction {
    /// Recompute the cached featured list from the database
    Rebuild,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::SetRole { email, role } => commands::user::set_role(&email, &role).await?,
            UserAction::SignOut { email } => commands::user::sign_out(&email).await?,
        },
        Commands::Featured { action } => match action {
            FeaturedAction::Rebuild => commands::featured::rebuild().await?,
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
    fn test_parses_set_role() {
        let cli = Cli::try_parse_from([
            "bazaar-cli",
            "user",
            "set-role",
            "-e",
            "a@b.test",
            "-r",
            "admin",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::User {
                action: UserAction::SetRole { ref email, ref role }
            } if email == "a@b.test" && role == "admin"
        ));
    }
}
