//! Wanderlance CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run SQLite migrations
//! wl-cli migrate
//!
//! # Create a user (optionally an admin)
//! wl-cli user create -e ana@example.com -u ana -p 'correct horse battery' -r admin
//!
//! # Promote an existing user to admin
//! wl-cli user promote -e ana@example.com
//!
//! # Insert sample transactions for a user
//! wl-cli seed transactions -e ana@example.com -n 5
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "wl-cli")]
#[command(author, version, about = "Wanderlance CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run SQLite migrations against DATABASE_URL
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Insert sample data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new local account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Username (3-30 characters)
        #[arg(short, long)]
        username: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`user`, `admin`)
        #[arg(short, long, default_value = "user")]
        role: String,
    },
    /// Give an existing account the admin role
    Promote {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Sample transactions for one buyer
    Transactions {
        /// Buyer's email address
        #[arg(short, long)]
        email: String,

        /// Number of transactions
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
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
        Commands::User { action } => {
            let store = commands::open_store().await?;
            match action {
                UserAction::Create {
                    email,
                    username,
                    password,
                    role,
                } => {
                    commands::user::create(store.as_ref(), &email, &username, &password, &role)
                        .await?;
                }
                UserAction::Promote { email } => {
                    commands::user::promote(store.as_ref(), &email).await?;
                }
            }
        }
        Commands::Seed { target } => {
            let store = commands::open_store().await?;
            match target {
                SeedTarget::Transactions { email, count } => {
                    commands::seed::transactions(store.as_ref(), &email, count).await?;
                }
            }
        }
    }
    Ok(())
}
