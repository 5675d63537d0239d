//! Verdora CLI - database migrations, catalog seeding and admin accounts.
//!
//! # Usage
//!
//! ```bash
//! # Create the cart, wishlist and session tables
//! verdora migrate
//!
//! # Load products from a YAML file into the data endpoint
//! verdora seed --file crates/cli/seed/plants.yaml
//!
//! # Create a back-office account
//! verdora admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Give an existing shopper back-office access
//! verdora admin promote -e fern@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use url::Url;

mod commands;

#[derive(Parser)]
#[command(name = "verdora")]
#[command(author, version, about = "Verdora CLI tools")]
struct Cli {
    /// Data endpoint base URL
    #[arg(
        long,
        global = true,
        env = "VERDORA_DATA_URL",
        default_value = "http://localhost:3001"
    )]
    data_url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Create products from a YAML file
    Seed {
        /// Path to a YAML list of products
        #[arg(short, long)]
        file: String,

        /// Validate the file without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage back-office accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long, env = "VERDORA_ADMIN_PASSWORD")]
        password: String,
    },
    /// Grant the admin role to an existing user
    Promote {
        /// Email of the user to promote
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

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
        Commands::Seed { file, dry_run } => {
            commands::seed::products(&cli.data_url, &file, dry_run).await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&cli.data_url, &email, &name, &password).await?;
            }
            AdminAction::Promote { email } => {
                commands::admin::promote(&cli.data_url, &email).await?;
            }
        },
    }
    Ok(())
}
