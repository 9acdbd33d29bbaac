//! E-Store CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! estore-cli migrate
//!
//! # Create an admin account
//! estore-cli admin create -e admin@example.com -p 'long-password' -f Ada -l Lovelace
//!
//! # Add a product to the catalog
//! estore-cli product add -t "Mate gourd" -p 120.00 -s 10 -o seller@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "estore-cli")]
#[command(author, version, about = "E-Store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage catalog products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        #[arg(short, long, default_value = "Admin")]
        first_name: String,

        #[arg(short, long, default_value = "")]
        last_name: String,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Add a product
    Add {
        #[arg(short, long)]
        title: String,

        /// Unit price, e.g. `120.00`
        #[arg(short, long)]
        price: Decimal,

        #[arg(short, long)]
        stock: i32,

        /// Email of the owning account
        #[arg(short, long)]
        owner: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "")]
        category: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                password,
                first_name,
                last_name,
            } => {
                commands::admin::create_user(&email, &password, &first_name, &last_name).await?;
            }
        },
        Commands::Product { action } => match action {
            ProductAction::Add {
                title,
                price,
                stock,
                owner,
                description,
                category,
            } => {
                commands::product::add(commands::product::ProductArgs {
                    title,
                    description,
                    price,
                    stock,
                    category,
                    owner,
                })
                .await?;
            }
        },
    }
    Ok(())
}
