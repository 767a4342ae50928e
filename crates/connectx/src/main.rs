// SPDX-FileCopyrightText: 2026 ConnectX Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ConnectX - private messaging server and terminal chat client.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod shell;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use connectx_config::ConnectxConfig;

/// ConnectX - private messaging server and terminal chat client.
#[derive(Parser, Debug)]
#[command(name = "connectx", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the chat server.
    Serve,
    /// Open an interactive chat session.
    Chat {
        /// Your user id.
        #[arg(long)]
        user: String,
        /// Session token. Falls back to the CONNECTX_TOKEN environment variable.
        #[arg(long)]
        token: Option<String>,
    },
    /// Manage users in the local database.
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Create an accepted connection between two users.
    Connect { a: String, b: String },
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Register a user (or update an existing one) and print their token.
    Add {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: Option<String>,
        /// Token to assign. A random one is generated when omitted.
        #[arg(long)]
        token: Option<String>,
    },
    /// List registered users.
    List,
}

const TOKEN_ENV_VAR: &str = "CONNECTX_TOKEN";

/// The `--token` flag wins over the environment. Empty values count as unset.
fn resolve_token(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
        .filter(|token| !token.is_empty())
}

fn load_config(path: Option<&PathBuf>) -> ConnectxConfig {
    let loaded = match path {
        Some(path) => connectx_config::load_and_validate_path(path),
        None => connectx_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            connectx_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Chat { user, token }) => {
            let Some(token) = resolve_token(token) else {
                eprintln!(
                    "{}: a session token is required (--token or CONNECTX_TOKEN)",
                    "error".red()
                );
                std::process::exit(2);
            };
            shell::run_chat(config, user.into(), token).await
        }
        Some(Commands::User { action }) => match action {
            UserCommands::Add {
                id,
                name,
                username,
                token,
            } => admin::add_user(&config, &id, &name, username.as_deref(), token.as_deref())
                .await
                .map(|token| println!("{token}")),
            UserCommands::List => admin::list_users(&config).await,
        },
        Some(Commands::Connect { a, b }) => admin::connect(&config, &a, &b).await,
        Some(Commands::Config) => admin::print_config(&config),
        None => {
            println!("connectx: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}
