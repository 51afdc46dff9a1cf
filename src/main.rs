//! tokengate - stateless bearer-token authentication server

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokengate_api::{ApiServer, ApiServerConfig};
use tokengate_auth::{hash_password, TokenAuthority, DEFAULT_ISSUER};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{load_users, ServeConfig};

/// tokengate - Issue and verify signed bearer tokens
#[derive(Parser)]
#[command(name = "tokengate")]
#[command(about = "tokengate - Issue and verify signed bearer tokens")]
#[command(version)]
#[command(long_version = concat!(
    env!("GIT_TAG"),
    "\nCommit: ",
    env!("GIT_HASH"),
    "\nBuilt: ",
    env!("BUILD_TIME")
))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server with login and protected endpoints
    #[command(long_about = r#"
Run the HTTP server. Clients exchange a username and password at
POST /api/auth/login for a signed token, then present it as
`Authorization: Bearer <token>` on protected routes.

The signing secret is required. The server refuses to start without it.

Examples:
  JWT_SECRET=... tokengate serve --users-file users.json
  tokengate serve --users-file users.json --token-ttl 2h --bind 0.0.0.0:3000
"#)]
    Serve {
        /// Address to bind the HTTP server
        #[arg(long, env = "TOKENGATE_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Secret used to sign and verify tokens (HS256)
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,

        /// Token lifetime (e.g. 30m, 2h, 1day)
        #[arg(long, env = "TOKEN_TTL", default_value = "1h", value_parser = humantime::parse_duration)]
        token_ttl: Duration,

        /// Issuer written into and required on every token
        #[arg(long, env = "TOKEN_ISSUER", default_value = DEFAULT_ISSUER)]
        issuer: String,

        /// JSON file with user records (user_id, username, password_hash, role)
        #[arg(long, env = "TOKENGATE_USERS_FILE")]
        users_file: PathBuf,

        /// Allowed CORS origins, comma separated (CORS disabled when empty)
        #[arg(long = "cors-origin", env = "TOKENGATE_CORS_ORIGINS", value_delimiter = ',')]
        cors_origins: Vec<String>,
    },

    /// Read a password from stdin and print its Argon2 hash
    HashPassword,
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn serve(config: ServeConfig, users_file: PathBuf) -> Result<()> {
    let authority =
        TokenAuthority::new(config.authority).context("Failed to create token authority")?;

    let store = load_users(&users_file)?;
    info!("Loaded {} users from {:?}", store.len(), users_file);

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: config.bind_addr,
            enable_cors: config.cors_origins.is_some(),
            cors_origins: config.cors_origins,
        },
        Arc::new(authority),
        Arc::new(store),
    );

    server.start().await
}

fn hash_from_stdin() -> Result<()> {
    let mut password = String::new();
    io::stdin()
        .lock()
        .read_line(&mut password)
        .context("Failed to read password from stdin")?;

    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        anyhow::bail!("Password is empty");
    }

    let hash = hash_password(password).context("Failed to hash password")?;
    println!("{}", hash);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Serve {
            bind,
            jwt_secret,
            token_ttl,
            issuer,
            users_file,
            cors_origins,
        } => {
            info!(
                "Starting tokengate {} ({})",
                env!("GIT_TAG"),
                env!("GIT_HASH")
            );
            let config = ServeConfig::new(bind, jwt_secret, token_ttl, issuer, cors_origins)?;
            info!(
                "Tokens expire after {}",
                humantime::format_duration(config.authority.token_ttl)
            );
            serve(config, users_file).await
        }
        Commands::HashPassword => hash_from_stdin(),
    }
}
