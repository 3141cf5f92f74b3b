use std::io::BufRead;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Result, bail};
use axum::Router;
use clap::{Parser, Subcommand};
use crm_gatekeeper::auth::DEFAULT_LOOKUP_TIMEOUT_SECS;
use crm_gatekeeper::config::{DEFAULT_REQUEST_TIMEOUT_SECS, parse_origins};
use crm_gatekeeper::{
    AuthConfig, DatabaseConfig, Secret, ServerConfig, create_connection, create_gatekeeper,
    create_router, ensure_schema, hash_api_key,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crm-gatekeeper")]
#[command(about = "Authentication gatekeeper for the CRM HTTP API")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOG_JSON", default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the gatekeeper-protected API
    Serve {
        #[arg(short, long, env = "PORT", default_value = "8080")]
        port: u16,
        /// HMAC secret shared with the session issuer
        #[arg(long, env = "BETTER_AUTH_SECRET", hide_env_values = true)]
        secret: String,
        /// Local development mode (plain session cookie name)
        #[arg(long, env = "DEV", default_value_t = false)]
        dev: bool,
        /// Comma-separated list of allowed CORS origins
        #[arg(long, env = "CORS_ALLOWED_ORIGINS")]
        cors_origins: Option<String>,
        #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
        request_timeout_secs: u64,
        #[arg(long, env = "LOOKUP_TIMEOUT_SECS", default_value_t = DEFAULT_LOOKUP_TIMEOUT_SECS)]
        lookup_timeout_secs: u64,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Initialize the credential tables
    Init {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Print the storage hash of an API key read from stdin
    HashKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("crm_gatekeeper=info".parse()?)
        .add_directive("tower_http=info".parse()?);
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    match cli.command {
        Commands::Serve {
            port,
            secret,
            dev,
            cors_origins,
            request_timeout_secs,
            lookup_timeout_secs,
            db_url,
        } => {
            let secret = Secret::non_empty(secret, "BETTER_AUTH_SECRET")?;

            let mut server = ServerConfig {
                port,
                dev,
                request_timeout: Duration::from_secs(request_timeout_secs),
                ..Default::default()
            };
            if let Some(origins) = cors_origins.as_deref().map(parse_origins)
                && !origins.is_empty()
            {
                server.allowed_origins = origins;
            }

            let auth_config = AuthConfig::for_server(secret, &server)
                .with_lookup_timeout(Duration::from_secs(lookup_timeout_secs));
            info!(
                cookie = %auth_config.session_cookie_name,
                lookup_timeout_secs,
                "Authentication configured"
            );

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for credential lookups: {}", db_config.url);

            // Credential tables are owned by the issuer; run `init` for local setup.
            let db = create_connection(db_config).await?;
            let gatekeeper = create_gatekeeper(auth_config, db);
            let app = create_router(Router::new(), gatekeeper, &server);

            let bind = server.bind_addr();
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!(
                origins = ?server.allowed_origins,
                dev = server.dev,
                "Gatekeeper listening on http://{}",
                bind
            );

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
            info!("Gatekeeper shut down");
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for initialization: {}", db_config.url);

            info!("Initializing database...");
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::HashKey => {
            let key = read_api_key(std::io::stdin().lock())?;
            println!("{}", hash_api_key(&key));
        }
    }

    Ok(())
}

/// Read a raw API key from the first line of `input`.
fn read_api_key(mut input: impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let key = line.trim_end_matches(['\r', '\n']);
    if key.is_empty() {
        bail!("No API key on stdin");
    }
    Ok(key.to_string())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_api_key_takes_first_line() {
        let key = read_api_key("sk_live_abc\r\nignored\n".as_bytes()).unwrap();
        assert_eq!(key, "sk_live_abc");
        assert_eq!(
            hash_api_key(&key),
            hash_api_key("sk_live_abc")
        );
    }

    #[test]
    fn test_read_api_key_rejects_empty_input() {
        assert!(read_api_key("".as_bytes()).is_err());
        assert!(read_api_key("\n".as_bytes()).is_err());
    }
}
