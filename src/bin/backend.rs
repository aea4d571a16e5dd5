#![forbid(unsafe_code)]

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio::signal;
use viewtube_api::{
    api::{self, AppState},
    auth::hash_password,
    config::{DEFAULT_CONFIG_PATH, load_app_config_from},
    id::ObjectId,
    models::NewUser,
    security::ensure_not_root,
    telemetry,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run and administer the ViewTube API.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        #[arg(long = "host", value_name = "ADDR", help = "Override VIEWTUBE_HOST")]
        host: Option<String>,
        #[arg(long = "port", value_name = "PORT", help = "Override VIEWTUBE_PORT")]
        port: Option<u16>,
    },
    /// Create a user account.
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long = "full-name")]
        full_name: String,
        #[arg(long)]
        password: String,
    },
    /// Print a signed access token for an existing user.
    IssueToken {
        #[arg(long = "user-id", value_name = "ID")]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ensure_not_root("backend")?;

    let mut config = load_app_config_from(&cli.config)?;
    telemetry::init(config.log_format)?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(AppState::from_config(config)?).await
        }
        Command::CreateUser {
            username,
            email,
            full_name,
            password,
        } => {
            let state = AppState::from_config(config)?;
            let password_hash =
                hash_password(&password).map_err(|err| anyhow!("hashing password: {err}"))?;
            let user = state.db.insert_user(&NewUser {
                username,
                email,
                full_name,
                password_hash,
                avatar: None,
            })?;
            println!("{}", user.id());
            Ok(())
        }
        Command::IssueToken { user_id } => {
            let state = AppState::from_config(config)?;
            let id = ObjectId::parse(&user_id).with_context(|| format!("parsing user id {user_id:?}"))?;
            let principal = state
                .db
                .find_principal(id)?
                .ok_or_else(|| anyhow!("no user with id {id}"))?;
            let token = state.tokens.issue(&principal).context("signing access token")?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> Result<()> {
    let addr = SocketAddr::new(
        state
            .config
            .host
            .parse()
            .with_context(|| format!("parsing host {:?}", state.config.host))?,
        state.config.port,
    );
    tracing::info!(
        database = %state.db.path().display(),
        media_root = %state.config.media_root.display(),
        debug_errors = state.config.debug_errors,
        "starting ViewTube API"
    );

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!("API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
    }
}
