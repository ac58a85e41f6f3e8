use crate::server::{ServerState, images::ImageStore, schema::Pagination};
use feednews_common::{
    auth::token::TokenCodec,
    snowflake::{ProcessId, SnowflakePartOutOfRangeError, WorkerId},
    util::{NonPositiveDurationError, PositiveDuration},
};
use feednews_db::{
    client::DbClient,
    memory::MemoryStore,
    store::{DbError, SharedStore},
};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid worker or process id: {0}")]
    NodeId(#[from] SnowflakePartOutOfRangeError),
    #[error("Invalid token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
    #[error("Error setting up the store: {0}")]
    Database(#[from] DbError),
    #[error("Error creating the image directory: {0}")]
    ImageDir(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_posts_per_page() -> u64 {
    20
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    token_secret: String,
    /// Tokens never expire if unset.
    token_ttl_seconds: Option<i64>,
    /// Everything is kept in memory if unset.
    database_url: Option<String>,
    #[serde(default = "default_image_dir")]
    image_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    max_upload_bytes: usize,
    #[serde(default = "default_posts_per_page")]
    posts_per_page: u64,
    #[serde(default)]
    worker_id: u8,
    #[serde(default)]
    process_id: u8,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "feednews_api=debug,\
                feednews_common=debug,\
                feednews_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn open_store(env: &Env) -> Result<SharedStore, InitError> {
    let worker_id = WorkerId::try_from(env.worker_id)?;
    let process_id = ProcessId::try_from(env.process_id)?;

    if let Some(database_url) = &env.database_url {
        let client = DbClient::connect(database_url, worker_id, process_id).await?;
        client.migrate().await?;
        info!("Connected to database");

        Ok(Arc::new(client))
    } else {
        warn!("DATABASE_URL is not set, data will be lost on shutdown");

        Ok(Arc::new(MemoryStore::new(worker_id, process_id)))
    }
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutting down");
            shutdown.cancel();
        }
        Err(err) => error!(error = %err, "Could not listen for Ctrl-C"),
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let store = open_store(&env).await?;
    let token_lifetime = env
        .token_ttl_seconds
        .map(PositiveDuration::from_seconds)
        .transpose()?;
    let tokens = Arc::new(TokenCodec::new(env.token_secret.as_bytes(), token_lifetime));

    tokio::fs::create_dir_all(&env.image_dir)
        .await
        .map_err(InitError::ImageDir)?;
    let images = Arc::new(ImageStore::new(env.image_dir.clone()));

    let state = ServerState::new(
        store,
        tokens,
        images,
        Pagination {
            posts_per_page: env.posts_per_page.max(1),
        },
    );
    let app = server::app(state, env.max_upload_bytes);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
