//! Server entry point.
//!
//! # Responsibility
//! - Read configuration, start logging, open storage, serve HTTP.
//! - Own the storage handle for the lifetime of the process.
//!
//! # Invariants
//! - Schema bootstrap failure is logged and does not stop startup.

mod config;
mod http;

use clap::Parser;
use config::ServerConfig;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;
use std::sync::Arc;
use workload_core::{init_logging, open_storage, AppService, Context, DbError};

/// Failures that stop the server before or while serving.
#[derive(Debug)]
enum StartupError {
    Storage(DbError),
    Io(std::io::Error),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "unable to open database: {err}"),
            Self::Io(err) => write!(f, "server i/o failure: {err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<DbError> for StartupError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<std::io::Error> for StartupError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = ServerConfig::parse();
    if let Err(err) = init_logging(config.log_level(), config.log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    match serve(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_exit module=server status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ServerConfig) -> Result<(), StartupError> {
    let storage = Arc::new(open_storage(&config.database_url)?);

    let service = AppService::new(Arc::clone(&storage));
    if let Err(err) = service.bootstrap_schema(&Context::new()) {
        warn!(
            "event=server_start module=server status=degraded error_code={} error={}",
            err.code(),
            err
        );
    }

    let app = http::router(Arc::new(service));
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        "event=server_start module=server status=ok addr={}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_exit module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=shutdown_signal module=server status=error error={err}");
    }
}
