//! Process configuration, read once at startup.
//!
//! Every flag can also come from the environment. A missing database URL
//! falls back to a local SQLite file instead of failing.

use clap::Parser;
use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://workload.sqlite3";

#[derive(Debug, Clone, Parser)]
#[command(name = "workload-server")]
#[command(about = "HTTP service exposing CRUD operations on apps")]
pub struct ServerConfig {
    /// Connection string for the backing datastore.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// One of trace|debug|info|warn|error. Defaults by build mode.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files. Logs go to stderr when unset.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<String>,
}

impl ServerConfig {
    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or_else(|| workload_core::default_log_level())
    }
}
