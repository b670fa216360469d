//! distqd: the distq daemon.
//!
//! Single binary that assembles the remote-query server:
//! - Key-value store (Redis, or an embedded redb file)
//! - Node registry + query store
//! - Agent protocol and operator HTTP API
//!
//! # Usage
//!
//! ```text
//! distqd serve --config /etc/distq/distq.toml
//! distqd serve --store embedded --data-dir /var/lib/distq --enroll-secret s3cret
//! distqd config --config /etc/distq/distq.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use distq_core::{DistqConfig, StoreBackend};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,distqd=debug,distq=debug";
const DB_FILE: &str = "distq.redb";

#[derive(Parser)]
#[command(name = "distqd", about = "distq remote-query server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server.
    Serve(Overrides),
    /// Print the effective configuration and exit.
    Config(Overrides),
}

/// Command-line values layered over the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Pre-shared secret agents present when enrolling.
    #[arg(long, env = "DISTQ_ENROLL_SECRET", hide_env_values = true)]
    enroll_secret: Option<String>,

    /// Store backend: `redis` or `embedded`.
    #[arg(long)]
    store: Option<StoreBackend>,

    /// Redis connection URL.
    #[arg(long)]
    redis_url: Option<String>,

    /// Data directory for the embedded store.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bearer token required on operator endpoints.
    #[arg(long, env = "DISTQ_OPERATOR_TOKEN", hide_env_values = true)]
    operator_token: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Overrides {
    fn load(&self) -> anyhow::Result<DistqConfig> {
        let mut config = match &self.config {
            Some(path) => DistqConfig::from_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?,
            None => DistqConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut DistqConfig) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(secret) = &self.enroll_secret {
            config.enroll.secret = secret.clone();
        }
        if let Some(backend) = self.store {
            config.store.backend = backend;
        }
        if let Some(url) = &self.redis_url {
            config.store.redis_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.store.path = dir.join(DB_FILE);
        }
        if let Some(token) = &self.operator_token {
            config.operator.token = Some(token.clone());
        }
        if self.log_json {
            config.log.json = true;
        }
    }
}

fn init_tracing(log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(overrides) => {
            let config = overrides.load()?;
            init_tracing(config.log.json);
            config.validate()?;
            run_server(config).await
        }
        Command::Config(overrides) => {
            let mut config = overrides.load()?;
            if !config.enroll.secret.is_empty() {
                config.enroll.secret = "<redacted>".to_string();
            }
            if config.operator.token.is_some() {
                config.operator.token = Some("<redacted>".to_string());
            }
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn run_server(config: DistqConfig) -> anyhow::Result<()> {
    info!(backend = %config.store.backend, "distq server starting");

    // ── Initialize subsystems ──────────────────────────────────

    // Unreachable store is fatal.
    let store = distq_state::KvStore::connect(&config.store).await?;

    let registry = distq_registry::NodeRegistry::new(store, config.enroll.secret.clone());
    let operator_token = config.operator_token().map(str::to_string);
    if operator_token.is_none() {
        info!("no operator token configured, operator endpoints rely on the fronting gate");
    }
    let state = distq_api::ApiState::new(registry, operator_token);

    // ── Start API server ───────────────────────────────────────

    let router = distq_api::build_router(state);
    let addr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
            }
        })
        .await?;

    info!("distq server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "distqd",
            "serve",
            "--listen",
            "127.0.0.1:9000",
            "--enroll-secret",
            "s3cret",
            "--store",
            "embedded",
            "--data-dir",
            "/tmp/distq",
            "--log-json",
        ]);
        let Command::Serve(overrides) = cli.command else {
            panic!("expected serve");
        };
        let config = overrides.load().unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.enroll.secret, "s3cret");
        assert_eq!(config.store.backend, StoreBackend::Embedded);
        assert_eq!(config.store.path, PathBuf::from("/tmp/distq/distq.redb"));
        assert!(config.log.json);
        config.validate().unwrap();
    }

    #[test]
    fn flags_override_file() {
        let mut config: DistqConfig = toml::from_str(
            r#"
            [enroll]
            secret = "from-file"

            [store]
            redis_url = "redis://cache:6379/0"
            "#,
        )
        .unwrap();
        let overrides = Overrides {
            redis_url: Some("redis://other:6379/1".to_string()),
            ..Default::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.enroll.secret, "from-file");
        assert_eq!(config.store.redis_url, "redis://other:6379/1");
        assert_eq!(config.store.backend, StoreBackend::Redis);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let parsed = Cli::try_parse_from(["distqd", "serve", "--store", "sqlite"]);
        assert!(parsed.is_err());
    }
}
