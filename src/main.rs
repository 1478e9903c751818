use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use dashls::{
    api::{self, AppState},
    config::load_config,
    dash::client::MpdClient,
    key::KeyService,
    session::SessionManager,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dashlsd", version, about = "Live MPEG-DASH to HLS proxy")]
struct Args {
    /// HTTP listen address
    #[arg(short = 'l', default_value = ":8080")]
    listen: String,

    /// Log level
    #[arg(short = 'L', value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Path to the channel config file
    #[arg(short = 'c', default_value = "channels.json")]
    config: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_directive())),
        )
        .init();

    info!("starting DASH to HLS proxy");

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(error) => {
            error!(path = %args.config.display(), %error, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(name = %config.name, channels = config.channels.len(), "configuration loaded");

    let keys = match KeyService::new(&config) {
        Ok(keys) => keys,
        Err(error) => {
            error!(%error, "failed to initialize key service");
            return ExitCode::FAILURE;
        }
    };

    let mpd_client = match MpdClient::new() {
        Ok(client) => client,
        Err(error) => {
            error!(%error, "failed to build MPD client");
            return ExitCode::FAILURE;
        }
    };

    let sessions = SessionManager::new(config, mpd_client);
    sessions.start();

    let state = Arc::new(AppState { sessions, keys });
    let app = api::router(state.clone());

    let addr = normalize_listen_addr(&args.listen);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(%addr, %error, "could not bind listen address");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "server starting");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(%error, "server error");
        return ExitCode::FAILURE;
    }

    info!("server is shutting down");
    state.sessions.stop().await;
    info!("server exited gracefully");

    ExitCode::SUCCESS
}

/// Accept the conventional bare `:port` form.
fn normalize_listen_addr(listen: &str) -> String {
    match listen.strip_prefix(':') {
        Some(port) if port.chars().all(|c| c.is_ascii_digit()) => format!("0.0.0.0:{port}"),
        _ => listen.to_string(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => error!(%error, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
