//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `HostMessage` lines from stdin, runs them through the turn
//! coordinator, and writes engine requests and runtime events to stdout.
//!
//! All tracing/diagnostic output goes to stderr (and optionally a daily log
//! file under `JARVIS_LOG_DIR`) so that stdout remains a clean JSON protocol
//! channel.

use jarvis::AssistantConfig;
use jarvis::host::stdio::run_stdio_bridge;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jarvis=info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    match std::env::var_os("JARVIS_LOG_DIR") {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "jarvis");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

fn load_config() -> anyhow::Result<AssistantConfig> {
    let path = std::env::var_os("JARVIS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(AssistantConfig::default_config_path);
    let config = if path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        AssistantConfig::from_file(&path)?
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        AssistantConfig::with_default_providers()
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so buffered log lines are flushed on exit.
    let _guard = init_tracing();

    tracing::info!("jarvis-host starting");
    let config = load_config()?;

    run_stdio_bridge(config).await.map_err(|e| {
        tracing::error!(error = %e, "jarvis-host exited with error");
        anyhow::anyhow!("jarvis-host failed: {e}")
    })?;

    tracing::info!("jarvis-host shut down cleanly");
    Ok(())
}
