//! Headless piggy bank host for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin and
//! writes `ResponseEnvelope` and `EventEnvelope` messages to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.
//!
//! Configuration is read from `--config <path>`, then `$PIGGY_CONFIG`,
//! otherwise from the default config path if that file exists.

use anyhow::Context;
use piggy::PiggyConfig;
use piggy::host::stdio::run_stdio_bridge;
use std::path::PathBuf;

fn config_arg() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--config") => args
            .next()
            .map(|path| Some(PathBuf::from(path)))
            .ok_or_else(|| anyhow::anyhow!("usage: piggy-host [--config <path>]")),
        Some(other) => {
            anyhow::bail!("unexpected argument `{other}`; usage: piggy-host [--config <path>]")
        }
    }
}

fn load_config() -> anyhow::Result<PiggyConfig> {
    let requested = config_arg()?.or_else(|| std::env::var_os("PIGGY_CONFIG").map(PathBuf::from));
    let (path, explicit) = match requested {
        Some(path) => (path, true),
        None => (PiggyConfig::default_config_path(), false),
    };

    if !explicit && !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(PiggyConfig::default());
    }

    let config = PiggyConfig::from_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout is reserved for the JSON protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("piggy=info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!(
        amount = config.schedule.amount,
        period_secs = config.schedule.period_secs,
        "piggy-host starting"
    );

    run_stdio_bridge(config).await.map_err(|e| {
        tracing::error!(error = %e, "piggy-host exited with error");
        anyhow::anyhow!("piggy-host failed: {e}")
    })?;

    tracing::info!("piggy-host shut down cleanly");
    Ok(())
}
