//! Stdin/stdout JSON bridge for the piggy bank.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages from stdin,
//! routes them through [`BankRouter`], and writes `ResponseEnvelope` and
//! `EventEnvelope` messages as newline-delimited JSON to stdout.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::clock::SystemClock;
use crate::config::PiggyConfig;
use crate::error::{PiggyError, Result};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use crate::host::router::{BankHost, BankRouter, notice_envelope};
use crate::store::{JsonFileStore, MemoryStore, StateStore};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Run the bridge on the process's stdin/stdout until stdin closes or a
/// `runtime.stop` command is received.
///
/// State is kept in the configured JSON file. Without a resolvable path
/// the bank runs on an in-memory store and forgets its balance on exit.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or stdout fails.
pub async fn run_stdio_bridge(config: PiggyConfig) -> Result<()> {
    let store: Box<dyn StateStore> = match config.store.resolved_path() {
        Some(path) => {
            let store = JsonFileStore::new(path);
            info!(path = %store.path().display(), "using state file");
            Box::new(store)
        }
        None => {
            warn!("no state path available; balance will not survive restarts");
            Box::new(MemoryStore::new())
        }
    };

    let host = BankHost::start(&config, Box::new(SystemClock), store)?;
    run_bridge(
        host,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Run the bridge over arbitrary line-oriented streams.
///
/// Two tasks share the writer:
///
/// 1. **Reader** (this task) parses each line, routes it, and writes the
///    response.
/// 2. **Notice forwarder** writes each scheduler notice as a `bank.*`
///    event envelope.
///
/// When the reader finishes the scheduler is shut down. The forwarder then
/// drains the remaining notices and exits once the scheduler is dropped.
///
/// # Errors
///
/// Returns [`PiggyError::Channel`] if reading or writing fails.
pub async fn run_bridge<R, W>(host: BankHost, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let BankHost {
        router,
        mut notices,
        runner,
    } = host;
    let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(writer)));

    let event_writer = Arc::clone(&writer);
    let event_handle = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            let json = match notice_envelope(&notice).and_then(|env| to_json(&env)) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "failed to serialize notice; skipping");
                    continue;
                }
            };
            let mut w = event_writer.lock().await;
            if let Err(e) = write_line(&mut w, &json).await {
                warn!(error = %e, "failed to write event envelope; stopping notice forwarder");
                break;
            }
        }
    });

    let reader_result = run_reader(&router, reader, Arc::clone(&writer)).await;

    // Idempotent after runtime.stop; the runner may already be gone.
    let _ = router.handle().shutdown();
    drop(router);
    if let Err(e) = runner.await {
        error!(error = %e, "scheduler runner task failed");
    }
    if let Err(e) = event_handle.await {
        error!(error = %e, "notice forwarder task failed");
    }

    reader_result
}

async fn run_reader<R, W>(router: &BankRouter, mut reader: R, writer: SharedWriter<W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| PiggyError::Channel(format!("failed to read command stream: {e}")))?;

        if bytes_read == 0 {
            info!("command stream closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_line(&mut *writer.lock().await, &to_json(&response)?).await?;
                continue;
            }
        };

        let is_stop = envelope.command == CommandName::RuntimeStop;
        let response = dispatch(router, &envelope).await;
        write_line(&mut *writer.lock().await, &to_json(&response)?).await?;

        if is_stop {
            info!("runtime.stop received; shutting down bridge");
            break;
        }
    }

    Ok(())
}

async fn dispatch(router: &BankRouter, envelope: &CommandEnvelope) -> ResponseEnvelope {
    if let Err(e) = envelope.validate() {
        return ResponseEnvelope::error(envelope.request_id.clone(), e.to_string());
    }
    match router.route(envelope).await {
        Ok(response) => response,
        Err(e) => {
            warn!(command = envelope.command.as_str(), error = %e, "host command rejected");
            ResponseEnvelope::error(envelope.request_id.clone(), e.to_string())
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| PiggyError::Host(format!("failed to serialize envelope: {e}")))
}

/// Write a single JSON line to the buffered writer and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| PiggyError::Channel(format!("failed to write envelope: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| PiggyError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| PiggyError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
