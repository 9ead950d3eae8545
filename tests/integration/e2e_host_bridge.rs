//! End-to-end tests for the `piggy-host` binary (stdin/stdout JSON bridge).
//!
//! Each test spawns a fresh subprocess with its own config and state file,
//! sends JSON commands over stdin, and reads JSON responses/events from
//! stdout.

use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

// ---------------------------------------------------------------------------
// Test harness
// ---------------------------------------------------------------------------

struct HostBridgeHarness {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    reader: Lines<BufReader<ChildStdout>>,
    dir: tempfile::TempDir,
}

impl HostBridgeHarness {
    /// Spawn with `period_secs` and a state file inside a fresh temp dir.
    async fn spawn(period_secs: f64) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let state_path = dir.path().join("state.json");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                "[schedule]\namount = 0.5\nperiod_secs = {period_secs}\n\n[store]\nstate_path = {:?}\n",
                state_path.display().to_string()
            ),
        )
        .unwrap();

        let binary = env!("CARGO_BIN_EXE_piggy-host");
        let mut child = Command::new(binary)
            .env("PIGGY_CONFIG", &config_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap_or_else(|e| panic!("failed to spawn piggy-host at {binary}: {e}"));

        let child_stdin = child.stdin.take().expect("no stdin on child process");
        let child_stdout = child.stdout.take().expect("no stdout on child process");

        Self {
            child,
            stdin: BufWriter::new(child_stdin),
            reader: BufReader::new(child_stdout).lines(),
            dir,
        }
    }

    fn state_file(&self) -> std::path::PathBuf {
        self.dir.path().join("state.json")
    }

    /// Send a command and return the next `ResponseEnvelope` (skipping events).
    async fn send(&mut self, cmd: Value) -> Value {
        let mut json = serde_json::to_string(&cmd).unwrap();
        json.push('\n');
        self.stdin.write_all(json.as_bytes()).await.unwrap();
        self.stdin.flush().await.unwrap();
        self.read_response().await
    }

    /// Read the next JSON line from stdout (with timeout).
    async fn read_line(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(10), self.reader.next_line())
            .await
            .expect("timeout reading from piggy-host")
            .expect("IO error reading from piggy-host")
            .expect("unexpected EOF from piggy-host");
        serde_json::from_str(&line).unwrap_or_else(|e| {
            panic!("invalid JSON from piggy-host: {e}\nraw line: {line}");
        })
    }

    /// Read lines until we find a `ResponseEnvelope` (has `"ok"` field).
    async fn read_response(&mut self) -> Value {
        loop {
            let val = self.read_line().await;
            if val.get("ok").is_some() {
                return val;
            }
        }
    }

    /// Read lines until an event named `name` arrives.
    async fn wait_for_event(&mut self, name: &str) -> Value {
        loop {
            let val = self.read_line().await;
            if val.get("event").and_then(Value::as_str) == Some(name) {
                return val;
            }
        }
    }

    /// Close stdin and verify the process exits cleanly (code 0).
    ///
    /// Returns the temp dir so callers can inspect the state file after exit.
    async fn shutdown(mut self) -> tempfile::TempDir {
        drop(self.stdin);
        let status = tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .expect("timeout waiting for piggy-host to exit")
            .expect("failed to wait for piggy-host");
        assert!(status.success(), "piggy-host exited with: {status}");
        self.dir
    }
}

fn make_cmd(command: &str, payload: Value) -> Value {
    serde_json::json!({
        "v": 1,
        "request_id": format!("test-{}", uuid::Uuid::new_v4()),
        "command": command,
        "payload": payload
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn e2e_ping_and_status() {
    let mut h = HostBridgeHarness::spawn(60.0).await;
    let resp = h.send(make_cmd("host.ping", serde_json::json!({}))).await;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["payload"]["pong"], true);

    let resp = h.send(make_cmd("bank.status", Value::Null)).await;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["payload"]["balance_display"], "0.00");
    assert_eq!(resp["payload"]["running"], true);
    assert_eq!(resp["payload"]["period_ms"], 60_000);
    h.shutdown().await;
}

#[tokio::test]
async fn e2e_short_period_credits_and_persists() {
    let mut h = HostBridgeHarness::spawn(0.2).await;

    // Crediting persists (and reports the balance) before the completion.
    let balance = h.wait_for_event("bank.balance_changed").await;
    assert_eq!(balance["v"], 1);
    assert!(balance["payload"]["balance"].as_u64().unwrap() >= 50);
    let event = h.wait_for_event("bank.event_completed").await;
    assert_eq!(event["payload"]["kind"], "event_completed");

    let raw = std::fs::read_to_string(h.state_file()).unwrap();
    assert!(raw.contains("\"balance\""));

    let resp = h.send(make_cmd("bank.pause", Value::Null)).await;
    assert_eq!(resp["payload"]["running"], false);
    assert_eq!(resp["payload"]["phase"], "paused");
    h.shutdown().await;
}

#[tokio::test]
async fn e2e_invalid_commands_get_error_responses() {
    let mut h = HostBridgeHarness::spawn(60.0).await;

    let resp = h
        .send(make_cmd("bank.set_period", serde_json::json!({"secs": 0})))
        .await;
    assert_eq!(resp["ok"], false);
    assert!(resp["error"].as_str().unwrap().contains("period"));

    let resp = h
        .send(make_cmd("bank.set_amount", serde_json::json!({"amount": "abc"})))
        .await;
    assert_eq!(resp["ok"], false);

    let resp = h.send(make_cmd("bank.withdraw", Value::Null)).await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["request_id"], "parse-error");
    h.shutdown().await;
}

#[tokio::test]
async fn e2e_runtime_stop_exits_and_keeps_state() {
    let mut h = HostBridgeHarness::spawn(60.0).await;
    let resp = h.send(make_cmd("bank.reset", Value::Null)).await;
    assert_eq!(resp["payload"]["balance_display"], "0.00");

    let resp = h.send(make_cmd("runtime.stop", Value::Null)).await;
    assert_eq!(resp["ok"], true);
    let dir = h.shutdown().await;

    let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    let file: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(file["entries"]["balance"], "0.00");
}
