use crate::config::ProviderConfig;
use crate::transport::traits::{ConnectedTransport, Connection};
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

const INBOUND_BUFFER: usize = 100;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Stdio connection to a provider child process
pub struct StdioConnection {
    name: String,
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<ChildStdin>>,
    is_connected: Arc<AtomicBool>,
}

impl StdioConnection {
    /// Spawn the provider and start reading its stdout.
    pub async fn spawn(name: &str, config: &ProviderConfig) -> McpResult<ConnectedTransport> {
        let command = config
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| McpError::ConfigError(format!("Provider '{}' has no command", name)))?;

        info!("Spawning provider '{}': {} {}", name, command, config.args.join(" "));

        let mut child = Command::new(command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::TransportError(format!("Failed to spawn '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::TransportError("Failed to open stdin".to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::TransportError("Failed to open stdout".to_string()))?;

        let connection = Self {
            name: name.to_string(),
            child: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(stdin)),
            is_connected: Arc::new(AtomicBool::new(true)),
        };

        let inbound = connection.start_reader(stdout);

        Ok(ConnectedTransport {
            connection: Arc::new(connection),
            inbound,
        })
    }

    fn start_reader(&self, stdout: ChildStdout) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let is_connected = self.is_connected.clone();
        let name = self.name.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        debug!("[{}] received: {}", name, line);

                        match serde_json::from_str::<Value>(line) {
                            Ok(payload) => {
                                if tx.send(payload).await.is_err() {
                                    debug!("[{}] inbound receiver dropped", name);
                                    break;
                                }
                            }
                            // Providers often log to stdout; skip non-JSON lines.
                            Err(e) => warn!("[{}] ignoring non-JSON line: {}", name, e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("[{}] stdout read error: {}", name, e);
                        break;
                    }
                }
            }

            info!("[{}] stdio reader task ended", name);
            is_connected.store(false, Ordering::SeqCst);
        });

        rx
    }
}

#[async_trait]
impl Connection for StdioConnection {
    async fn send_text(&self, text: String) -> McpResult<()> {
        if !self.is_connected.load(Ordering::SeqCst) {
            return Err(McpError::TransportError(format!(
                "Provider '{}' is not connected",
                self.name
            )));
        }

        let mut stdin = self.stdin.lock().await;
        let written = async {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        written.map_err(|e| {
            self.is_connected.store(false, Ordering::SeqCst);
            McpError::TransportError(format!("Failed to write to '{}': {}", self.name, e))
        })
    }

    fn supports_mcp(&self) -> bool {
        true
    }

    async fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> McpResult<()> {
        self.is_connected.store(false, Ordering::SeqCst);
        let mut child = self.child.lock().await;

        if let Err(e) = child.start_kill() {
            warn!("[{}] failed to kill child process: {}", self.name, e);
        }

        match tokio::time::timeout(CLOSE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => info!("[{}] child process exited with: {:?}", self.name, status),
            Ok(Err(e)) => error!("[{}] failed to wait for child: {}", self.name, e),
            Err(_) => warn!("[{}] timeout waiting for child process", self.name),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_requires_command() {
        let result = StdioConnection::spawn("empty", &ProviderConfig::default()).await;
        assert!(matches!(result, Err(McpError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_is_transport_error() {
        let config = ProviderConfig::stdio("definitely-not-a-real-binary-4242", vec![]);
        let result = StdioConnection::spawn("ghost", &config).await;
        assert!(matches!(result, Err(McpError::TransportError(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echo_round_trip_through_cat() {
        let config = ProviderConfig::stdio("cat", vec![]);
        let ConnectedTransport {
            connection,
            mut inbound,
        } = StdioConnection::spawn("cat", &config).await.unwrap();

        connection
            .send_text(r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[]}}"#.to_string())
            .await
            .unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload["id"], 2);

        connection.close().await.unwrap();
        assert!(!connection.is_connected().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_closed_stdin_is_retryable_transport_error() {
        let config = ProviderConfig::stdio(
            "sh",
            vec!["-c".to_string(), "exec 0<&-; sleep 3".to_string()],
        );
        let ConnectedTransport { connection, .. } =
            StdioConnection::spawn("deaf", &config).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        let err = connection
            .send_text(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call"}"#.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::TransportError(_)), "{:?}", err);
        assert!(err.is_retryable());
        assert!(!connection.is_connected().await);

        connection.close().await.unwrap();
    }
}
