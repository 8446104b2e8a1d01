//! Client side of the line-delimited request protocol

use anyhow::{Context, Result};
use codebroker_common::{BrokerError, ConnectionNotice, HealthReport, InboundRequest, ResponseEnvelope};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Environment override for the request server address
pub const ADDR_ENV: &str = "CODEBROKER_ADDR";

pub const DEFAULT_ADDR: &str = "127.0.0.1:8765";

pub const DEFAULT_HEALTH_URL: &str = "http://127.0.0.1:8766/health";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct BrokerClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl BrokerClient {
    /// Resolve the daemon address: explicit flag, then `$CODEBROKER_ADDR`, then default
    pub fn discover_addr(explicit: Option<&str>) -> String {
        if let Some(addr) = explicit {
            return addr.to_string();
        }
        std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string())
    }

    /// Connect and consume the greeting
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(BrokerError::DaemonNotRunning).with_context(|| format!("{}: {}", addr, e))
            }
            Err(_) => return Err(anyhow::anyhow!("Connection to {} timed out", addr)),
        };

        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
        };

        let line = client.read_line().await.context("Failed to read greeting")?;
        let notice: ConnectionNotice = decode(&line).context("Unexpected greeting from daemon")?;
        if !notice.success {
            anyhow::bail!("Daemon refused connection: {}", notice.message);
        }
        Ok(client)
    }

    /// Send one request and wait for its envelope
    pub async fn send(&mut self, request: &InboundRequest) -> Result<ResponseEnvelope> {
        let json = serde_json::to_string(request).map_err(BrokerError::from)? + "\n";
        self.write_line(&json).await.context("Failed to send request")?;

        let line = self.read_line().await.context("Failed to read response")?;
        let envelope = decode(&line).context("Failed to parse response")?;
        Ok(envelope)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), BrokerError> {
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, BrokerError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(BrokerError::Socket("connection closed by daemon".to_string()));
        }
        Ok(line)
    }
}

fn decode<T: DeserializeOwned>(line: &str) -> Result<T, BrokerError> {
    Ok(serde_json::from_str(line)?)
}

/// Query the health endpoint
pub async fn fetch_health(url: &str) -> Result<HealthReport> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Health endpoint {} unreachable", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Health endpoint returned HTTP {}", response.status());
    }

    let report = response.json::<HealthReport>().await.context("Invalid health report")?;
    Ok(report)
}
