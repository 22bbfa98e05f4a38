//! Client side of the IO server on the BBB.
//!
//! The server accepts one newline-terminated JSON batch per request and
//! answers with one newline-terminated JSON response. [`Transport`]
//! abstracts that exchange; [`BbbIo`] is the single rendezvous where a
//! batch is suite-validated, serialized, and dispatched.

pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::batch::IoBatch;
use crate::config::BbbConfig;
use crate::io_spec::{SuiteError, SuiteValidator};
use wire::{PinReading, WireResponse};

#[derive(Debug, Error)]
pub enum BbbError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not connected to the BBB")]
    NotConnected,
    #[error("timeout waiting for the BBB response")]
    Timeout,
    #[error("malformed response from the BBB: {0}")]
    Json(#[from] serde_json::Error),
    #[error("BBB reported a failure: {0}")]
    Server(String),
    #[error(transparent)]
    Suite(#[from] SuiteError),
    #[error("results of the previous batch have not been cleared; reset the IO specifications first")]
    ResultsPending,
}

/// Request/response exchange with the BBB.
///
/// Implementations carry their own connection state; `request` sends
/// one serialized batch and returns the raw response body.
#[async_trait]
pub trait Transport {
    async fn connect(&mut self) -> Result<(), BbbError>;
    async fn disconnect(&mut self) -> Result<(), BbbError>;
    async fn request(&mut self, payload: &str) -> Result<String, BbbError>;
}

/// TCP transport speaking newline-delimited JSON.
#[derive(Debug)]
pub struct TcpTransport {
    addr: String,
    request_timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            request_timeout,
            stream: None,
        }
    }

    pub fn from_config(config: &BbbConfig) -> Self {
        Self::new(
            config.addr(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<(), BbbError> {
        tracing::info!("Connecting to BBB at {}", self.addr);
        let stream = TcpStream::connect(&self.addr).await?;
        self.stream = Some(BufReader::new(stream));
        tracing::info!("Connected to BBB");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BbbError> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
            tracing::info!("Disconnected from BBB");
        }
        Ok(())
    }

    async fn request(&mut self, payload: &str) -> Result<String, BbbError> {
        let stream = self.stream.as_mut().ok_or(BbbError::NotConnected)?;
        stream.get_mut().write_all(payload.as_bytes()).await?;
        stream.get_mut().write_all(b"\n").await?;
        stream.get_mut().flush().await?;

        let mut line = String::new();
        let read = timeout(self.request_timeout, stream.read_line(&mut line))
            .await
            .map_err(|_| BbbError::Timeout)??;
        if read == 0 {
            return Err(BbbError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "BBB closed the connection",
            )));
        }
        Ok(line.trim().to_string())
    }
}

/// Executor for validated batches.
pub struct BbbIo<T: Transport> {
    transport: T,
}

impl<T: Transport> BbbIo<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn connect(&mut self) -> Result<(), BbbError> {
        self.transport.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<(), BbbError> {
        self.transport.disconnect().await
    }

    /// Validates `batch` with `validator` and, only if every rule
    /// passes, transmits it and returns the per-pin readings.
    ///
    /// Rejected or failed batches are never marked as sent, so the
    /// caller can correct and retry. A successfully executed batch
    /// must be [`reset`](IoBatch::reset) before the next send.
    pub async fn execute(
        &mut self,
        batch: &mut IoBatch,
        validator: &dyn SuiteValidator,
    ) -> Result<Vec<PinReading>, BbbError> {
        if batch.results_pending() {
            return Err(BbbError::ResultsPending);
        }
        validator.validate(batch.specs())?;

        let payload = wire::encode_batch(batch.specs())?;
        tracing::debug!("BBB <- {}", payload);
        let raw = self.transport.request(&payload).await?;
        tracing::debug!("BBB -> {}", raw);

        match serde_json::from_str::<WireResponse>(&raw)? {
            WireResponse::Failure { error } => Err(BbbError::Server(error)),
            WireResponse::Readings(readings) => {
                batch.mark_sent();
                tracing::info!(
                    "Executed {} IO specifications, {} readings returned",
                    batch.len(),
                    readings.len()
                );
                Ok(readings)
            }
        }
    }
}
