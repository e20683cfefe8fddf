//! PassthroughSink - echoes every line to a writer (stdout by default)

use std::time::Duration;

use contracts::{ContractError, LineSink};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::instrument;

/// Sink that writes each line verbatim, newline-terminated
pub struct PassthroughSink<W> {
    name: String,
    writer: W,
}

impl PassthroughSink<tokio::io::Stdout> {
    /// Passthrough to the process's standard output
    pub fn stdout() -> Self {
        Self::new("stdout", tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> PassthroughSink<W> {
    /// Create a new PassthroughSink over any writer
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> LineSink for PassthroughSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    async fn write(&mut self, line: String) -> Result<(), ContractError> {
        let mut buf = line.into_bytes();
        buf.push(b'\n');
        self.writer
            .write_all(&buf)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn tick(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "passthrough_sink_flush", skip(self), fields(sink = %self.name))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
