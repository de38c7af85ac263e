//! Core line source trait and errors.

use thiserror::Error;

/// Errors that end a line source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Local stream I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote poll kept failing after all retries.
    #[error("transport error after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Source cannot be built from its configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// A lazy, non-restartable sequence of raw record lines.
///
/// Implementations only do I/O; parsing happens downstream. A source is
/// driven by [`super::spawn`], which may drop a pending `next_line` future on
/// cancellation.
#[async_trait::async_trait]
pub trait LineSource: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Wait for the next line.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(line))`: a raw line, possibly with its trailing newline
    /// - `Ok(None)`: the underlying stream closed
    /// - `Err(SourceError)`: the source failed and cannot continue
    async fn next_line(&mut self) -> Result<Option<String>, SourceError>;
}
