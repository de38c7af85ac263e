//! Source Layer
//!
//! Raw record lines come from one of two interchangeable sources, chosen once
//! at startup:
//!
//! - [`StdinSource`]: bytes piped from a local `rtl_433` process
//! - [`HttpPollSource`]: a remote resource polled on a fixed interval
//!
//! [`spawn`] runs a source as a producer task feeding a bounded channel. The
//! ingestion loop only sees the channel, never the concrete source.
//!
//! # Example
//!
//! ```rust,no_run
//! use rtl433_exporter::source::{self, StdinSource};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let cancel = CancellationToken::new();
//! let mut handle = source::spawn(StdinSource::stdin(), 1024, cancel.clone());
//! while let Some(line) = handle.lines.recv().await {
//!     println!("{}", line.trim_end());
//! }
//! # }
//! ```

mod backoff;
mod http;
mod stdin;
mod traits;

pub use backoff::{Backoff, RetryPolicy};
pub use http::{HttpPollConfig, HttpPollSource, last_line};
pub use stdin::StdinSource;
pub use traits::{LineSource, SourceError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default capacity of the line channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Receiving end of a running source.
#[derive(Debug)]
pub struct SourceHandle {
    /// Lines in arrival order. Closes when the producer task ends.
    pub lines: mpsc::Receiver<String>,
    /// Producer task; resolves to the source's terminal result.
    pub task: JoinHandle<Result<(), SourceError>>,
}

/// Run `source` on its own task, forwarding lines into a bounded channel.
///
/// The task stops when the source closes, the source fails, the receiver is
/// dropped, or `cancel` fires. Stopping drops the sender, which closes
/// [`SourceHandle::lines`].
pub fn spawn<S: LineSource>(
    mut source: S,
    capacity: usize,
    cancel: CancellationToken,
) -> SourceHandle {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let task = tokio::spawn(async move {
        let name = source.name().to_owned();
        tracing::info!(source = %name, "Line source started");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(source = %name, "Line source cancelled");
                    return Ok(());
                }
                next = source.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!(source = %name, "Line source closed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(source = %name, error = %e, "Line source failed");
                    return Err(e);
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(source = %name, "Line source cancelled");
                    return Ok(());
                }
                sent = tx.send(line) => {
                    if sent.is_err() {
                        tracing::debug!(source = %name, "Line receiver dropped");
                        return Ok(());
                    }
                }
            }
        }
    });

    SourceHandle { lines: rx, task }
}
