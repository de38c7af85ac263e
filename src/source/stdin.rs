//! Line source over a local byte stream (normally stdin piped from `rtl_433`).

use tokio::io::{AsyncRead, AsyncReadExt, BufReader, Stdin};

use crate::source::{LineSource, SourceError};

/// Reads bytes one at a time and yields each line once its newline arrives.
///
/// Yielded lines keep their trailing `\n`. Invalid UTF-8 is replaced rather
/// than rejected; the record parser reports it as malformed.
pub struct StdinSource<R = BufReader<Stdin>> {
    reader: R,
    buffer: Vec<u8>,
}

impl StdinSource {
    /// Source over the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> StdinSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Source over an arbitrary reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }
}

impl<R> std::fmt::Debug for StdinSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinSource")
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<R> LineSource for StdinSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        "stdin"
    }

    async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            match self.reader.read_u8().await {
                Ok(byte) => {
                    self.buffer.push(byte);
                    if byte == b'\n' {
                        let raw = std::mem::take(&mut self.buffer);
                        return Ok(Some(String::from_utf8_lossy(&raw).into_owned()));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    if !self.buffer.is_empty() {
                        tracing::warn!(
                            bytes = self.buffer.len(),
                            "Dropping unterminated line at end of input"
                        );
                        self.buffer.clear();
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
