pub mod classify;
pub mod git;
pub mod group;
pub mod segment;
pub mod types;

pub use git::GitLogSource;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to start git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to read log output: {0}")]
    Io(#[from] std::io::Error),

    #[error("git log exited with {status}: {stderr}")]
    GitFailed { status: String, stderr: String },

    #[error("git log was started without a {0} pipe")]
    MissingPipe(&'static str),
}

/// A stream of raw log lines, without their trailing newline.
///
/// Lines are bytes: decoding is the classifier's job, so invalid UTF-8
/// reaches it intact.
#[async_trait]
pub trait LineSource: Send {
    /// The next line, or `None` once the stream is exhausted.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, LogError>;
}

/// Lines from any buffered async reader: a saved log file or stdin.
pub struct ReaderSource<R> {
    reader: R,
}

impl<R> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl ReaderSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path) -> Result<Self, LogError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for ReaderSource<R> {
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, LogError> {
        Ok(read_line(&mut self.reader).await?)
    }
}

/// Read one `\n`-terminated line, dropping the terminator (and a preceding `\r`).
pub(crate) async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_source_strips_line_endings() {
        let input: &[u8] = b"first\r\nsecond\n\ncaf\xe9\nlast";
        let mut source = ReaderSource::new(input);
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().await.unwrap() {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                b"first".to_vec(),
                b"second".to_vec(),
                Vec::new(),
                b"caf\xe9".to_vec(),
                b"last".to_vec(),
            ]
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReaderSource::open(&dir.path().join("missing.log")).await;
        assert!(matches!(result, Err(LogError::Io(_))));
    }
}
