//! Trait abstraction for the line-oriented radio input to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Source of text lines from the radio bridge
#[async_trait]
pub trait LineSource: Send {
    /// Read the next line without its line terminator
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Reads newline-terminated lines from any async reader
///
/// Invalid UTF-8 is replaced rather than rejected; the frame decoder
/// drops such lines anyway.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::with_capacity(64),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineSource for LineReader<R> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;

    /// Mock line source replaying scripted lines
    pub struct MockLineSource {
        pub lines: VecDeque<io::Result<String>>,
    }

    impl MockLineSource {
        pub fn new<I, S>(lines: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                lines: lines.into_iter().map(|line| Ok(line.into())).collect(),
            }
        }

        pub fn push_error(&mut self, error: io::ErrorKind) {
            self.lines.push_back(Err(io::Error::new(error, "Mock read error")));
        }
    }

    #[async_trait]
    impl LineSource for MockLineSource {
        async fn next_line(&mut self) -> io::Result<Option<String>> {
            self.lines.pop_front().transpose()
        }
    }
}
