//! Reading and interpreting the transcoder's diagnostic stream.

use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::types::FailureKind;

/// Maps diagnostic text to a failure category by substring match.
///
/// Checked in order; the first hit wins.
pub fn classify_diagnostics(text: &str) -> FailureKind {
    if text.contains("No such file or directory") {
        FailureKind::IoFailure
    } else if text.contains("Invalid data found") {
        FailureKind::CorruptInput
    } else if text.contains("Error while decoding") {
        FailureKind::DecodeError
    } else {
        FailureKind::ProcessFailure
    }
}

/// Line reader that treats `\r`, `\n` and `\r\n` all as terminators.
///
/// The transcoder rewrites its status line with bare carriage returns, so a
/// newline-only reader would see one unbounded line. Empty lines are skipped.
pub struct DiagnosticLines<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> DiagnosticLines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    /// Next non-empty line, or `None` at end of stream.
    ///
    /// Cancel-safe: bytes already consumed stay buffered in `self`.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                return Ok(Some(line));
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(index) => {
                    self.pending.extend_from_slice(&available[..index]);
                    self.reader.consume(index + 1);
                    if self.pending.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return Ok(Some(line));
                }
                None => {
                    let len = available.len();
                    self.pending.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }
}

/// Keeps the most recent diagnostic lines for failure reports.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Retained lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_order() {
        assert_eq!(
            classify_diagnostics("in.mp4: No such file or directory"),
            FailureKind::IoFailure
        );
        assert_eq!(
            classify_diagnostics("Invalid data found when processing input"),
            FailureKind::CorruptInput
        );
        assert_eq!(
            classify_diagnostics("[h264 @ 0x1] Error while decoding stream #0:0"),
            FailureKind::DecodeError
        );
        assert_eq!(
            classify_diagnostics("Unknown encoder 'libfoo'"),
            FailureKind::ProcessFailure
        );
        assert_eq!(
            classify_diagnostics("No such file or directory\nInvalid data found"),
            FailureKind::IoFailure
        );
    }

    #[tokio::test]
    async fn test_lines_split_on_carriage_returns() {
        let input: &[u8] = b"header\nframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\ndone";
        let mut lines = DiagnosticLines::new(input);

        let mut collected = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            collected.push(line);
        }

        assert_eq!(
            collected,
            vec![
                "header",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "done"
            ]
        );
    }

    #[tokio::test]
    async fn test_lines_skip_empty() {
        let input: &[u8] = b"\n\r\n\r\nonly\n\n";
        let mut lines = DiagnosticLines::new(input);
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("only"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[test]
    fn test_tail_keeps_most_recent() {
        let mut tail = DiagnosticTail::new(2);
        tail.push("one");
        tail.push("two");
        tail.push("three");
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.text(), "two\nthree");
    }
}
