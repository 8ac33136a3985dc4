// ABOUTME: Shared buffer for command output captured while a stage runs.
// ABOUTME: Survives cancellation and timeouts so partial output can be reported.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Oldest lines are dropped beyond this.
pub const MAX_CAPTURED_LINES: usize = 10_000;

/// An unterminated line longer than this is flushed as a line of its own.
pub const MAX_PARTIAL_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

#[derive(Debug, Default)]
struct BufferState {
    lines: VecDeque<OutputLine>,
    dropped: usize,
    partial_stdout: Vec<u8>,
    partial_stderr: Vec<u8>,
}

impl BufferState {
    fn push(&mut self, stream: OutputStream, text: String) {
        if self.lines.len() == MAX_CAPTURED_LINES {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(OutputLine { stream, text });
    }

    fn partial(&mut self, stream: OutputStream) -> &mut Vec<u8> {
        match stream {
            OutputStream::Stdout => &mut self.partial_stdout,
            OutputStream::Stderr => &mut self.partial_stderr,
        }
    }
}

/// Cloneable handle to a stage's output; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one complete line (without its trailing newline).
    pub fn push_line(&self, stream: OutputStream, line: impl Into<String>) {
        self.state.lock().push(stream, line.into());
    }

    /// Append a raw chunk, splitting on newlines and holding any trailing
    /// partial line until more data arrives.
    ///
    /// Bytes are decoded only once a line is complete, so a character split
    /// across chunks survives.
    pub fn push_chunk(&self, stream: OutputStream, chunk: &[u8]) {
        let mut state = self.state.lock();

        let mut pending = std::mem::take(state.partial(stream));
        pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(pos) = pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            state.push(stream, decode_line(&pending[start..end]));
            start = end + 1;
        }
        pending.drain(..start);

        if pending.len() >= MAX_PARTIAL_BYTES {
            let cut = char_boundary(&pending);
            let line: Vec<u8> = pending.drain(..cut).collect();
            state.push(stream, decode_line(&line));
        }
        *state.partial(stream) = pending;
    }

    /// Copy out everything captured so far, including unterminated lines.
    pub fn snapshot(&self) -> CapturedOutput {
        let state = self.state.lock();
        let mut lines: Vec<OutputLine> = state.lines.iter().cloned().collect();
        for (stream, partial) in [
            (OutputStream::Stdout, &state.partial_stdout),
            (OutputStream::Stderr, &state.partial_stderr),
        ] {
            if !partial.is_empty() {
                lines.push(OutputLine {
                    stream,
                    text: decode_line(partial),
                });
            }
        }
        CapturedOutput {
            lines,
            dropped: state.dropped,
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

/// Length of `bytes` without a trailing incomplete UTF-8 sequence.
fn char_boundary(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => e.valid_up_to(),
        _ => bytes.len(),
    }
}

/// Output of one stage, in arrival order across both streams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    lines: Vec<OutputLine>,
    dropped: usize,
}

impl CapturedOutput {
    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Lines discarded because the capture limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn stdout(&self) -> String {
        self.joined(OutputStream::Stdout)
    }

    pub fn stderr(&self) -> String {
        self.joined(OutputStream::Stderr)
    }

    /// The last `n` lines from either stream.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let start = self.lines.len().saturating_sub(n);
        self.lines[start..].iter().map(|l| l.text.clone()).collect()
    }

    fn joined(&self, stream: OutputStream) -> String {
        self.lines
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
