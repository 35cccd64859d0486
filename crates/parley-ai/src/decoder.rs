//! Line-framed stream decoding
//!
//! Completion servers answer with one event per line:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! Network chunks can split a line anywhere, including inside a multi-byte
//! UTF-8 character. [`FrameDecoder`] buffers raw bytes and only decodes a
//! line once its terminating newline has arrived, so the fragments produced
//! never depend on where the chunk boundaries fell.

use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder from raw body chunks to content fragments
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    done: bool,
}

/// What a single line means
#[derive(Debug, PartialEq, Eq)]
enum Line {
    /// Nothing to emit (blank, comment, non-data, malformed, or no delta text)
    Skip,
    /// The end-of-stream sentinel
    Done,
    Fragment(String),
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the sentinel (or end of input) has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and return the fragments of every line it completed.
    ///
    /// A trailing partial line stays buffered until the next chunk. Once the
    /// sentinel is seen all further input is ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + pos;
            let line = decode_line(&String::from_utf8_lossy(&self.buffer[start..end]));
            start = end + 1;
            from = start;

            match line {
                Line::Skip => {}
                Line::Fragment(text) => fragments.push(text),
                Line::Done => {
                    self.done = true;
                    self.buffer.clear();
                    self.scanned = 0;
                    return fragments;
                }
            }
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        fragments
    }

    /// Signal end of input, interpreting any unterminated trailing line.
    pub fn finish(&mut self) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.done = true;

        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        match decode_line(&String::from_utf8_lossy(&rest)) {
            Line::Fragment(text) => vec![text],
            Line::Skip | Line::Done => Vec::new(),
        }
    }
}

fn decode_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Skip;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Line::Skip;
    };
    let payload = payload.trim_start();

    if payload == DONE_SENTINEL {
        return Line::Done;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map_or(Line::Skip, Line::Fragment),
        Err(e) => {
            tracing::warn!(error = %e, frame = payload, "Skipping malformed stream frame");
            Line::Skip
        }
    }
}

// Streaming response types; everything except the delta text is ignored.

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
