//! Paced incremental rendering of a streamed reply
//!
//! Bytes arrive in arbitrary chunks. They are decoded incrementally (a
//! multi-byte character split across chunks is held until it completes) and
//! revealed at one of three paces:
//!
//! - [`StreamMode::Chunk`]: each decoded chunk as it arrives
//! - [`StreamMode::Word`]: one whitespace or non-whitespace run at a time,
//!   pausing after every word
//! - [`StreamMode::Character`]: one character at a time
//!
//! Rendering is cancellable through a shared flag. Cancelling only stops the
//! display; it never affects what the server has already sent.

use crate::error::RenderError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use nova_core::protocol::StreamMode;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Pause used for a mode when the caller does not pick one
pub fn default_delay(mode: StreamMode) -> Duration {
    match mode {
        StreamMode::Chunk => Duration::ZERO,
        StreamMode::Word => Duration::from_millis(40),
        StreamMode::Character => Duration::from_millis(12),
    }
}

/// Incremental UTF-8 decoder
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much as possible, holding back an incomplete trailing sequence
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream; a truncated sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

/// Splits text into maximal runs of whitespace or non-whitespace
#[derive(Debug, Default)]
struct WordSplitter {
    pending: String,
}

impl WordSplitter {
    /// Append text and return every token that can no longer grow
    fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);
        let mut tokens = Vec::new();

        loop {
            let mut chars = self.pending.char_indices();
            let Some((_, first)) = chars.next() else {
                break;
            };
            let boundary = chars
                .find(|(_, c)| c.is_whitespace() != first.is_whitespace())
                .map(|(i, _)| i);
            match boundary {
                Some(end) => {
                    tokens.push(self.pending[..end].to_string());
                    self.pending.drain(..end);
                }
                // The last run may continue in the next chunk
                None => break,
            }
        }

        tokens
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Result of one render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Text shown to the user
    pub display: String,
    /// Every character decoded from the stream, shown or not
    pub raw: String,
    /// Rendering stopped early because the flag was set
    pub cancelled: bool,
}

/// Reveals a byte stream at a chosen pace
#[derive(Debug, Clone)]
pub struct IncrementalRenderer {
    mode: StreamMode,
    delay: Duration,
    cancel: Arc<AtomicBool>,
}

impl IncrementalRenderer {
    /// Renderer with the mode's default pause and a fresh cancellation flag
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            delay: default_delay(mode),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Consume `stream`, calling `on_update` with the whole display text after
    /// every reveal.
    ///
    /// Cancellation is checked before every read and every reveal; a cancelled
    /// render returns what was shown so far. A stream error discards the
    /// partial text.
    pub async fn render<S, E, F>(&self, stream: S, mut on_update: F) -> Result<Rendered, RenderError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
        F: FnMut(&str),
    {
        let mut stream = std::pin::pin!(stream);
        let mut decoder = Utf8Decoder::new();
        let mut words = WordSplitter::default();
        let mut out = Rendered::default();

        loop {
            if self.is_cancelled() {
                debug!(shown = out.display.len(), "Render cancelled before read");
                out.cancelled = true;
                return Ok(out);
            }

            let text = match stream.next().await {
                Some(Ok(chunk)) => {
                    trace!(bytes = chunk.len(), "Chunk received");
                    decoder.decode(&chunk)
                }
                Some(Err(e)) => return Err(RenderError::Stream(e.to_string())),
                None => break,
            };
            out.raw.push_str(&text);

            let finished = match self.mode {
                StreamMode::Word => {
                    let tokens = words.push(&text);
                    self.reveal_tokens(tokens, &mut out, &mut on_update).await
                }
                _ => self.reveal_text(&text, &mut out, &mut on_update).await,
            };
            if !finished {
                out.cancelled = true;
                return Ok(out);
            }
        }

        // End of stream: flush what the decoder and the splitter held back
        let tail = decoder.finish();
        out.raw.push_str(&tail);
        let finished = match self.mode {
            StreamMode::Word => {
                let mut tokens = words.push(&tail);
                tokens.extend(words.finish());
                self.reveal_tokens(tokens, &mut out, &mut on_update).await
            }
            _ => self.reveal_text(&tail, &mut out, &mut on_update).await,
        };
        out.cancelled = !finished;

        Ok(out)
    }

    /// Reveal decoded text in chunk or character steps; false when cancelled
    async fn reveal_text<F: FnMut(&str)>(&self, text: &str, out: &mut Rendered, on_update: &mut F) -> bool {
        if text.is_empty() {
            return true;
        }

        if self.mode == StreamMode::Chunk {
            if self.is_cancelled() {
                return false;
            }
            out.display.push_str(text);
            on_update(&out.display);
            return true;
        }

        for c in text.chars() {
            if self.is_cancelled() {
                return false;
            }
            out.display.push(c);
            on_update(&out.display);
            self.pause().await;
        }
        true
    }

    /// Reveal whole tokens; false when cancelled
    async fn reveal_tokens<F: FnMut(&str)>(
        &self,
        tokens: Vec<String>,
        out: &mut Rendered,
        on_update: &mut F,
    ) -> bool {
        for token in tokens {
            if self.is_cancelled() {
                return false;
            }
            out.display.push_str(&token);
            on_update(&out.display);
            if !token.chars().all(char::is_whitespace) {
                self.pause().await;
            }
        }
        true
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
