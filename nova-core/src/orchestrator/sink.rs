//! Destinations for streamed reply text

use super::error::{ChatError, ChatResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives reply text as the round produces it
#[async_trait]
pub trait ReplySink: Send {
    /// Deliver one text fragment; an error ends the round
    async fn write(&mut self, text: &str) -> Result<(), ChatError>;
}

/// Collects the whole reply
#[async_trait]
impl ReplySink for String {
    async fn write(&mut self, text: &str) -> Result<(), ChatError> {
        self.push_str(text);
        Ok(())
    }
}

/// Forwards fragments to a channel; a dropped receiver closes the sink.
///
/// Items are results so the producing task can report a failure on the same
/// channel after the last fragment.
#[async_trait]
impl ReplySink for mpsc::Sender<ChatResult<String>> {
    async fn write(&mut self, text: &str) -> Result<(), ChatError> {
        self.send(Ok(text.to_string()))
            .await
            .map_err(|_| ChatError::SinkClosed)
    }
}
