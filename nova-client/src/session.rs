//! Stream sessions and the conversation they belong to

use crate::api::ChatClient;
use crate::error::{ClientError, RenderError};
use crate::render::{default_delay, IncrementalRenderer, Rendered};
use crate::settings::ClientSettings;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use nova_core::protocol::{Message, Role, StreamMode};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One streamed reply being shown to the user
#[derive(Debug)]
pub struct StreamSession {
    mode: StreamMode,
    delay: Duration,
    cancel: Arc<AtomicBool>,
    raw: String,
    display: String,
}

impl StreamSession {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            delay: default_delay(mode),
            cancel: Arc::new(AtomicBool::new(false)),
            raw: String::new(),
            display: String::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Stop revealing text; bytes already received are unaffected
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Flag another task can set to cancel this session
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Everything decoded so far
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// What the user has been shown so far
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Render `stream` into this session.
    ///
    /// A cancelled session keeps reading the response in a background task
    /// and discards it, so the server sees the reply through to its end.
    pub async fn run<S, E, F>(&mut self, stream: S, on_update: F) -> Result<Rendered, RenderError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
        F: FnMut(&str),
    {
        let renderer = IncrementalRenderer::new(self.mode)
            .with_delay(self.delay)
            .with_cancel_flag(self.cancel_handle());

        let mut stream = stream.fuse();
        let rendered = renderer.render(&mut stream, on_update).await?;
        if rendered.cancelled {
            tokio::spawn(drain(stream));
        }

        self.raw = rendered.raw.clone();
        self.display = rendered.display.clone();
        Ok(rendered)
    }
}

async fn drain<S, E>(mut stream: S)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut discarded = 0;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => discarded += bytes.len(),
            Err(e) => {
                debug!("Discarded reply ended with an error: {}", e);
                return;
            }
        }
    }
    debug!(discarded, "Discarded the rest of a cancelled reply");
}

/// Clears the in-flight flag when a send ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Append-only conversation with the proxy
#[derive(Debug)]
pub struct Conversation {
    client: ChatClient,
    settings: ClientSettings,
    delay: Option<Duration>,
    messages: Mutex<Vec<Message>>,
    in_flight: AtomicBool,
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl Conversation {
    pub fn new(client: ChatClient, settings: ClientSettings) -> Self {
        Self {
            client,
            settings,
            delay: None,
            messages: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            current_cancel: Mutex::new(None),
        }
    }

    /// Override the mode's default reveal pause
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Snapshot of the history
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cancel the reply being shown, if any
    pub fn cancel(&self) {
        if let Some(flag) = lock(&self.current_cancel).as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Send a prompt and stream the reply through `on_update`.
    ///
    /// The user turn is recorded before the request goes out and stays
    /// recorded when the request fails, so [`Conversation::retry`] can resend
    /// it. A cancelled reply keeps whatever text was shown; a reply cancelled
    /// before any text appeared adds no model turn.
    pub async fn send<F>(&self, prompt: impl Into<String>, on_update: F) -> Result<String, ClientError>
    where
        F: FnMut(&str),
    {
        let _guard = self.begin()?;
        lock(&self.messages).push(Message::user(prompt));
        self.run_round(on_update).await
    }

    /// Resend the last user turn after a failure, without duplicating it
    pub async fn retry<F>(&self, on_update: F) -> Result<String, ClientError>
    where
        F: FnMut(&str),
    {
        let _guard = self.begin()?;
        let pending = lock(&self.messages)
            .last()
            .is_some_and(|m| m.role == Role::User);
        if !pending {
            return Err(ClientError::NothingToRetry);
        }
        self.run_round(on_update).await
    }

    fn begin(&self) -> Result<InFlight<'_>, ClientError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ClientError::Busy);
        }
        Ok(InFlight(&self.in_flight))
    }

    async fn run_round<F>(&self, on_update: F) -> Result<String, ClientError>
    where
        F: FnMut(&str),
    {
        let history = self.messages();
        let config = self.settings.to_request_config();

        let mut session = StreamSession::new(self.settings.stream_type);
        if let Some(delay) = self.delay {
            session = session.with_delay(delay);
        }
        *lock(&self.current_cancel) = Some(session.cancel_handle());

        info!(turns = history.len(), mode = ?self.settings.stream_type, "Sending conversation");
        let result = async {
            let stream = self.client.stream(&history, Some(&config)).await?;
            Ok::<_, ClientError>(session.run(stream, on_update).await?)
        }
        .await;
        *lock(&self.current_cancel) = None;

        match result {
            Ok(rendered) => {
                if rendered.cancelled {
                    info!(shown = rendered.display.len(), "Reply cancelled by user");
                }
                // Nothing was shown, so there is no model turn to record
                if !rendered.display.is_empty() {
                    lock(&self.messages).push(Message::model(rendered.display.clone()));
                }
                Ok(rendered.display)
            }
            Err(e) => {
                warn!(retryable = e.is_retryable(), "Reply failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
