//! Nova client library
//!
//! Talks to the Nova proxy and turns its streamed replies into a paced
//! display feed:
//!
//! - [`ChatClient`] wraps the three HTTP endpoints
//! - [`IncrementalRenderer`] reveals a byte stream by chunk, word or character
//! - [`StreamSession`] and [`Conversation`] keep history and cancellation state
//! - [`SettingsStore`] persists the user's [`ClientSettings`]

pub mod api;
pub mod error;
pub mod render;
pub mod session;
pub mod settings;

pub use api::{ByteStream, ChatClient, DEFAULT_BASE_URL};
pub use error::{ClientError, RenderError, SettingsError};
pub use render::{IncrementalRenderer, Rendered, Utf8Decoder};
pub use session::{Conversation, StreamSession};
pub use settings::{ClientSettings, SettingsStore, SETTINGS_KEY};
