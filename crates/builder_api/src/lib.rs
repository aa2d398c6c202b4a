//! Transport-only client primitives for the site builder backend.
//!
//! This crate owns request building and response parsing for the two backend
//! endpoints only: template classification (`POST /template`) and the
//! streamed chat proxy (`POST /chat`). It contains no session logic and never
//! retries a request on its own.
//!
//! Chat responses are server-sent events whose `data:` lines carry JSON frames
//! tagged by `type` (`token`, `done`, `error`); see [`ChatStreamEvent`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{BuilderApiClient, CancellationSignal, StreamResult};
pub use config::BuilderApiConfig;
pub use error::BuilderApiError;
pub use events::ChatStreamEvent;
pub use payload::{ChatMessage, ChatRequest, ChatRole, TemplateRequest, TemplateResponse};
pub use sse::SseStreamParser;
pub use url::{chat_url, normalize_base_url, template_url};
