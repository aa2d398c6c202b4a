use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::config::BuilderApiConfig;
use crate::error::{parse_error_message, BuilderApiError};
use crate::events::ChatStreamEvent;
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::payload::{ChatRequest, TemplateRequest, TemplateResponse};
use crate::sse::SseStreamParser;
use crate::url::{chat_url, template_url};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct BuilderApiClient {
    http: Client,
    config: BuilderApiConfig,
}

/// Collected outcome of a fully consumed chat stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamResult {
    pub events: Vec<ChatStreamEvent>,
    /// Concatenated token contents.
    pub text: String,
}

impl BuilderApiClient {
    pub fn new(config: BuilderApiConfig) -> Result<Self, BuilderApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(BuilderApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BuilderApiConfig {
        &self.config
    }

    pub fn template_endpoint(&self) -> String {
        template_url(&self.config.base_url)
    }

    pub fn chat_endpoint(&self) -> String {
        chat_url(&self.config.base_url)
    }

    pub fn build_headers(&self, accept: &str) -> Result<HeaderMap, BuilderApiError> {
        let headers = build_headers(&self.config, accept);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| BuilderApiError::InvalidHeader(format!("invalid key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    BuilderApiError::InvalidHeader(format!("invalid value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_template_request(
        &self,
        request: &TemplateRequest,
    ) -> Result<reqwest::RequestBuilder, BuilderApiError> {
        let endpoint = self.template_endpoint();
        validate_endpoint(&endpoint)?;
        Ok(self
            .http
            .post(endpoint)
            .headers(self.build_headers(ACCEPT_JSON)?)
            .json(request))
    }

    pub fn build_chat_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, BuilderApiError> {
        let endpoint = self.chat_endpoint();
        validate_endpoint(&endpoint)?;
        Ok(self
            .http
            .post(endpoint)
            .headers(self.build_headers(ACCEPT_EVENT_STREAM)?)
            .json(request))
    }

    /// Asks the backend to classify `request.prompt` into a template.
    ///
    /// A 403 means the classifier answered outside the supported set and maps
    /// to [`BuilderApiError::TemplateRejected`].
    pub async fn select_template(
        &self,
        request: &TemplateRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<TemplateResponse, BuilderApiError> {
        let response = self
            .send(self.build_template_request(request)?, cancellation)
            .await?;
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .map_err(BuilderApiError::from)?;

        let parsed = serde_json::from_str::<TemplateResponse>(&body)?;
        tracing::debug!(
            prompts = parsed.prompts.len(),
            ui_prompts = parsed.ui_prompts.len(),
            "template selected"
        );
        Ok(parsed)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, BuilderApiError> {
        if is_cancelled(cancellation) {
            return Err(BuilderApiError::Cancelled);
        }

        let response = await_or_cancel(request.send(), cancellation)
            .await?
            .map_err(BuilderApiError::from)?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        let message = parse_error_message(status, &body);
        tracing::warn!(%status, %message, "backend request failed");

        if status == StatusCode::FORBIDDEN {
            return Err(BuilderApiError::TemplateRejected(message));
        }
        Err(BuilderApiError::Status(status, message))
    }

    /// Streams one chat response, handing every non-error frame to `on_event`
    /// in arrival order.
    ///
    /// Returns once a `done` frame arrives. An `error` frame becomes
    /// [`BuilderApiError::StreamFailed`]; a body that ends without either
    /// becomes [`BuilderApiError::StreamEndedEarly`].
    pub async fn stream_chat_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<(), BuilderApiError>
    where
        F: FnMut(ChatStreamEvent),
    {
        let response = self
            .send(self.build_chat_request(request)?, cancellation)
            .await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(BuilderApiError::Cancelled);
            }
            let chunk = chunk.map_err(BuilderApiError::from)?;
            for event in parser.feed(&chunk) {
                if process_stream_event(event, &mut on_event)? {
                    return Ok(());
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(BuilderApiError::Cancelled);
        }

        for event in parser.finish() {
            if process_stream_event(event, &mut on_event)? {
                return Ok(());
            }
        }

        Err(BuilderApiError::StreamEndedEarly)
    }

    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, BuilderApiError> {
        let mut result = StreamResult::default();
        self.stream_chat_with_handler(request, cancellation, |event| {
            if let ChatStreamEvent::Token { content } = &event {
                result.text.push_str(content);
            }
            result.events.push(event);
        })
        .await?;

        Ok(result)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), BuilderApiError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(());
    }

    Err(BuilderApiError::InvalidBaseUrl(endpoint.to_string()))
}

/// Returns `Ok(true)` once a terminal frame has been handled.
fn process_stream_event<F>(event: ChatStreamEvent, on_event: &mut F) -> Result<bool, BuilderApiError>
where
    F: FnMut(ChatStreamEvent),
{
    if let ChatStreamEvent::Error { error } = &event {
        return Err(BuilderApiError::StreamFailed {
            message: error
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "unknown stream error".to_owned()),
        });
    }

    let terminal = event.is_terminal();
    on_event(event);
    Ok(terminal)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, BuilderApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(BuilderApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(BuilderApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
