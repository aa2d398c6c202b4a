//! Backend-HTTP implementation of the shared `build_provider` contract.
//!
//! This adapter translates `builder_api` template and chat-stream semantics
//! into the `TemplateSelection` results and `RunEvent` lifecycle expected by
//! `build_agent`. Stream tokens are forwarded as they arrive.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use build_provider::{
    BuildProvider, CancelSignal, ChatMessage, ProviderInitError, ProviderProfile, Role, RunEvent,
    RunRequest, TemplateError, TemplateSelection,
};
use builder_api::url::normalize_base_url;
use builder_api::{
    BuilderApiClient, BuilderApiConfig, BuilderApiError, ChatRequest, ChatRole, ChatStreamEvent,
    TemplateRequest, TemplateResponse,
};

/// Stable provider identifier used by `build_agent` startup selection.
pub const HTTP_PROVIDER_ID: &str = "http";

/// Runtime configuration for the backend HTTP provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpProviderConfig {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpProviderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> BuilderApiConfig {
        let mut config = BuilderApiConfig::default();

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn select_template(
        &self,
        request: &TemplateRequest,
        cancel: &CancelSignal,
    ) -> Result<TemplateResponse, BuilderApiError>;

    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent),
    ) -> Result<(), BuilderApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: BuilderApiClient,
}

impl DefaultStreamClient {
    fn runtime() -> Result<tokio::runtime::Runtime, BuilderApiError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| BuilderApiError::StreamFailed {
                message: format!("failed to initialize tokio runtime: {error}"),
            })
    }
}

impl StreamClient for DefaultStreamClient {
    fn select_template(
        &self,
        request: &TemplateRequest,
        cancel: &CancelSignal,
    ) -> Result<TemplateResponse, BuilderApiError> {
        Self::runtime()?.block_on(self.client.select_template(request, Some(cancel)))
    }

    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent),
    ) -> Result<(), BuilderApiError> {
        Self::runtime()?.block_on(
            self.client
                .stream_chat_with_handler(request, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `BuildProvider` adapter backed by `builder_api` transport primitives.
pub struct HttpProvider {
    target: String,
    stream_client: Arc<dyn StreamClient>,
}

impl HttpProvider {
    /// Creates a provider using real backend transport.
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderInitError> {
        let api_config = config.into_api_config();
        let target = normalize_base_url(&api_config.base_url);
        let stream_client = Arc::new(DefaultStreamClient {
            client: BuilderApiClient::new(api_config).map_err(map_init_error)?,
        });

        Ok(Self {
            target,
            stream_client,
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            target: "http://test.invalid".to_string(),
            stream_client,
        }
    }
}

impl BuildProvider for HttpProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: HTTP_PROVIDER_ID.to_string(),
            target: self.target.clone(),
        }
    }

    fn select_template(
        &self,
        prompt: &str,
        cancel: CancelSignal,
    ) -> Result<TemplateSelection, TemplateError> {
        if cancel.load(Ordering::Acquire) {
            return Err(TemplateError::Cancelled);
        }

        match self
            .stream_client
            .select_template(&TemplateRequest::new(prompt), &cancel)
        {
            Ok(response) => Ok(TemplateSelection {
                prompts: response.prompts,
                ui_prompts: response.ui_prompts,
            }),
            Err(BuilderApiError::TemplateRejected(message)) => {
                tracing::warn!(%message, "backend rejected template classification");
                Err(TemplateError::Rejected { answer: None })
            }
            Err(BuilderApiError::Cancelled) => Err(TemplateError::Cancelled),
            Err(error) => Err(TemplateError::Transport(error.to_string())),
        }
    }

    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String> {
        let run_id = req.run_id;

        emit(RunEvent::Started { run_id });

        if cancel.load(Ordering::Acquire) {
            emit(RunEvent::Cancelled { run_id });
            return Ok(());
        }

        let request = ChatRequest::new(req.messages.iter().map(to_wire_message).collect());
        let outcome = self.stream_client.stream(&request, &cancel, &mut |event| {
            if let ChatStreamEvent::Token { content } = event {
                if !content.is_empty() {
                    emit(RunEvent::Chunk {
                        run_id,
                        text: content,
                    });
                }
            }
        });

        match outcome {
            Ok(()) => emit(RunEvent::Finished { run_id }),
            Err(BuilderApiError::Cancelled) => emit(RunEvent::Cancelled { run_id }),
            Err(error) => emit(RunEvent::Failed {
                run_id,
                error: format!("chat stream failed: {error}"),
            }),
        }

        Ok(())
    }
}

fn to_wire_message(message: &ChatMessage) -> builder_api::ChatMessage {
    builder_api::ChatMessage {
        role: match message.role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        },
        content: message.content.clone(),
    }
}

fn map_init_error(error: BuilderApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize http provider: {error}"))
}
