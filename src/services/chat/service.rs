//! Chat completion service.
//!
//! Runs one streamed exchange at a time: issues the request with a fresh
//! access token, reconciles the streamed partials into a cumulative
//! per-chunk view plus a final merged response, and drives function-call
//! continuations until the model returns a plain answer.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use super::merge::{combine, MergeState};
use crate::auth::TokenProvider;
use crate::errors::{ErnieError, ErnieResult};
use crate::observability::metrics::MetricsCollector;
use crate::transport::{decode_event_stream, HttpTransport};
use crate::types::chat::{ChatChunk, ChatModel, ChatRequest, ChatResponse, Message};

/// Handler invoked with the cumulative partial view after each newly
/// delivered chunk. It may run on whatever task the transport delivers
/// bytes on; duplicates never reach it.
pub type ChunkHandler = Arc<dyn Fn(&ChatResponse) + Send + Sync>;

/// Chat service trait for chat completions.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Creates a chat completion, following any function-call
    /// continuations through to a terminal response.
    async fn create(&self, request: ChatRequest) -> ErnieResult<ChatResponse>;

    /// Like [`ChatService::create`], additionally invoking `handler` with
    /// the growing partial view as chunks arrive.
    ///
    /// Dropping the returned future cancels the exchange mid-stream: no
    /// further handler invocations or usage accounting happen after that.
    async fn create_with_handler(
        &self,
        request: ChatRequest,
        handler: ChunkHandler,
    ) -> ErnieResult<ChatResponse>;
}

/// Default implementation of the chat service.
pub struct DefaultChatService {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    metrics: Arc<dyn MetricsCollector>,
    max_function_rounds: u32,
}

impl DefaultChatService {
    /// Creates a new chat service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenProvider>,
        metrics: Arc<dyn MetricsCollector>,
        max_function_rounds: u32,
    ) -> Self {
        Self {
            transport,
            tokens,
            metrics,
            max_function_rounds,
        }
    }

    fn chat_path(model: &ChatModel, token: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("access_token", token)
            .finish();
        format!(
            "/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/{}?{}",
            model.endpoint(),
            query
        )
    }

    /// Runs one streamed exchange to completion.
    ///
    /// Partials are reconciled on two levels: every freshly delivered
    /// partial is folded into `state` (usage sum, search union, duplicate
    /// discard), while the handler observes the concatenated cumulative
    /// view. The returned response is the last cumulative view carrying
    /// the state's exchange-wide totals.
    async fn execute(
        &self,
        request: &ChatRequest,
        handler: &ChunkHandler,
    ) -> ErnieResult<ChatResponse> {
        let token = self.tokens.access_token().await?;

        let body = {
            let mut wire = request.clone();
            wire.stream = Some(true);
            serde_json::to_vec(&wire)?
        };
        debug!(
            model = request.model.endpoint(),
            bytes = body.len(),
            "chat request issued"
        );

        let path = Self::chat_path(&request.model, &token);
        let bytes = self.transport.post_stream(&path, body).await?;
        let mut chunks = decode_event_stream::<ChatChunk>(bytes);

        let state = MergeState::new();
        let mut folded: Option<ChatResponse> = None;

        while let Some(chunk) = chunks.next().await {
            let response = chunk?.into_response()?;
            debug!(
                id = %response.id,
                index = response.sentence.index,
                is_end = response.sentence.is_end,
                "chat partial received"
            );

            if !state.merge(&response) {
                continue;
            }

            folded = combine(folded, Some(response));
            if let Some(view) = &folded {
                handler.as_ref()(view);
            }
        }

        let last = folded.ok_or_else(|| ErnieError::Stream {
            message: "stream ended without any response".to_string(),
        })?;

        let search = state.search();
        Ok(ChatResponse {
            usage: Some(state.usage()),
            search_info: if search.is_empty() {
                None
            } else {
                Some(search)
            },
            ..last
        })
    }

    /// Runs the executor once, with the request's deadline and metrics
    /// applied.
    async fn execute_measured(
        &self,
        request: &ChatRequest,
        handler: &ChunkHandler,
    ) -> ErnieResult<ChatResponse> {
        let started = Instant::now();

        let result = match request.timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.execute(request, handler)).await {
                    Ok(result) => result,
                    Err(_) => Err(ErnieError::Timeout {
                        message: format!("chat exchange exceeded {:?}", deadline),
                    }),
                }
            }
            None => self.execute(request, handler).await,
        };

        let endpoint = "chat";
        match &result {
            Ok(response) => {
                self.metrics
                    .record_request(endpoint, started.elapsed(), true);
                if let Some(usage) = &response.usage {
                    self.metrics.record_tokens(usage);
                }
            }
            Err(error) => {
                self.metrics
                    .record_request(endpoint, started.elapsed(), false);
                self.metrics.record_error(endpoint, error.kind());
                warn!(error = %error, "chat exchange failed");
            }
        }

        result
    }
}

#[async_trait]
impl ChatService for DefaultChatService {
    async fn create(&self, request: ChatRequest) -> ErnieResult<ChatResponse> {
        self.create_with_handler(request, Arc::new(|_: &ChatResponse| {}))
            .await
    }

    async fn create_with_handler(
        &self,
        request: ChatRequest,
        handler: ChunkHandler,
    ) -> ErnieResult<ChatResponse> {
        let mut conversation = request;
        let limit = self.max_function_rounds;
        let mut rounds = 0;

        loop {
            let response = self.execute_measured(&conversation, &handler).await?;

            let Some(call) = response.function_call.clone() else {
                return Ok(response);
            };

            if rounds >= limit {
                return Err(ErnieError::FunctionRoundsExceeded { limit });
            }
            rounds += 1;

            let function = conversation.registry.resolve(&call.name).ok_or_else(|| {
                ErnieError::UnknownFunction {
                    name: call.name.clone(),
                }
            })?;

            let arguments: serde_json::Value =
                serde_json::from_str(&call.arguments).map_err(|e| {
                    ErnieError::Deserialization {
                        message: format!("function arguments are not valid JSON: {}", e),
                        body: call.arguments.clone(),
                    }
                })?;

            let result = function.invoke(arguments).await?;
            debug!(function = %call.name, round = rounds, "function call serviced");

            conversation
                .messages
                .push(Message::function_call(call.clone()));
            conversation
                .messages
                .push(Message::function_result(&call.name, result.to_string()));
        }
    }
}
