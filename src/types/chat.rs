//! Chat completion types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::common::Usage;
use super::functions::{FunctionCall, FunctionDefinition, FunctionRegistry};
use crate::errors::{ErnieError, ErnieResult};

/// ERNIE chat model, identifying the remote endpoint to invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatModel {
    /// ERNIE-Bot, the default conversation model.
    ErnieBot,
    /// ERNIE-Bot with an 8K context window.
    ErnieBot8k,
    /// ERNIE-Bot-turbo, lower latency.
    ErnieBotTurbo,
    /// ERNIE-Bot 4.0.
    ErnieBot4,
    /// A custom-deployed endpoint path segment.
    Custom(String),
}

impl ChatModel {
    /// Returns the endpoint path segment for this model.
    pub fn endpoint(&self) -> &str {
        match self {
            ChatModel::ErnieBot => "completions",
            ChatModel::ErnieBot8k => "ernie_bot_8k",
            ChatModel::ErnieBotTurbo => "eb-instant",
            ChatModel::ErnieBot4 => "completions_pro",
            ChatModel::Custom(endpoint) => endpoint,
        }
    }
}

impl Default for ChatModel {
    fn default() -> Self {
        ChatModel::ErnieBot
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// User message.
    User {
        /// Message content.
        content: String,
    },
    /// Assistant message, either text or a function call it emitted.
    Assistant {
        /// Message content.
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Function call emitted by the assistant.
        #[serde(skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCall>,
    },
    /// Function result message, answering an assistant function call.
    Function {
        /// The function name the result belongs to.
        name: String,
        /// JSON-encoded function result.
        content: String,
    },
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Creates an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            function_call: None,
        }
    }

    /// Creates an assistant message carrying a function call.
    pub fn function_call(call: FunctionCall) -> Self {
        Message::Assistant {
            content: None,
            function_call: Some(call),
        }
    }

    /// Creates a function result message.
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Function {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to invoke. Routed through the URL, not the body.
    #[serde(skip)]
    pub model: ChatModel,
    /// Messages in the conversation.
    pub messages: Vec<Message>,
    /// Declared functions the model may call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,
    /// Sampling temperature, (0.0, 1.0].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p (nucleus) sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Repetition penalty, [1.0, 2.0].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_score: Option<f32>,
    /// System persona text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// End-user identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Disables the built-in web search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_search: Option<bool>,
    /// Asks the service to attach citations to search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_citation: Option<bool>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Per-request timeout.
    #[serde(skip)]
    pub timeout: Option<Duration>,
    /// Invocable implementations for the declared functions.
    #[serde(skip)]
    pub registry: FunctionRegistry,
}

impl ChatRequest {
    /// Creates a new chat request builder.
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::new()
    }

    /// Creates a simple request with model and messages.
    pub fn new(model: ChatModel, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            functions: Vec::new(),
            temperature: None,
            top_p: None,
            penalty_score: None,
            system: None,
            user_id: None,
            disable_search: None,
            enable_citation: None,
            stream: None,
            timeout: None,
            registry: FunctionRegistry::new(),
        }
    }
}

/// Builder for chat requests.
#[derive(Debug, Default)]
pub struct ChatRequestBuilder {
    model: Option<ChatModel>,
    messages: Vec<Message>,
    functions: Vec<FunctionDefinition>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    penalty_score: Option<f32>,
    system: Option<String>,
    user_id: Option<String>,
    disable_search: Option<bool>,
    enable_citation: Option<bool>,
    timeout: Option<Duration>,
    registry: FunctionRegistry,
}

impl ChatRequestBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model.
    pub fn model(mut self, model: ChatModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the messages.
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Adds a message.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Registers a callable function: declares its definition to the model
    /// and keeps the implementation for continuation rounds.
    pub fn function<F>(mut self, function: F) -> Self
    where
        F: crate::types::functions::ChatFunction + 'static,
    {
        self.functions.push(function.definition());
        self.registry.register(function);
        self
    }

    /// Declares a function definition without an implementation.
    ///
    /// A call to it will surface [`ErnieError::UnknownFunction`].
    pub fn function_definition(mut self, definition: FunctionDefinition) -> Self {
        self.functions.push(definition);
        self
    }

    /// Sets the temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets top_p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the repetition penalty score.
    pub fn penalty_score(mut self, penalty_score: f32) -> Self {
        self.penalty_score = Some(penalty_score);
        self
    }

    /// Sets the system persona.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the end-user identifier.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Disables or enables the built-in web search.
    pub fn disable_search(mut self, disable: bool) -> Self {
        self.disable_search = Some(disable);
        self
    }

    /// Enables citation markers on search results.
    pub fn enable_citation(mut self, enable: bool) -> Self {
        self.enable_citation = Some(enable);
        self
    }

    /// Sets a per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the request.
    pub fn build(self) -> ChatRequest {
        ChatRequest {
            model: self.model.unwrap_or_default(),
            messages: self.messages,
            functions: self.functions,
            temperature: self.temperature,
            top_p: self.top_p,
            penalty_score: self.penalty_score,
            system: self.system,
            user_id: self.user_id,
            disable_search: self.disable_search,
            enable_citation: self.enable_citation,
            stream: None,
            timeout: self.timeout,
            registry: self.registry,
        }
    }
}

/// A cumulative fragment of the assistant's textual answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// Fragment index, stable per exchange.
    pub index: i64,
    /// Whether this fragment closes the answer.
    pub is_end: bool,
    /// Fragment text.
    pub content: String,
}

/// One search result cited by the response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchItem {
    /// Citation index within the answer text.
    #[serde(default)]
    pub index: i64,
    /// Result URL.
    pub url: String,
    /// Result title.
    pub title: String,
}

/// Search results attached to a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchInfo {
    /// The cited search results.
    #[serde(default)]
    pub search_results: Vec<SearchItem>,
}

impl SearchInfo {
    /// Returns true if no search results are attached.
    pub fn is_empty(&self) -> bool {
        self.search_results.is_empty()
    }
}

/// One decoded chat response: a streamed partial or the final merged result.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// Exchange identifier, shared by every partial of one exchange.
    pub id: String,
    /// Response object kind (`chat.completion`).
    pub object: String,
    /// Creation timestamp, seconds since the epoch.
    pub created: i64,
    /// Token usage reported with this partial, if any.
    pub usage: Option<Usage>,
    /// The answer fragment.
    pub sentence: Sentence,
    /// Function call the model wants serviced, if any.
    pub function_call: Option<FunctionCall>,
    /// Search results attached to this partial, if any.
    pub search_info: Option<SearchInfo>,
}

impl ChatResponse {
    /// The answer text of this response.
    pub fn content(&self) -> &str {
        &self.sentence.content
    }

    /// Identity of this partial within the exchange, used to discard
    /// duplicate deliveries: partials share `id` and differ by fragment
    /// index.
    pub fn merge_key(&self) -> String {
        format!("{}#{}", self.id, self.sentence.index)
    }
}

/// Raw wire chunk as the service emits it, one per SSE event (or a whole
/// non-streamed body). Everything is optional at this level; error and
/// safety markers ride along with regular payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    /// Exchange identifier.
    pub id: Option<String>,
    /// Object kind.
    pub object: Option<String>,
    /// Creation timestamp.
    pub created: Option<i64>,
    /// Fragment index.
    pub sentence_id: Option<i64>,
    /// Whether this is the closing fragment.
    pub is_end: Option<bool>,
    /// Whether the answer was truncated by length limits.
    pub is_truncated: Option<bool>,
    /// Fragment text.
    pub result: Option<String>,
    /// Content-safety rejection marker.
    pub need_clear_history: Option<bool>,
    /// Ban round accompanying a safety rejection.
    pub ban_round: Option<i32>,
    /// Token usage for this chunk.
    pub usage: Option<Usage>,
    /// Function call request.
    pub function_call: Option<FunctionCall>,
    /// Attached search results.
    pub search_info: Option<SearchInfo>,
    /// API-level error code.
    pub error_code: Option<i64>,
    /// API-level error message.
    pub error_msg: Option<String>,
}

impl ChatChunk {
    /// Decodes the wire chunk into a typed response.
    ///
    /// An `error_code` marker maps onto the error taxonomy; a
    /// `need_clear_history` marker becomes [`ErnieError::ResponseNotSafe`]
    /// carrying the flagged text and the ban round (`-1` when the service
    /// supplied none).
    pub fn into_response(self) -> ErnieResult<ChatResponse> {
        if let Some(code) = self.error_code {
            return Err(ErnieError::from_api_code(
                code,
                self.error_msg.unwrap_or_default(),
            ));
        }

        if self.need_clear_history.unwrap_or(false) {
            return Err(ErnieError::ResponseNotSafe {
                content: self.result.unwrap_or_default(),
                ban_round: self.ban_round.unwrap_or(-1),
            });
        }

        Ok(ChatResponse {
            id: self.id.unwrap_or_default(),
            object: self.object.unwrap_or_else(|| "chat.completion".to_string()),
            created: self.created.unwrap_or(0),
            usage: self.usage,
            sentence: Sentence {
                index: self.sentence_id.unwrap_or(0),
                is_end: self.is_end.unwrap_or(false),
                content: self.result.unwrap_or_default(),
            },
            function_call: self.function_call,
            search_info: self.search_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_wire_shapes() {
        let user = serde_json::to_value(Message::user("你好")).unwrap();
        assert_eq!(user["role"], "user");
        assert_eq!(user["content"], "你好");

        let call = FunctionCall {
            name: "query_score".to_string(),
            arguments: r#"{"name":"张三"}"#.to_string(),
            thoughts: None,
        };
        let assistant = serde_json::to_value(Message::function_call(call)).unwrap();
        assert_eq!(assistant["role"], "assistant");
        assert_eq!(assistant["function_call"]["name"], "query_score");
        assert!(assistant.get("content").is_none());

        let result = serde_json::to_value(Message::function_result("query_score", "{}")).unwrap();
        assert_eq!(result["role"], "function");
        assert_eq!(result["name"], "query_score");
    }

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::builder()
            .model(ChatModel::ErnieBot8k)
            .message(Message::user("hello"))
            .temperature(0.8)
            .enable_citation(true)
            .build();

        assert_eq!(request.model, ChatModel::ErnieBot8k);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, Some(0.8));
        assert_eq!(request.enable_citation, Some(true));
    }

    #[test]
    fn test_request_body_omits_unset_options() {
        let request = ChatRequest::new(ChatModel::ErnieBot, vec![Message::user("hi")]);
        let body = serde_json::to_value(&request).unwrap();

        assert!(body.get("model").is_none());
        assert!(body.get("temperature").is_none());
        assert!(body.get("functions").is_none());
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_model_endpoints() {
        assert_eq!(ChatModel::ErnieBot.endpoint(), "completions");
        assert_eq!(ChatModel::ErnieBot4.endpoint(), "completions_pro");
        assert_eq!(ChatModel::Custom("my_model".to_string()).endpoint(), "my_model");
    }

    #[test]
    fn test_chunk_decodes_to_response() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"id":"as-1","object":"chat.completion","created":1700000000,
                "sentence_id":2,"is_end":true,"result":"done",
                "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        )
        .unwrap();

        let response = chunk.into_response().unwrap();
        assert_eq!(response.id, "as-1");
        assert_eq!(response.sentence.index, 2);
        assert!(response.sentence.is_end);
        assert_eq!(response.content(), "done");
        assert_eq!(response.merge_key(), "as-1#2");
    }

    #[test]
    fn test_chunk_safety_marker_decodes_to_error() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"id":"as-2","result":"flagged text","need_clear_history":true,"ban_round":7}"#,
        )
        .unwrap();

        match chunk.into_response() {
            Err(ErnieError::ResponseNotSafe { content, ban_round }) => {
                assert_eq!(content, "flagged text");
                assert_eq!(ban_round, 7);
            }
            other => panic!("expected ResponseNotSafe, got {:?}", other),
        }
    }

    #[test]
    fn test_chunk_safety_marker_defaults_ban_round() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"result":"flagged","need_clear_history":true}"#).unwrap();

        match chunk.into_response() {
            Err(ErnieError::ResponseNotSafe { ban_round, .. }) => assert_eq!(ban_round, -1),
            other => panic!("expected ResponseNotSafe, got {:?}", other),
        }
    }

    #[test]
    fn test_chunk_error_code_decodes_to_error() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"error_code":110,"error_msg":"token expired"}"#).unwrap();

        assert!(matches!(
            chunk.into_response(),
            Err(ErnieError::Authentication { .. })
        ));
    }
}
