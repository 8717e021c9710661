//! Function calling types and the function registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::chat::Message;
use crate::errors::ErnieResult;

/// A function call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
    /// Model reasoning that led to the call, when the service shares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
}

impl FunctionCall {
    /// Parses the arguments as JSON.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// Function declaration sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// Function description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the arguments.
    pub parameters: JsonValue,
    /// JSON Schema for the result, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<JsonValue>,
    /// Few-shot example dialogs, each a user question followed by the
    /// assistant function call answering it.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<Vec<Message>>,
}

impl FunctionDefinition {
    /// Creates a new function definition.
    pub fn new(name: impl Into<String>, parameters: JsonValue) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
            responses: None,
            examples: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the result schema.
    pub fn with_responses(mut self, responses: JsonValue) -> Self {
        self.responses = Some(responses);
        self
    }

    /// Adds a few-shot example: a user question and the call (with its
    /// thoughts and arguments) the model should answer it with.
    pub fn with_example(
        mut self,
        question: impl Into<String>,
        thoughts: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        let call = FunctionCall {
            name: self.name.clone(),
            arguments: arguments.into(),
            thoughts: Some(thoughts.into()),
        };
        self.examples
            .push(vec![Message::user(question), Message::function_call(call)]);
        self
    }
}

/// An invocable function the model may call during an exchange.
#[async_trait]
pub trait ChatFunction: Send + Sync {
    /// The declaration sent to the model.
    fn definition(&self) -> FunctionDefinition;

    /// Invokes the function with the model-supplied arguments.
    async fn invoke(&self, arguments: JsonValue) -> ErnieResult<JsonValue>;
}

/// Capability lookup by name for function-call continuations.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn ChatFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under its declared name. A later registration
    /// with the same name replaces the earlier one.
    pub fn register<F: ChatFunction + 'static>(&mut self, function: F) {
        self.register_arc(Arc::new(function));
    }

    /// Registers a shared function instance.
    pub fn register_arc(&mut self, function: Arc<dyn ChatFunction>) {
        self.functions
            .insert(function.definition().name, function);
    }

    /// Looks up a function by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ChatFunction>> {
        self.functions.get(name).cloned()
    }

    /// Returns true if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoFunction;

    #[async_trait]
    impl ChatFunction for EchoFunction {
        fn definition(&self) -> FunctionDefinition {
            FunctionDefinition::new(
                "echo",
                json!({"type":"object","properties":{"text":{"type":"string"}}}),
            )
        }

        async fn invoke(&self, arguments: JsonValue) -> ErnieResult<JsonValue> {
            Ok(arguments)
        }
    }

    #[test]
    fn test_registry_resolves_registered_function() {
        let mut registry = FunctionRegistry::new();
        registry.register(EchoFunction);

        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn test_registered_function_invokes() {
        let mut registry = FunctionRegistry::new();
        registry.register(EchoFunction);

        let function = registry.resolve("echo").unwrap();
        let result = tokio_test::block_on(function.invoke(json!({"text":"hi"}))).unwrap();
        assert_eq!(result["text"], "hi");
    }

    #[test]
    fn test_definition_example_wire_shape() {
        let definition = FunctionDefinition::new(
            "query_score",
            json!({"type":"object","properties":{"name":{"type":"string"}}}),
        )
        .with_description("query student's scores")
        .with_example(
            "查询张三的数学成绩",
            "用户需要查询张三的数学成绩",
            r#"{"name":"张三","subjects":["MATH"]}"#,
        );

        let body = serde_json::to_value(&definition).unwrap();
        assert_eq!(body["examples"][0][0]["role"], "user");
        assert_eq!(body["examples"][0][1]["role"], "assistant");
        assert_eq!(body["examples"][0][1]["function_call"]["name"], "query_score");
        assert!(body["examples"][0][1]["function_call"]["thoughts"]
            .as_str()
            .is_some());
    }

    #[test]
    fn test_function_call_argument_parsing() {
        let call = FunctionCall {
            name: "query_score".to_string(),
            arguments: r#"{"name":"李四"}"#.to_string(),
            thoughts: None,
        };

        #[derive(Deserialize)]
        struct Args {
            name: String,
        }

        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.name, "李四");
    }
}
