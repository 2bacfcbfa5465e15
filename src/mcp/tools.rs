//! Tool registry.
//!
//! Tools are registered explicitly by [`ToolRegistry::protocols_io`], the
//! composition root that pairs each [`ToolDefinition`] with its handler. The
//! session looks tools up by name and never needs to know what they do.
//!
//! A handler returns the JSON value for the client. Values coming back from
//! the [`ResourceBridge`](crate::protocols_io::ResourceBridge) are passed
//! through untouched, error records included; only argument problems turn
//! into `isError` results.

use std::future::Future;
use std::pin::Pin;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::protocols_io::{
    generate_ids, KeywordSearch, ProtocolId, ProtocolStep, ProtocolUpdate, ProtocolsIo,
    MAX_GENERATED_IDS,
};

/// Boxed future returned by a tool handler.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// A tool implementation.
pub type ToolHandler = for<'a> fn(&'a ProtocolsIo, Value) -> ToolFuture<'a>;

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema,
        }
    }
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if needs fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates a successful result holding pretty-printed JSON.
    #[must_use]
    pub fn json(value: &Value) -> Self {
        // Value -> String cannot fail: keys are always strings
        Self::text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Returns the text of the first content item.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| match c {
            ToolContent::Text { text } => text.as_str(),
        })
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Name → handler table backed by one [`ProtocolsIo`] client.
pub struct ToolRegistry {
    api: ProtocolsIo,
    tools: IndexMap<String, RegisteredTool>,
    aliases: IndexMap<String, String>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(api: ProtocolsIo) -> Self {
        Self {
            api,
            tools: IndexMap::new(),
            aliases: IndexMap::new(),
        }
    }

    /// Creates a registry with every protocols.io tool.
    #[must_use]
    pub fn protocols_io(api: ProtocolsIo) -> Self {
        let mut registry = Self::new(api);
        for (definition, handler) in builtin_tools() {
            registry.register(definition, handler);
        }
        registry.alias("generate_ids", "generate_guids");
        registry
    }

    /// Adds a tool, replacing any tool with the same name.
    pub fn register(&mut self, definition: ToolDefinition, handler: ToolHandler) {
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                handler,
            },
        );
    }

    /// Makes `alias` call the tool registered as `target`.
    ///
    /// Aliases are callable but not listed.
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    /// Returns the definitions in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|t| &t.definition).collect()
    }

    fn resolve(&self, name: &str) -> Option<&RegisteredTool> {
        let canonical = self.aliases.get(name).map_or(name, String::as_str);
        self.tools.get(canonical)
    }

    /// Runs a tool and wraps its outcome for the client.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolCallResult {
        match self.invoke(name, arguments).await {
            Ok(value) => ToolCallResult::json(&value),
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "Tool call rejected");
                ToolCallResult::error(e.to_string())
            }
        }
    }

    /// Runs a tool and returns its raw value.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tools and invalid arguments. Remote
    /// failures are not errors; they arrive as error records in `Ok`.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = self
            .resolve(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tracing::debug!(tool = %tool.definition.name, "Dispatching tool call");
        (tool.handler)(&self.api, arguments).await
    }
}

/// Deserialises tool arguments, treating a missing object as `{}`.
fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    Ok(serde_json::from_value(arguments)?)
}

fn checked(protocol_id: ProtocolId) -> Result<ProtocolId, ToolError> {
    protocol_id
        .check()
        .map_err(|reason| ToolError::InvalidArgument {
            name: "protocol_id",
            reason: reason.to_string(),
        })?;
    Ok(protocol_id)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CountArgs {
    count: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProtocolArgs {
    protocol_id: ProtocolId,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StepsArgs {
    protocol_id: ProtocolId,
    steps: Vec<ProtocolStep>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteStepsArgs {
    protocol_id: ProtocolId,
    step_guids: Vec<String>,
}

fn generate_guids(_api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let CountArgs { count } = parse_arguments(arguments)?;
        if count > MAX_GENERATED_IDS {
            return Err(ToolError::InvalidArgument {
                name: "count",
                reason: format!("must not exceed {MAX_GENERATED_IDS}"),
            });
        }
        Ok(json!(generate_ids(count)))
    })
}

fn get_profile(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let NoArgs {} = parse_arguments(arguments)?;
        Ok(api.get_profile().await)
    })
}

fn create_protocol(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let NoArgs {} = parse_arguments(arguments)?;
        Ok(api.create_protocol().await)
    })
}

fn get_user_protocol_list(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let NoArgs {} = parse_arguments(arguments)?;
        Ok(api.get_user_protocol_list().await)
    })
}

fn get_public_protocol_list_by_keyword(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let search: KeywordSearch = parse_arguments(arguments)?;
        Ok(api.search_protocols(&search).await)
    })
}

fn update_protocol(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        // protocol_id is split off so the remaining fields go through
        // ProtocolUpdate's own unknown-field check
        let mut fields: Map<String, Value> = parse_arguments(arguments)?;
        let protocol_id = fields
            .remove("protocol_id")
            .ok_or_else(|| ToolError::InvalidArgument {
                name: "protocol_id",
                reason: "is required".to_string(),
            })?;
        let protocol_id = checked(serde_json::from_value(protocol_id)?)?;
        let update: ProtocolUpdate = serde_json::from_value(Value::Object(fields))?;
        Ok(api.update_protocol(&protocol_id, &update).await)
    })
}

fn get_protocol_steps(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: ProtocolArgs = parse_arguments(arguments)?;
        let protocol_id = checked(args.protocol_id)?;
        Ok(api.get_protocol_steps(&protocol_id).await)
    })
}

fn create_or_update_protocol_step(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: StepsArgs = parse_arguments(arguments)?;
        let protocol_id = checked(args.protocol_id)?;
        Ok(api.save_protocol_steps(&protocol_id, &args.steps).await)
    })
}

fn delete_protocol_step(api: &ProtocolsIo, arguments: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let args: DeleteStepsArgs = parse_arguments(arguments)?;
        let protocol_id = checked(args.protocol_id)?;
        Ok(api.delete_protocol_steps(&protocol_id, &args.step_guids).await)
    })
}

fn protocol_id_schema() -> Value {
    json!({
        "type": ["integer", "string"],
        "description": "Protocol id (integer) or protocol URI/GUID"
    })
}

/// Returns every built-in tool with its handler, in listing order.
#[allow(clippy::too_many_lines)]
fn builtin_tools() -> Vec<(ToolDefinition, ToolHandler)> {
    let no_args = json!({ "type": "object", "properties": {} });

    vec![
        // === Identifiers ===
        (
            ToolDefinition::new(
                "generate_guids",
                "Generate a list of unique GUIDs (32 lowercase hex characters each). \
                 Use these as the guid of new protocol steps.",
                json!({
                    "type": "object",
                    "properties": {
                        "count": {
                            "type": "integer",
                            "minimum": 0,
                            "maximum": MAX_GENERATED_IDS,
                            "description": "Number of GUIDs to generate"
                        }
                    },
                    "required": ["count"]
                }),
            ),
            generate_guids as ToolHandler,
        ),
        // === Profile ===
        (
            ToolDefinition::new(
                "get_profile",
                "Get the authenticated user's profile information from protocols.io.",
                no_args.clone(),
            ),
            get_profile as ToolHandler,
        ),
        // === Protocols ===
        (
            ToolDefinition::new(
                "create_protocol",
                "Create a new, empty protocol on protocols.io. Returns the created \
                 protocol; use update_protocol to fill in its details.",
                no_args.clone(),
            ),
            create_protocol as ToolHandler,
        ),
        (
            ToolDefinition::new(
                "get_user_protocol_list",
                "List all protocols owned by the authenticated user.",
                no_args,
            ),
            get_user_protocol_list as ToolHandler,
        ),
        (
            ToolDefinition::new(
                "get_public_protocol_list_by_keyword",
                "Search protocols on protocols.io by keyword. Use the results as \
                 references when writing or changing protocol content.",
                json!({
                    "type": "object",
                    "properties": {
                        "filter": {
                            "type": "string",
                            "enum": ["public", "user_public", "user_private", "shared_with_user"],
                            "default": "public",
                            "description": "Which protocols to search"
                        },
                        "keyword": {
                            "type": "string",
                            "description": "Search keyword"
                        },
                        "page_size": {
                            "type": "integer",
                            "minimum": 1,
                            "default": 10,
                            "description": "Results per page"
                        },
                        "page_id": {
                            "type": "integer",
                            "minimum": 1,
                            "default": 1,
                            "description": "Page number, starting at 1"
                        }
                    },
                    "required": ["keyword"]
                }),
            ),
            get_public_protocol_list_by_keyword as ToolHandler,
        ),
        (
            ToolDefinition::new(
                "update_protocol",
                "Update a protocol's metadata on protocols.io. Only the fields given \
                 are changed. All fields are plain text.",
                json!({
                    "type": "object",
                    "properties": {
                        "protocol_id": protocol_id_schema(),
                        "title": { "type": "string", "description": "Protocol title" },
                        "description": { "type": "string", "description": "Protocol abstract" },
                        "before_start": { "type": "string", "description": "Notes to read before starting" },
                        "guidelines": { "type": "string", "description": "Guidelines" },
                        "warning": { "type": "string", "description": "Safety warnings" },
                        "materials_text": { "type": "string", "description": "Materials list" },
                        "protocol_references": {
                            "type": "string",
                            "description": "Numbered reference list for the [1], [2], ... citations used in the protocol"
                        }
                    },
                    "required": ["protocol_id"]
                }),
            ),
            update_protocol as ToolHandler,
        ),
        // === Steps ===
        (
            ToolDefinition::new(
                "get_protocol_steps",
                "Get the steps of a protocol on protocols.io.",
                json!({
                    "type": "object",
                    "properties": {
                        "protocol_id": protocol_id_schema()
                    },
                    "required": ["protocol_id"]
                }),
            ),
            get_protocol_steps as ToolHandler,
        ),
        (
            ToolDefinition::new(
                "create_or_update_protocol_step",
                "Create or update steps of a protocol on protocols.io. Steps form a \
                 chain through previous_guid; only the first step may omit it. Steps \
                 whose guid already exists are updated.",
                json!({
                    "type": "object",
                    "properties": {
                        "protocol_id": protocol_id_schema(),
                        "steps": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "guid": {
                                        "type": "string",
                                        "description": "Unique identifier for this step. Use generate_guids to create new GUIDs."
                                    },
                                    "step": {
                                        "type": "string",
                                        "description": "Step text (plain text)"
                                    },
                                    "previous_guid": {
                                        "type": ["string", "null"],
                                        "description": "guid of the preceding step. Only the first step may leave this null."
                                    },
                                    "section": { "type": "string", "description": "Section title" },
                                    "section_color": { "type": "string", "description": "Section colour" },
                                    "is_substep": {
                                        "type": "boolean",
                                        "default": false,
                                        "description": "Nest this step under the previous step"
                                    }
                                },
                                "required": ["guid", "step"]
                            }
                        }
                    },
                    "required": ["protocol_id", "steps"]
                }),
            ),
            create_or_update_protocol_step as ToolHandler,
        ),
        (
            ToolDefinition::new(
                "delete_protocol_step",
                "Delete steps from a protocol on protocols.io.",
                json!({
                    "type": "object",
                    "properties": {
                        "protocol_id": protocol_id_schema(),
                        "step_guids": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "guids of the steps to delete"
                        }
                    },
                    "required": ["protocol_id", "step_guids"]
                }),
            ),
            delete_protocol_step as ToolHandler,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn registry() -> ToolRegistry {
        // Never contacted: these tests stay local
        let api = ProtocolsIo::new(&ApiConfig::new("http://127.0.0.1:9/api", "token")).unwrap();
        ToolRegistry::protocols_io(api)
    }

    #[test]
    fn tool_definitions_valid() {
        let registry = registry();
        let tools = registry.definitions();
        assert_eq!(tools.len(), 9);

        for tool in &tools {
            assert!(!tool.name.is_empty());
            assert!(tool.description.is_some());
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn alias_is_callable_but_not_listed() {
        let registry = registry();
        assert!(registry.resolve("generate_ids").is_some());
        assert!(registry.resolve("generate_guids").is_some());
        assert!(!registry
            .definitions()
            .iter()
            .any(|d| d.name == "generate_ids"));
    }

    #[tokio::test]
    async fn generate_guids_returns_requested_count() {
        let value = registry()
            .invoke("generate_ids", json!({"count": 3}))
            .await
            .unwrap();
        let ids = value.as_array().unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.as_str().is_some_and(|s| s.len() == 32)));
    }

    #[tokio::test]
    async fn generate_guids_rejects_large_count() {
        let err = registry()
            .invoke("generate_guids", json!({"count": MAX_GENERATED_IDS + 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "count", .. }));
    }

    #[tokio::test]
    async fn missing_required_argument_is_an_error_result() {
        let result = registry().call("get_protocol_steps", json!({})).await;
        assert!(result.is_error);
        assert!(result.first_text().unwrap().contains("protocol_id"));
    }

    #[tokio::test]
    async fn bad_protocol_id_is_rejected_before_any_request() {
        let err = registry()
            .invoke("get_protocol_steps", json!({"protocol_id": "../admin"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::InvalidArgument {
                name: "protocol_id",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unknown_tool() {
        let result = registry().call("launch_rocket", Value::Null).await;
        assert!(result.is_error);
        assert_eq!(result.first_text(), Some("unknown tool: launch_rocket"));
    }

    #[tokio::test]
    async fn unexpected_arguments_are_rejected() {
        let result = registry().call("get_profile", json!({"verbose": true})).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn update_protocol_rejects_misspelled_fields() {
        let err = registry()
            .invoke("update_protocol", json!({"protocol_id": 1, "titel": "Typo"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("titel"));
    }

    #[tokio::test]
    async fn update_protocol_requires_protocol_id() {
        let err = registry()
            .invoke("update_protocol", json!({"title": "Western blot"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::InvalidArgument {
                name: "protocol_id",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn dot_protocol_ids_are_rejected() {
        for id in [".", "..", "%2e%2e"] {
            let result = registry()
                .call("get_protocol_steps", json!({ "protocol_id": id }))
                .await;
            assert!(result.is_error, "{id}");
        }
    }

    #[test]
    fn tool_call_result_text() {
        let result = ToolCallResult::text("Hello, world!");
        assert!(!result.is_error);
        assert_eq!(result.first_text(), Some("Hello, world!"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            json!({"content": [{"type": "text", "text": "Hello, world!"}]})
        );
    }

    #[test]
    fn tool_call_result_error() {
        let result = ToolCallResult::error("Something went wrong");
        assert!(result.is_error);
        assert_eq!(serde_json::to_value(&result).unwrap()["isError"], true);
    }
}
