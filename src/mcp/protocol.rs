//! JSON-RPC 2.0 message types for the MCP protocol.
//!
//! Incoming lines are either requests (they carry an `id` and get exactly one
//! [`Response`]) or notifications (no `id`, no reply). Every outgoing message
//! is a [`Response`] holding either a `result` or an `error`.
//!
//! MCP narrows JSON-RPC slightly: request ids are strings or integers,
//! never `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported during initialisation.
pub const SERVER_NAME: &str = "protocols-io-mcp";

/// A JSON-RPC request id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A request from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Request identifier echoed in the response.
    pub id: RequestId,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    /// Deserialises `params` into `T`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-params response if `params` is missing or does not
    /// match `T`.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T, Response> {
        let Some(params) = &self.params else {
            return Err(Response::invalid_params(
                self.id.clone(),
                format!("Missing params for {}", self.method),
            ));
        };

        T::deserialize(params).map_err(|e| {
            Response::invalid_params(
                self.id.clone(),
                format!("Invalid params for {}: {e}", self.method),
            )
        })
    }
}

/// A notification from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Notification method, e.g. `notifications/initialized`.
    pub method: String,
    /// Notification parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A parsed incoming line.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Expects a response.
    Request(Request),
    /// Fire-and-forget.
    Notification(Notification),
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The JSON is not a valid request object.
    InvalidRequest,
    /// Unknown method.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal error.
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    /// Numeric error code.
    pub code: i32,
    /// Short description.
    pub message: String,
}

/// A response to a request, or to an unparseable line.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// Id of the request answered; `null` if it could not be determined.
    pub id: Option<RequestId>,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub const fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ErrorObject {
                code: code.code(),
                message: message.into(),
            }),
        }
    }

    /// The line was not valid JSON.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::failure(None, ErrorCode::ParseError, "Parse error")
    }

    /// The line was JSON but not a valid request.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::failure(id, ErrorCode::InvalidRequest, message)
    }

    /// The method is not implemented.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::failure(
            Some(id),
            ErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// The params did not match the method.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::failure(Some(id), ErrorCode::InvalidParams, message)
    }

    /// Something failed on our side.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::failure(Some(id), ErrorCode::InternalError, message)
    }

    /// Returns the error code, if this is an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// Parses one line into a request or notification.
///
/// # Errors
///
/// Returns the error response to send back if the line is not valid JSON or
/// not a valid JSON-RPC 2.0 message.
pub fn parse_message(line: &str) -> Result<IncomingMessage, Response> {
    let value: Value = serde_json::from_str(line).map_err(|_| Response::parse_error())?;

    let Value::Object(obj) = &value else {
        return Err(Response::invalid_request(None, "Message must be a JSON object"));
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(Response::invalid_request(
            None,
            "jsonrpc field must be \"2.0\"",
        ));
    }

    if obj.contains_key("id") {
        let request = Request::deserialize(&value)
            .map_err(|e| Response::invalid_request(None, format!("Invalid request: {e}")))?;
        if request.method.is_empty() {
            return Err(Response::invalid_request(
                Some(request.id),
                "method field cannot be empty",
            ));
        }
        Ok(IncomingMessage::Request(request))
    } else {
        let notification = Notification::deserialize(&value)
            .map_err(|e| Response::invalid_request(None, format!("Invalid notification: {e}")))?;
        Ok(IncomingMessage::Notification(notification))
    }
}
