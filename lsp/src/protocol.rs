//! The slice of JSON-RPC the transport speaks on its own behalf.
//!
//! The controller never interprets analysis traffic. The transport only needs
//! to stop the server politely (`shutdown` then `exit`), answer server-initiated
//! requests so the server does not block, and forward log messages.

use serde::Deserialize;
use serde_json::{Map, Value, json};

const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC "method not found" error code.
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;

/// Frames the client originates.
#[derive(Debug)]
pub(crate) enum Outgoing {
    Shutdown { id: u64 },
    Exit,
    /// Reply to a server request we do not implement.
    MethodNotFound { id: Value, method: String },
}

impl Outgoing {
    pub fn to_frame(&self) -> Value {
        match self {
            Self::Shutdown { id } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": "shutdown",
            }),
            Self::Exit => json!({ "jsonrpc": JSONRPC_VERSION, "method": "exit" }),
            Self::MethodNotFound { id, method } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": {
                    "code": METHOD_NOT_FOUND,
                    "message": format!("Method not found: {method}"),
                },
            }),
        }
    }
}

/// Frames the server sends, by what they ask of us.
#[derive(Debug)]
pub(crate) enum Incoming {
    /// Answer to one of our requests: its result, or the error message.
    Reply {
        id: u64,
        outcome: Result<Value, String>,
    },
    /// A request that expects an answer.
    Call { id: Value, method: String },
    Event {
        method: String,
        params: Option<Value>,
    },
}

impl Incoming {
    /// Classify a decoded frame. Frames we could never route yield `None`.
    pub fn classify(frame: Value) -> Option<Self> {
        let Value::Object(mut fields) = frame else {
            return None;
        };
        let id = fields.remove("id");
        let method = match fields.remove("method") {
            Some(Value::String(method)) => Some(method),
            _ => None,
        };

        match (id, method) {
            (Some(id), Some(method)) => Some(Self::Call { id, method }),
            (None, Some(method)) => Some(Self::Event {
                method,
                params: fields.remove("params"),
            }),
            (Some(id), None) => Some(Self::Reply {
                id: id.as_u64()?,
                outcome: reply_outcome(&mut fields)?,
            }),
            (None, None) => None,
        }
    }
}

fn reply_outcome(fields: &mut Map<String, Value>) -> Option<Result<Value, String>> {
    if let Some(error) = fields.remove("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Some(Err(message.to_string()));
    }
    fields.remove("result").map(Ok)
}

/// Params of `window/logMessage` and `window/showMessage`.
#[derive(Debug, Deserialize)]
pub(crate) struct LogMessage {
    #[serde(rename = "type")]
    level: u8,
    pub message: String,
}

impl LogMessage {
    pub fn level_label(&self) -> &'static str {
        match self.level {
            1 => "Error",
            2 => "Warn",
            3 => "Info",
            _ => "Debug",
        }
    }
}
