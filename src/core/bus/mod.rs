//! Publish/subscribe bus seam
//!
//! Messages are JSON objects with optional `name`, `command` and `lines`
//! keys. They are validated into [`BusMessage`] at the boundary; nothing
//! past [`BusMessage::decode`] looks at raw fields.

mod codec;
mod local;
mod relay;
mod tcp;

pub use local::{LocalBus, LocalBusHandle};
pub use relay::BusRelay;
pub use tcp::TcpBus;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// Bus error types
#[derive(Error, Debug)]
pub enum BusError {
    /// Could not reach the bus
    #[error("Bus connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O error
    #[error("Bus I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Framing error on the wire
    #[error("Bus framing error: {0}")]
    Codec(String),

    /// Payload is not a valid bus message
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The bus went away
    #[error("Bus closed")]
    Closed,
}

/// A validated bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// `{name}`: a bridge announcing its identity
    Announcement {
        /// Announced identity
        name: String,
    },
    /// `{name, command}`: an instruction for the named bridge
    Command {
        /// Target identity
        name: String,
        /// Command text
        command: String,
    },
    /// `{name, lines}`: a bridge's reply to `Read`.
    /// `lines` is `None` when the device link failed.
    ReadResponse {
        /// Responding identity
        name: String,
        /// Lines read from the device
        lines: Option<Vec<String>>,
    },
}

impl BusMessage {
    /// Build a command message
    pub fn command(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::Command {
            name: name.into(),
            command: command.into(),
        }
    }

    /// Validate a raw payload
    pub fn decode(payload: &str) -> Result<Self, BusError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| BusError::Malformed(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| BusError::Malformed("payload is not an object".to_string()))?;

        let name = match object.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(BusError::Malformed("`name` is not a string".to_string())),
            None => return Err(BusError::Malformed("missing `name`".to_string())),
        };

        if let Some(command) = object.get("command") {
            return match command {
                Value::String(command) => Ok(Self::Command {
                    name,
                    command: command.clone(),
                }),
                _ => Err(BusError::Malformed("`command` is not a string".to_string())),
            };
        }

        match object.get("lines") {
            None => Ok(Self::Announcement { name }),
            Some(Value::Null) => Ok(Self::ReadResponse { name, lines: None }),
            Some(Value::Array(items)) => {
                let lines = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| BusError::Malformed("`lines` holds a non-string".to_string()))?;
                Ok(Self::ReadResponse {
                    name,
                    lines: Some(lines),
                })
            }
            Some(_) => Err(BusError::Malformed("`lines` is not an array".to_string())),
        }
    }

    /// Render as a wire payload
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Announcement { name } => json!({ "name": name }),
            Self::Command { name, command } => json!({ "name": name, "command": command }),
            Self::ReadResponse { name, lines } => json!({ "name": name, "lines": lines }),
        };
        value.to_string()
    }
}

/// A connection to the shared bus.
///
/// Every handle receives every message published on the bus, its own
/// publications included.
#[async_trait]
pub trait MessageBus: Send {
    /// Publish a message
    async fn publish(&mut self, message: &BusMessage) -> Result<(), BusError>;

    /// Wait for the next raw payload; `None` once the bus is closed
    async fn next_payload(&mut self) -> Result<Option<String>, BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_shapes() {
        assert_eq!(
            BusMessage::decode(r#"{"name":"Foo"}"#).unwrap(),
            BusMessage::Announcement {
                name: "Foo".to_string()
            }
        );
        assert_eq!(
            BusMessage::decode(r#"{"name":"Foo","command":"D,5"}"#).unwrap(),
            BusMessage::command("Foo", "D,5")
        );
        assert_eq!(
            BusMessage::decode(r#"{"name":"Foo","lines":["20","OK"]}"#).unwrap(),
            BusMessage::ReadResponse {
                name: "Foo".to_string(),
                lines: Some(vec!["20".to_string(), "OK".to_string()])
            }
        );
        assert_eq!(
            BusMessage::decode(r#"{"name":"Foo","lines":null}"#).unwrap(),
            BusMessage::ReadResponse {
                name: "Foo".to_string(),
                lines: None
            }
        );
    }

    #[test]
    fn test_decode_rejects_malformed() {
        for payload in [
            "not json",
            "[1,2]",
            r#"{"command":"D,5"}"#,
            r#"{"name":5,"command":"D,5"}"#,
            r#"{"name":"Foo","command":7}"#,
            r#"{"name":"Foo","lines":"20"}"#,
            r#"{"name":"Foo","lines":[1]}"#,
        ] {
            assert!(
                matches!(BusMessage::decode(payload), Err(BusError::Malformed(_))),
                "accepted {payload}"
            );
        }
    }

    #[test]
    fn test_encode_read_response() {
        let message = BusMessage::ReadResponse {
            name: "Foo".to_string(),
            lines: Some(vec![]),
        };
        let value: Value = serde_json::from_str(&message.encode()).unwrap();
        assert_eq!(value, json!({ "name": "Foo", "lines": [] }));

        let failed = BusMessage::ReadResponse {
            name: "Foo".to_string(),
            lines: None,
        };
        let value: Value = serde_json::from_str(&failed.encode()).unwrap();
        assert_eq!(value, json!({ "name": "Foo", "lines": null }));
    }

    #[test]
    fn test_encode_announcement_has_only_name() {
        let value: Value = serde_json::from_str(
            &BusMessage::Announcement {
                name: "Foo".to_string(),
            }
            .encode(),
        )
        .unwrap();
        assert_eq!(value, json!({ "name": "Foo" }));
    }
}
