//! Collaboration wire messages
//!
//! JSON shapes exchanged with the sequencing server. The transport itself
//! (WebSocket, long polling) is up to the host.

use crate::editor::Operation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local operation submitted for sequencing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMessage {
    pub op_id: Uuid,
    /// Last server sequence number the sender had applied
    pub base_version_seq: u64,
    pub user: String,
    pub operation: Vec<Operation>,
}

/// An operation with its position in the server's total order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedOperation {
    pub seq: u64,
    pub op_id: Uuid,
    pub user: String,
    /// Rewritten to apply on top of `seq - 1`
    pub operation: Vec<Operation>,
}

/// Advisory caret broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdate {
    pub user_id: String,
    pub position: Option<usize>,
    /// Lamport stamp; anything not newer than the sender's last is dropped
    pub clock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Operation(OperationMessage),
    Ack { seq: u64 },
    Cursor(CursorUpdate),
    Join { user: String },
    Leave { user: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Sequenced(SequencedOperation),
    Cursor(CursorUpdate),
    Joined { user: String },
    Left { user: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerMessage {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_message_shape() {
        let msg = ClientMessage::Operation(OperationMessage {
            op_id: Uuid::nil(),
            base_version_seq: 4,
            user: "alice".into(),
            operation: vec![Operation::delete(0..3)],
        });

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "operation");
        assert_eq!(value["baseVersionSeq"], 4);
        assert_eq!(
            value["operation"],
            json!([{"type": "delete", "range": {"start": 0, "end": 3}}])
        );
    }

    #[test]
    fn test_server_message_from_json() {
        let msg = ServerMessage::from_json(
            r#"{"type":"cursor","userId":"bob","position":7,"clock":3}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ServerMessage::Cursor(CursorUpdate {
                user_id: "bob".into(),
                position: Some(7),
                clock: 3,
            })
        );

        let left = ServerMessage::from_json(r#"{"type":"left","user":"bob"}"#).unwrap();
        assert_eq!(left, ServerMessage::Left { user: "bob".into() });
    }

    #[test]
    fn test_ack_shape() {
        let json = ClientMessage::Ack { seq: 9 }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"ack","seq":9}"#);
    }
}
