//! Outbound message model: what a task becomes on the ordered queue.

use serde::{Deserialize, Serialize};

use super::ids::MessageId;
use super::task::{SyncTask, TokenType};

/// Longest token id prefix that goes into a group id.
pub const GROUP_TOKEN_ID_MAX_CHARS: usize = 35;

/// Body consumers read to find the task they must run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessageBody {
    pub contract_address: String,
    pub token_id: String,
    pub token_type: TokenType,
    pub task_id: String,
}

impl From<&SyncTask> for TaskMessageBody {
    fn from(task: &SyncTask) -> Self {
        Self {
            contract_address: task.contract_address.clone(),
            token_id: task.token_id.clone(),
            token_type: task.token_type.clone(),
            task_id: task.task_id.clone(),
        }
    }
}

/// Message body before it is handed to the transport.
///
/// The transport only carries strings; structured bodies are serialized at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Json(serde_json::Value),
}

impl MessageBody {
    pub fn into_text(self) -> Result<String, serde_json::Error> {
        match self {
            MessageBody::Text(s) => Ok(s),
            MessageBody::Json(v) => serde_json::to_string(&v),
        }
    }
}

/// A message ready to publish, still carrying a structured body.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub body: MessageBody,
    /// Ordering partition key.
    pub group_id: String,
    /// Idempotency key; always the message id.
    pub deduplication_id: String,
}

impl OutboundMessage {
    pub fn for_task(id: MessageId, task: &SyncTask) -> Self {
        let body = serde_json::json!({
            "contractAddress": task.contract_address,
            "tokenId": task.token_id,
            "tokenType": task.token_type.as_str(),
            "taskId": task.task_id,
        });
        Self {
            id,
            body: MessageBody::Json(body),
            group_id: group_id(&task.contract_address, &task.token_id),
            deduplication_id: id.to_string(),
        }
    }

    /// Normalizes the body to text for the wire.
    pub fn into_wire(self) -> Result<WireMessage, serde_json::Error> {
        Ok(WireMessage {
            id: self.id.to_string(),
            body: self.body.into_text()?,
            group_id: self.group_id,
            deduplication_id: self.deduplication_id,
        })
    }
}

/// What the transport actually receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub body: String,
    pub group_id: String,
    pub deduplication_id: String,
}

/// Per-message acknowledgment from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Entry id we sent.
    pub id: String,
    /// Id the queue assigned.
    pub message_id: String,
    pub sequence_number: Option<String>,
}

/// `{contract}-{token id truncated to 35 chars}`.
///
/// Truncation counts characters, not bytes.
pub fn group_id(contract_address: &str, token_id: &str) -> String {
    let token_prefix: String = token_id.chars().take(GROUP_TOKEN_ID_MAX_CHARS).collect();
    format!("{contract_address}-{token_prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    #[rstest]
    #[case::short("42", "0xabc-42")]
    #[case::exactly_35(&"9".repeat(35), &format!("0xabc-{}", "9".repeat(35)))]
    #[case::long(&"1".repeat(78), &format!("0xabc-{}", "1".repeat(35)))]
    fn group_id_truncates_token_id(#[case] token_id: &str, #[case] expected: &str) {
        assert_eq!(group_id("0xabc", token_id), expected);
    }

    #[test]
    fn group_id_truncation_respects_char_boundaries() {
        let token_id = "é".repeat(40);
        let gid = group_id("0xabc", &token_id);
        let token_part = gid.strip_prefix("0xabc-").unwrap();
        assert_eq!(token_part.chars().count(), GROUP_TOKEN_ID_MAX_CHARS);
    }

    #[test]
    fn message_for_task_uses_id_as_dedup_key() {
        let task = SyncTask::new("0xabc", "7", TokenType::new("ERC721"), "t-1", Utc::now());
        let id = MessageId::from_ulid(Ulid::new());
        let msg = OutboundMessage::for_task(id, &task);

        assert_eq!(msg.deduplication_id, id.to_string());
        assert_eq!(msg.group_id, "0xabc-7");
        let MessageBody::Json(body) = &msg.body else {
            panic!("expected json body");
        };
        assert_eq!(body["contractAddress"], "0xabc");
        assert_eq!(body["tokenId"], "7");
        assert_eq!(body["tokenType"], "ERC721");
        assert_eq!(body["taskId"], "t-1");
    }

    #[test]
    fn text_body_is_passed_through_unchanged() {
        let body = MessageBody::Text("{\"already\":\"encoded\"}".to_string());
        assert_eq!(body.into_text().unwrap(), "{\"already\":\"encoded\"}");
    }

    #[test]
    fn wire_form_serializes_json_body() {
        let task = SyncTask::new("0xabc", "7", TokenType::new("ERC721"), "t-1", Utc::now());
        let id = MessageId::from_ulid(Ulid::new());
        let wire = OutboundMessage::for_task(id, &task).into_wire().unwrap();

        let decoded: TaskMessageBody = serde_json::from_str(&wire.body).unwrap();
        assert_eq!(decoded, TaskMessageBody::from(&task));
        assert_eq!(wire.id, wire.deduplication_id);
    }
}
