use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::transport::types::ConversationId;

/// Which subscription an inbound body arrived on. Each kind has one schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    UserErrors,
    UserNotifications,
    Messages,
    ConversationNotifications,
    Typing,
    ReadReceipts,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::UserErrors => "error",
            ChannelKind::UserNotifications => "notification",
            ChannelKind::Messages => "chat message",
            ChannelKind::ConversationNotifications => "conversation notification",
            ChannelKind::Typing => "typing",
            ChannelKind::ReadReceipts => "read receipt",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("malformed {channel} payload: {reason}")]
pub struct PayloadError {
    pub channel: ChannelKind,
    pub reason: String,
}

impl PayloadError {
    pub fn new(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self {
            channel,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Photo,
    Document,
    Audio,
    Video,
    System,
}

impl MessageType {
    /// Message type used when a chat attachment of this MIME type is sent.
    pub fn for_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            MessageType::Photo
        } else {
            MessageType::Document
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

/// Body published to the send address. Built per send and dropped afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub conversation_id: ConversationId,
    pub content: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
}

impl OutgoingMessage {
    pub fn new(
        conversation_id: ConversationId,
        content: impl Into<String>,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id,
            content: content.into(),
            message_type,
            timestamp,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Reads an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of the typing and mark-as-read signals.
pub const EMPTY_SIGNAL: &str = "{}";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(u64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFile {
    #[serde(default)]
    pub id: Option<u64>,
    pub original_filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<MessageId>,
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub sender_id: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_type: MessageType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_status: MessageStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub read_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<MessageFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_from_current_user: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub typing_user: String,
    #[serde(default = "typing_default")]
    pub typing: bool,
}

fn typing_default() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: ConversationId,
    pub read_by_user_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub error: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

/// User-queue notifications arrive either as bare strings or as `{message}` objects.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserNotification {
    Text(String),
    Object { message: String },
}

impl UserNotification {
    pub fn text(&self) -> &str {
        match self {
            UserNotification::Text(text) => text,
            UserNotification::Object { message } => message,
        }
    }
}

/// A decoded inbound body, one variant per channel kind.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundPayload {
    Error(ErrorNotice),
    Notification(UserNotification),
    Message(ChatMessage),
    ConversationNotification(ChatMessage),
    Typing(TypingNotice),
    ReadReceipt(ReadReceipt),
}

impl InboundPayload {
    pub fn decode(channel: ChannelKind, body: &str) -> Result<Self, PayloadError> {
        let map = |err: serde_json::Error| PayloadError::new(channel, err.to_string());
        let payload = match channel {
            ChannelKind::UserErrors => InboundPayload::Error(serde_json::from_str(body).map_err(map)?),
            ChannelKind::UserNotifications => {
                InboundPayload::Notification(serde_json::from_str(body).map_err(map)?)
            }
            ChannelKind::Messages => InboundPayload::Message(serde_json::from_str(body).map_err(map)?),
            ChannelKind::ConversationNotifications => {
                InboundPayload::ConversationNotification(serde_json::from_str(body).map_err(map)?)
            }
            ChannelKind::Typing => InboundPayload::Typing(serde_json::from_str(body).map_err(map)?),
            ChannelKind::ReadReceipts => {
                InboundPayload::ReadReceipt(serde_json::from_str(body).map_err(map)?)
            }
        };
        Ok(payload)
    }
}
