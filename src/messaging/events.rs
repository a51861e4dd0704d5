use crate::messaging::payload::{ChatMessage, ReadReceipt, TypingNotice};
use crate::transport::types::ConnState;

/// Everything the page needs to react to, drained with `MessagingClient::take_events`.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    ConnectionState(ConnState),
    Error(String),
    Notification(String),
    ConversationNotification(ChatMessage),
    Message(ChatMessage),
    Typing(TypingNotice),
    ReadReceipt(ReadReceipt),
}
