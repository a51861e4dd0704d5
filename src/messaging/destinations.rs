//! Address scheme of the message bus.
//!
//! Topics under `/topic` are broadcast to every participant of a conversation.
//! Queues under `/user/queue` are delivered only to the authenticated user.
//! Addresses under `/app` are handled by the server.

use crate::messaging::payload::ChannelKind;
use crate::transport::types::ConversationId;

pub const USER_ERRORS: &str = "/user/queue/errors";
pub const USER_NOTIFICATIONS: &str = "/user/queue/notifications";

/// A subscribable channel: either user-scoped or tied to one conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    UserErrors,
    UserNotifications,
    Messages(ConversationId),
    Notifications(ConversationId),
    Typing(ConversationId),
    ReadReceipts(ConversationId),
}

impl Channel {
    /// The four channels subscribed while a conversation is active.
    pub fn for_conversation(id: ConversationId) -> [Channel; 4] {
        [
            Channel::Messages(id),
            Channel::Notifications(id),
            Channel::Typing(id),
            Channel::ReadReceipts(id),
        ]
    }

    pub fn user_scoped() -> [Channel; 2] {
        [Channel::UserErrors, Channel::UserNotifications]
    }

    pub fn destination(&self) -> String {
        match self {
            Channel::UserErrors => USER_ERRORS.to_string(),
            Channel::UserNotifications => USER_NOTIFICATIONS.to_string(),
            Channel::Messages(id) => format!("/topic/conversation/{id}"),
            Channel::Notifications(id) => format!("/user/queue/conversation/{id}/notification"),
            Channel::Typing(id) => format!("/topic/conversation/{id}/typing"),
            Channel::ReadReceipts(id) => format!("/user/queue/conversation/{id}/read-receipt"),
        }
    }

    pub fn conversation(&self) -> Option<ConversationId> {
        match self {
            Channel::UserErrors | Channel::UserNotifications => None,
            Channel::Messages(id)
            | Channel::Notifications(id)
            | Channel::Typing(id)
            | Channel::ReadReceipts(id) => Some(*id),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::UserErrors => ChannelKind::UserErrors,
            Channel::UserNotifications => ChannelKind::UserNotifications,
            Channel::Messages(_) => ChannelKind::Messages,
            Channel::Notifications(_) => ChannelKind::ConversationNotifications,
            Channel::Typing(_) => ChannelKind::Typing,
            Channel::ReadReceipts(_) => ChannelKind::ReadReceipts,
        }
    }
}

pub fn send_address(id: ConversationId) -> String {
    format!("/app/chat/send/{id}")
}

pub fn typing_address(id: ConversationId) -> String {
    format!("/app/chat/typing/{id}")
}

pub fn mark_as_read_address(id: ConversationId) -> String {
    format!("/app/chat/mark-as-read/{id}")
}
