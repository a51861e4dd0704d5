//! Transient notices and the chat view model the page draws from.

pub mod chat_log;
pub mod format;

use std::time::{Duration, Instant};

use crate::messaging::{ClientEvent, MessagingConfig};
use crate::transport::types::ConnState;

pub use chat_log::{BubbleBody, ChatLog, MessageBubble, Side};
pub use format::{escape_html, format_file_size, format_message_time};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Toast,
    Error,
    Typing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub text: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn to_html(&self) -> String {
        let text = escape_html(&self.text);
        match self.kind {
            NoticeKind::Toast => format!(
                "<div class=\"toast show\"><div class=\"toast-header\"><strong class=\"me-auto\">New Message</strong></div><div class=\"toast-body\">{text}</div></div>"
            ),
            NoticeKind::Error => {
                format!("<div class=\"alert alert-danger alert-dismissible fade show\">{text}</div>")
            }
            NoticeKind::Typing => format!(
                "<div class=\"typing-indicator text-center py-2\"><small class=\"text-muted\">{text}</small></div>"
            ),
        }
    }
}

/// Stacked notices that vanish at their deadline. No cap, no queueing.
#[derive(Debug)]
pub struct NoticeBoard {
    toast_lifetime: Duration,
    typing_lifetime: Duration,
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub fn new(toast_lifetime: Duration, typing_lifetime: Duration) -> Self {
        Self {
            toast_lifetime,
            typing_lifetime,
            notices: Vec::new(),
            next_id: 0,
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(config.toast_lifetime(), config.typing_notice_lifetime())
    }

    pub fn push(&mut self, kind: NoticeKind, text: impl Into<String>, now: Instant) -> u64 {
        let lifetime = match kind {
            NoticeKind::Toast | NoticeKind::Error => self.toast_lifetime,
            NoticeKind::Typing => self.typing_lifetime,
        };
        let id = self.next_id;
        self.next_id += 1;
        self.notices.push(Notice {
            id,
            kind,
            text: text.into(),
            expires_at: now + lifetime,
        });
        id
    }

    pub fn toast(&mut self, text: impl Into<String>, now: Instant) -> u64 {
        self.push(NoticeKind::Toast, text, now)
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) -> u64 {
        self.push(NoticeKind::Error, text, now)
    }

    pub fn typing(&mut self, user: &str, now: Instant) -> u64 {
        self.push(NoticeKind::Typing, format!("{user} is typing..."), now)
    }

    /// Removes and returns every notice whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<Notice> {
        let (expired, active): (Vec<Notice>, Vec<Notice>) = std::mem::take(&mut self.notices)
            .into_iter()
            .partition(|notice| notice.expires_at <= now);
        self.notices = active;
        expired
    }

    /// Closes a notice early, as its close button does.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }

    pub fn active(&self) -> &[Notice] {
        &self.notices
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn to_html(&self) -> String {
        self.notices.iter().map(Notice::to_html).collect()
    }
}

/// Everything the chat page shows, driven by drained client events.
#[derive(Debug)]
pub struct Page {
    pub board: NoticeBoard,
    pub chat: ChatLog,
    pub connection: ConnState,
}

impl Page {
    pub fn new(board: NoticeBoard) -> Self {
        Self {
            board,
            chat: ChatLog::new(),
            connection: ConnState::Disconnected,
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(NoticeBoard::from_config(config))
    }

    pub fn apply(&mut self, event: ClientEvent, now: Instant) {
        match event {
            ClientEvent::ConnectionState(state) => self.connection = state,
            ClientEvent::Error(message) => {
                self.board.error(message, now);
            }
            ClientEvent::Notification(text) => {
                self.board.toast(text, now);
            }
            ClientEvent::ConversationNotification(message) => {
                self.board
                    .toast(format!("New message from {}", message.sender_name), now);
            }
            ClientEvent::Message(message) => self.chat.push(&message),
            ClientEvent::Typing(notice) => {
                self.board.typing(&notice.typing_user, now);
            }
            ClientEvent::ReadReceipt(receipt) => {
                self.chat.mark_read(receipt.conversation_id);
            }
        }
    }

    pub fn apply_all(&mut self, events: Vec<ClientEvent>, now: Instant) {
        for event in events {
            self.apply(event, now);
        }
    }

    pub fn expire(&mut self, now: Instant) -> Vec<Notice> {
        self.board.expire(now)
    }

    pub fn render(&self) -> String {
        format!("{}{}", self.board.to_html(), self.chat.to_html())
    }
}
