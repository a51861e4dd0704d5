use crate::messaging::payload::{ChatMessage, MessageStatus, MessageType};
use crate::notify::format::{escape_html, format_file_size};
use crate::transport::types::ConversationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Sent,
    Received,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLink {
    pub name: String,
    pub url: String,
    pub size_label: String,
    pub is_image: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BubbleBody {
    Text(String),
    Photos(Vec<String>),
    Documents(Vec<DocumentLink>),
}

/// One rendered chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageBubble {
    pub conversation_id: ConversationId,
    pub side: Side,
    pub body: BubbleBody,
    pub time_label: String,
    /// Only the current user's own messages carry a delivery marker.
    pub status: Option<MessageStatus>,
}

impl MessageBubble {
    pub fn from_message(message: &ChatMessage) -> Self {
        let side = if message.is_from_current_user {
            Side::Sent
        } else {
            Side::Received
        };
        let body = match message.message_type {
            MessageType::Photo if !message.files.is_empty() => BubbleBody::Photos(
                message.files.iter().map(|file| file.file_url.clone()).collect(),
            ),
            MessageType::Document if !message.files.is_empty() => BubbleBody::Documents(
                message
                    .files
                    .iter()
                    .map(|file| DocumentLink {
                        name: file.original_filename.clone(),
                        url: file.file_url.clone(),
                        size_label: format_file_size(file.file_size),
                        is_image: file.file_type.as_deref() == Some("photo"),
                    })
                    .collect(),
            ),
            _ => BubbleBody::Text(message.content.clone()),
        };
        let time_label = message
            .created_at
            .map(|created| created.format("%H:%M").to_string())
            .unwrap_or_default();
        Self {
            conversation_id: message.conversation_id,
            side,
            body,
            time_label,
            status: message.is_from_current_user.then_some(message.message_status),
        }
    }

    pub fn to_html(&self) -> String {
        let class = match self.side {
            Side::Sent => "message-bubble message-sent",
            Side::Received => "message-bubble message-received",
        };
        let content = match &self.body {
            BubbleBody::Text(text) => {
                format!("<div class=\"message-text\">{}</div>", escape_html(text))
            }
            BubbleBody::Photos(urls) => {
                let images = urls
                    .iter()
                    .map(|url| {
                        format!(
                            "<img src=\"{}\" class=\"img-fluid rounded\" alt=\"Photo attachment\">",
                            escape_html(url)
                        )
                    })
                    .collect::<String>();
                format!("<div class=\"message-photo\">{images}</div>")
            }
            BubbleBody::Documents(links) => {
                let anchors = links
                    .iter()
                    .map(|link| {
                        let icon = if link.is_image { "image" } else { "pdf" };
                        format!(
                            "<a href=\"{}\" target=\"_blank\"><i class=\"fas fa-file-{icon}\"></i><div>{}</div><small class=\"text-muted\">{}</small></a>",
                            escape_html(&link.url),
                            escape_html(&link.name),
                            escape_html(&link.size_label)
                        )
                    })
                    .collect::<String>();
                format!("<div class=\"message-document\">{anchors}</div>")
            }
        };
        let status = match self.status {
            Some(MessageStatus::Read) => {
                "<span class=\"text-primary\"><i class=\"fas fa-check-double\"></i></span>"
            }
            Some(_) => "<span class=\"text-muted\"><i class=\"fas fa-check\"></i></span>",
            None => "",
        };
        format!(
            "<div class=\"{class}\"><div class=\"message-content\">{content}<div class=\"message-meta\"><small class=\"text-muted\">{}</small>{status}</div></div></div>",
            escape_html(&self.time_label)
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatLog {
    bubbles: Vec<MessageBubble>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: &ChatMessage) {
        self.bubbles.push(MessageBubble::from_message(message));
    }

    /// Marks the current user's bubbles in `conversation` as read. Returns how many changed.
    pub fn mark_read(&mut self, conversation: ConversationId) -> usize {
        let mut changed = 0;
        for bubble in &mut self.bubbles {
            if bubble.conversation_id != conversation {
                continue;
            }
            if let Some(status) = bubble.status.as_mut() {
                if *status != MessageStatus::Read {
                    *status = MessageStatus::Read;
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn bubbles(&self) -> &[MessageBubble] {
        &self.bubbles
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn clear(&mut self) {
        self.bubbles.clear();
    }

    pub fn to_html(&self) -> String {
        self.bubbles.iter().map(MessageBubble::to_html).collect()
    }
}
