//! Chat attachments: validate, upload over REST, then announce the file in the conversation.
//!
//! The two steps are not transactional. A failed follow-up send leaves the
//! uploaded file on the server with no message pointing at it.

use serde::Deserialize;
use thiserror::Error;

use crate::forms::files::{FileRule, SelectedFile};
use crate::forms::ValidationError;
use crate::messaging::payload::MessageType;
use crate::messaging::MessagingClient;
use crate::transport::errors::TransportError;
use crate::transport::types::ConversationId;

pub const UPLOAD_ENDPOINT: &str = "/api/files/upload";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("File upload failed: {0}")]
    Network(String),
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Send(#[from] TransportError),
}

/// Posts one file as multipart form data.
pub trait FileUploader {
    fn upload(
        &mut self,
        file: &SelectedFile,
        bytes: Vec<u8>,
        conversation: ConversationId,
    ) -> Result<UploadResponse, UploadError>;
}

/// Uploads `file` and sends a message naming it. Every failure is also shown as an error banner.
pub fn send_attachment(
    client: &mut MessagingClient,
    uploader: &mut dyn FileUploader,
    conversation: ConversationId,
    file: &SelectedFile,
    bytes: Vec<u8>,
) -> Result<String, UploadError> {
    if let Err(error) = FileRule::ChatAttachment.check(file) {
        client.report_error(error.message.clone());
        return Err(error.into());
    }

    let response = match uploader.upload(file, bytes, conversation) {
        Ok(response) => response,
        Err(error) => {
            client.report_error(error.to_string());
            return Err(error);
        }
    };
    if !response.success {
        let reason = response
            .error
            .unwrap_or_else(|| String::from("File upload failed"));
        client.report_error(reason.clone());
        return Err(UploadError::Rejected(reason));
    }

    let filename = response
        .original_filename
        .unwrap_or_else(|| file.name.clone());
    log::info!("uploaded {filename} to conversation {conversation}");
    let message_type = MessageType::for_content_type(&file.content_type);
    if let Err(error) = client.send_message(conversation, &filename, message_type) {
        log::warn!("uploaded {filename} but the follow-up message failed: {error}");
        return Err(error.into());
    }
    Ok(filename)
}
