//! Blocking client for the fixed REST endpoints the chat page talks to.

use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::forms::files::SelectedFile;
use crate::forms::registration::{RegistrationRequest, RegistrationResponse, Role};
use crate::transport::types::ConversationId;
use crate::upload::{FileUploader, UploadError, UploadResponse, UPLOAD_ENDPOINT};

pub const START_CONVERSATION_ENDPOINT: &str = "/api/conversations/start";
pub const SEARCH_ENDPOINT: &str = "/api/professionals/search";
pub const MIN_SEARCH_LEN: usize = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartConversationRequest {
    professional_id: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartConversationResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    conversation_id: Option<ConversationId>,
    #[serde(default)]
    error: Option<String>,
}

impl StartConversationResponse {
    fn into_result(self) -> Result<ConversationId, ApiError> {
        match (self.success, self.conversation_id) {
            (true, Some(id)) => Ok(id),
            _ => {
                let reason = self.error.unwrap_or_else(|| String::from("unknown error"));
                Err(ApiError::Rejected(format!(
                    "Failed to start conversation: {reason}"
                )))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionalSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    professionals: Vec<ProfessionalSummary>,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn upload_file(
        &self,
        file: &SelectedFile,
        bytes: Vec<u8>,
        conversation: ConversationId,
    ) -> Result<UploadResponse, ApiError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("conversationId", conversation.to_string());
        log::debug!("uploading {} ({} bytes)", file.name, file.size);
        let response = self
            .http
            .post(self.url(UPLOAD_ENDPOINT))
            .multipart(form)
            .send()?
            .json::<UploadResponse>()?;
        Ok(response)
    }

    pub fn register(
        &self,
        role: Role,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse, ApiError> {
        let response = self
            .http
            .post(self.url(role.endpoint()))
            .json(request)
            .send()?
            .json::<RegistrationResponse>()?;
        Ok(response)
    }

    pub fn start_conversation(&self, professional_id: u64) -> Result<ConversationId, ApiError> {
        let response = self
            .http
            .post(self.url(START_CONVERSATION_ENDPOINT))
            .json(&StartConversationRequest { professional_id })
            .send()?
            .json::<StartConversationResponse>()?;
        let conversation = response.into_result()?;
        log::info!("started conversation {conversation} with professional {professional_id}");
        Ok(conversation)
    }

    /// Queries shorter than three characters clear the results without a request.
    pub fn search_professionals(&self, query: &str) -> Result<Vec<ProfessionalSummary>, ApiError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        let response = self
            .http
            .get(self.url(SEARCH_ENDPOINT))
            .query(&[("query", query)])
            .send()?
            .json::<SearchResponse>()?;
        Ok(response.professionals)
    }
}

impl FileUploader for ApiClient {
    fn upload(
        &mut self,
        file: &SelectedFile,
        bytes: Vec<u8>,
        conversation: ConversationId,
    ) -> Result<UploadResponse, UploadError> {
        self.upload_file(file, bytes, conversation)
            .map_err(|err| UploadError::Network(err.to_string()))
    }
}
