use std::io;
use std::path::Path;

use crate::forms::{Field, ValidationError};

pub const MIB: u64 = 1024 * 1024;

pub const INVALID_ATTACHMENT: &str = "Invalid file type or size";
pub const PROFILE_PHOTO_TOO_LARGE: &str = "Profile photo size cannot exceed 5MB";
pub const PROFILE_PHOTO_WRONG_TYPE: &str = "Only JPEG and PNG images are allowed for profile photo";

const JPEG: &str = "image/jpeg";
const PNG: &str = "image/png";
const GIF: &str = "image/gif";
const PDF: &str = "application/pdf";

/// What a file input knows about the chosen file before it is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub size: u64,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    pub fn load(path: &Path) -> io::Result<(Self, Vec<u8>)> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type_for(&name).to_string();
        let file = Self::new(name, content_type, bytes.len() as u64);
        Ok((file, bytes))
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => JPEG,
        "png" => PNG,
        "gif" => GIF,
        "pdf" => PDF,
        _ => "application/octet-stream",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileRule {
    ChatAttachment,
    ProfilePhoto,
    Certificate,
}

impl FileRule {
    pub fn allowed_types(self) -> &'static [&'static str] {
        match self {
            FileRule::ChatAttachment => &[JPEG, PNG, GIF, PDF],
            FileRule::ProfilePhoto => &[JPEG, PNG],
            FileRule::Certificate => &[PDF, JPEG, PNG],
        }
    }

    pub fn max_size(self) -> u64 {
        match self {
            FileRule::ProfilePhoto => 5 * MIB,
            FileRule::ChatAttachment | FileRule::Certificate => 10 * MIB,
        }
    }

    pub fn field(self) -> Field {
        match self {
            FileRule::ChatAttachment => Field::Attachment,
            FileRule::ProfilePhoto => Field::ProfilePhoto,
            FileRule::Certificate => Field::Certificates,
        }
    }

    pub fn accepts_type(self, content_type: &str) -> bool {
        self.allowed_types().contains(&content_type)
    }

    /// Size is checked before type, so an oversized file of the wrong type reports its size.
    pub fn check(self, file: &SelectedFile) -> Result<(), ValidationError> {
        let too_large = file.size > self.max_size();
        let wrong_type = !self.accepts_type(&file.content_type);
        let message = match self {
            FileRule::ChatAttachment if too_large || wrong_type => INVALID_ATTACHMENT.to_string(),
            FileRule::ProfilePhoto if too_large => PROFILE_PHOTO_TOO_LARGE.to_string(),
            FileRule::ProfilePhoto if wrong_type => PROFILE_PHOTO_WRONG_TYPE.to_string(),
            FileRule::Certificate if too_large => {
                format!("Certificate file \"{}\" size cannot exceed 10MB", file.name)
            }
            FileRule::Certificate if wrong_type => {
                format!("File \"{}\" must be PDF, JPEG, or PNG", file.name)
            }
            _ => return Ok(()),
        };
        Err(ValidationError::field(self.field(), message))
    }
}

/// Checks a multi-file certificate selection, stopping at the first bad file.
pub fn check_certificates(files: &[SelectedFile]) -> Result<(), ValidationError> {
    files
        .iter()
        .try_for_each(|file| FileRule::Certificate.check(file))
}
