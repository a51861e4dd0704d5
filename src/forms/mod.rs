//! Client-side form checks. Every check works on raw field values so it can
//! run on each change and again at submit.

pub mod availability;
pub mod files;
pub mod registration;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Date,
    StartTime,
    EndTime,
    StartDate,
    EndDate,
    BulkStartTime,
    BulkEndTime,
    ConfirmPassword,
    ProfilePhoto,
    Certificates,
    Attachment,
}

impl Field {
    /// Form input id the field is rendered under.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::StartTime => "startTime",
            Field::EndTime => "endTime",
            Field::StartDate => "startDate",
            Field::EndDate => "endDate",
            Field::BulkStartTime => "bulkStartTime",
            Field::BulkEndTime => "bulkEndTime",
            Field::ConfirmPassword => "confirmPassword",
            Field::ProfilePhoto => "profilePhoto",
            Field::Certificates => "certificates",
            Field::Attachment => "attachment",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed check. Form-level failures carry no field.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: Option<Field>,
    pub message: String,
}

impl ValidationError {
    pub fn field(field: Field, message: impl Into<String>) -> Self {
        Self {
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn form(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Inline error state: which fields are flagged invalid and what they show.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors {
    fields: BTreeMap<Field, String>,
    form: Option<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one check outcome for `field`; a pass clears the field.
    pub fn record(&mut self, field: Field, outcome: &Result<(), ValidationError>) -> bool {
        match outcome {
            Ok(()) => {
                self.fields.remove(&field);
                true
            }
            Err(error) => {
                self.fields.insert(field, error.message.clone());
                false
            }
        }
    }

    pub fn set_form_error(&mut self, message: impl Into<String>) {
        self.form = Some(message.into());
    }

    pub fn clear_form_error(&mut self) {
        self.form = None;
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form.as_deref()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_invalid(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_none()
    }

    pub fn invalid_fields(&self) -> impl Iterator<Item = (Field, &str)> {
        self.fields
            .iter()
            .map(|(field, message)| (*field, message.as_str()))
    }

    /// Clears everything, as when the form's dialog closes.
    pub fn reset(&mut self) {
        self.fields.clear();
        self.form = None;
    }
}
