use serde::{Deserialize, Serialize};

use crate::forms::{Field, FieldErrors, ValidationError};

pub const PASSWORD_MISMATCH: &str = "Passwords do not match!";
pub const REGISTERED: &str = "Registration successful! Please login.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Client,
    Professional,
}

impl Role {
    pub fn endpoint(self) -> &'static str {
        match self {
            Role::Client => "/api/auth/client/register",
            Role::Professional => "/api/auth/professional/register",
        }
    }

    /// The professional form lives under a path naming the role.
    pub fn from_page_path(path: &str) -> Self {
        if path.contains("professional") {
            Role::Professional
        } else {
            Role::Client
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub role: Role,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RegistrationResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RegistrationResponse {
    /// A `message` means the account exists; otherwise the server's error text.
    pub fn outcome(&self) -> Result<&str, String> {
        if self.message.is_some() {
            return Ok(REGISTERED);
        }
        let reason = self.error.as_deref().unwrap_or("unexpected response");
        Err(format!("Registration failed: {reason}"))
    }
}

impl RegistrationForm {
    pub fn check_passwords(&self) -> Result<(), ValidationError> {
        if self.password != self.confirm_password {
            return Err(ValidationError::field(Field::ConfirmPassword, PASSWORD_MISMATCH));
        }
        Ok(())
    }

    /// Validates and builds the body to post. The confirmation never leaves the form.
    pub fn prepare(&self, errors: &mut FieldErrors) -> Result<RegistrationRequest, ValidationError> {
        let passwords = self.check_passwords();
        errors.record(Field::ConfirmPassword, &passwords);
        passwords?;
        Ok(RegistrationRequest {
            full_name: self.full_name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }
}
