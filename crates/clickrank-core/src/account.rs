//! Administrative account creation requests

use std::fmt;

use serde::Deserialize;

use crate::{ClickrankError, ClickrankResult};

/// Raw account-creation request as received from the administrative endpoint
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl NewUserRequest {
    /// Check that every field is present and non-blank.
    ///
    /// Fields are checked in order email, password, display name; the first
    /// missing one is reported.
    pub fn validate(self) -> ClickrankResult<NewUser> {
        let email = required(self.email, "email")?;
        let password = required(self.password, "password")?;
        let display_name = required(self.display_name, "displayName")?;
        Ok(NewUser {
            email,
            password,
            display_name,
        })
    }
}

impl fmt::Debug for NewUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUserRequest")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("display_name", &self.display_name)
            .finish()
    }
}

fn required(value: Option<String>, field: &'static str) -> ClickrankResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ClickrankError::MissingField(field)),
    }
}

/// Validated account-creation request
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}
