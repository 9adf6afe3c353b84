//! Account identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a username.
pub const MAX_USERNAME_LEN: usize = 64;

/// Maximum length of an email address.
pub const MAX_EMAIL_LEN: usize = 254;

/// A lowercase account name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Parse and case-fold a username.
    ///
    /// Usernames are 1-64 characters of `[a-z0-9_-]` after lowercasing.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(crate::Error::InvalidUsername(
                "username cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_USERNAME_LEN {
            return Err(crate::Error::InvalidUsername(format!(
                "username exceeds {MAX_USERNAME_LEN} characters"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-')))
        {
            return Err(crate::Error::InvalidUsername(format!(
                "invalid character '{c}'"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Username({})", self.0)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// A lowercased email address.
///
/// Only the shape is checked; deliverability is the mailer's concern.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(s: &str) -> crate::Result<Self> {
        let email = s.trim().to_lowercase();
        if email.len() > MAX_EMAIL_LEN {
            return Err(crate::Error::InvalidEmail(format!(
                "email exceeds {MAX_EMAIL_LEN} characters"
            )));
        }
        let Some((local, domain)) = email.split_once('@') else {
            return Err(crate::Error::InvalidEmail("missing '@'".to_string()));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(crate::Error::InvalidEmail(format!("'{email}'")));
        }
        if email.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidEmail(
                "email cannot contain whitespace".to_string(),
            ));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Email({})", self.0)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

/// One-time account verification secret.
///
/// Debug output is redacted so the token cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Generate a fresh token from 32 random bytes, hex-encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Wrap a token received from a client.
    pub fn from_client(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationToken(<redacted>)")
    }
}
