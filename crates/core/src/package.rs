//! Package and tag names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a package name.
pub const MAX_PACKAGE_NAME_LEN: usize = 214;

/// Maximum length of a tag name.
pub const MAX_TAG_NAME_LEN: usize = 64;

/// A lowercase package name.
///
/// Names are case-folded on parse, so `Foo` and `foo` address the same
/// package. Allowed characters are `[a-z0-9._-]`, and a name may not start
/// with `.` or `_`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Parse and case-fold a package name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(crate::Error::InvalidPackageName(
                "name cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_PACKAGE_NAME_LEN {
            return Err(crate::Error::InvalidPackageName(format!(
                "name exceeds {MAX_PACKAGE_NAME_LEN} characters"
            )));
        }
        if name.starts_with('.') || name.starts_with('_') {
            return Err(crate::Error::InvalidPackageName(
                "name cannot start with '.' or '_'".to_string(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')))
        {
            return Err(crate::Error::InvalidPackageName(format!(
                "invalid character '{c}'"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageName({})", self.0)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PackageName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<PackageName> for String {
    fn from(value: PackageName) -> Self {
        value.0
    }
}

/// A case-folded tag name.
///
/// Tag names share the version lookup namespace: resolving a key tries it as
/// a literal version first, so a tag spelled like a semantic version could
/// never be reached and is rejected.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// The mandatory tag every live package carries.
    pub const LATEST: &'static str = "latest";

    /// Parse and case-fold a tag name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(crate::Error::InvalidTagName(
                "tag cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_TAG_NAME_LEN {
            return Err(crate::Error::InvalidTagName(format!(
                "tag exceeds {MAX_TAG_NAME_LEN} characters"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')))
        {
            return Err(crate::Error::InvalidTagName(format!(
                "invalid character '{c}'"
            )));
        }
        if semver::Version::parse(&name).is_ok() {
            return Err(crate::Error::InvalidTagName(format!(
                "'{name}' is a version, not a tag"
            )));
        }
        Ok(Self(name))
    }

    /// The `latest` tag.
    pub fn latest() -> Self {
        Self(Self::LATEST.to_string())
    }

    pub fn is_latest(&self) -> bool {
        self.0 == Self::LATEST
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagName({})", self.0)
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TagName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<TagName> for String {
    fn from(value: TagName) -> Self {
        value.0
    }
}
