//! Semantic versions and publish manifests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A validated semantic version.
///
/// The canonical string form is what the store keys versions by.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(semver::Version);

impl Version {
    /// Parse a semantic version string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        semver::Version::parse(s.trim())
            .map(Self)
            .map_err(|e| crate::Error::InvalidVersion(format!("'{s}': {e}")))
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Version {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.0.to_string()
    }
}

/// The `package` document sent with a publish.
///
/// The raw JSON is kept verbatim and stored opaque; only the fields the
/// registry itself acts on are lifted out.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    version: Version,
    description: Option<String>,
    main: Option<String>,
    raw: Value,
}

impl Manifest {
    /// Parse a manifest from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let raw: Value = serde_json::from_slice(bytes)
            .map_err(|e| crate::Error::InvalidManifest(format!("not valid JSON: {e}")))?;
        Self::from_value(raw)
    }

    /// Build a manifest from an already-parsed JSON document.
    pub fn from_value(raw: Value) -> crate::Result<Self> {
        let object = raw
            .as_object()
            .ok_or_else(|| crate::Error::InvalidManifest("expected a JSON object".to_string()))?;

        let version = match object.get("version") {
            Some(Value::String(v)) => Version::parse(v)?,
            Some(_) => {
                return Err(crate::Error::InvalidManifest(
                    "'version' must be a string".to_string(),
                ));
            }
            None => {
                return Err(crate::Error::InvalidManifest(
                    "missing 'version'".to_string(),
                ));
            }
        };

        let description = object
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let main = object
            .get("main")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            version,
            description,
            main,
            raw,
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Entry point file inside the artifact, if declared.
    pub fn main(&self) -> Option<&str> {
        self.main.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("1.2.3-beta.1+build.5").unwrap();
        assert_eq!(v.to_string(), "1.2.3-beta.1+build.5");
        assert!(Version::parse(" 1.0.0 ").is_ok());
    }

    #[test]
    fn test_version_rejects_invalid() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.0").is_err());
        assert!(Version::parse("v1.0.0").is_err());
        assert!(Version::parse("latest").is_err());
    }

    #[test]
    fn test_manifest_extracts_fields() {
        let manifest = Manifest::from_value(json!({
            "version": "0.3.0",
            "description": "Tiny theme",
            "main": "dist/theme.css",
            "keywords": ["css"]
        }))
        .unwrap();

        assert_eq!(manifest.version().to_string(), "0.3.0");
        assert_eq!(manifest.description(), Some("Tiny theme"));
        assert_eq!(manifest.main(), Some("dist/theme.css"));
        assert_eq!(manifest.raw()["keywords"][0], "css");
    }

    #[test]
    fn test_manifest_requires_version() {
        let err = Manifest::from_value(json!({ "description": "x" })).unwrap_err();
        assert!(err.to_string().contains("missing 'version'"));

        assert!(Manifest::from_value(json!({ "version": 1 })).is_err());
        assert!(Manifest::from_value(json!({ "version": "one" })).is_err());
        assert!(Manifest::from_value(json!(["1.0.0"])).is_err());
    }

    #[test]
    fn test_manifest_from_slice_rejects_garbage() {
        let err = Manifest::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, crate::Error::InvalidManifest(_)));
    }
}
