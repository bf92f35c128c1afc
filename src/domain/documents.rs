//! Document identifiers and the file names derived from them.

use std::fmt;
use std::path::{Component, Path};

use serde_json::Value;

use super::error::DomainError;

const SOURCE_EXTENSION: &str = "psd";
const ARTIFACT_SUFFIX: &str = "_output.jpg";

/// Identifier of a design document inside the configured document directory.
///
/// Always a single plain path component, so every derived path stays inside
/// the directory it is joined onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PsdId(String);

impl PsdId {
    /// Parse an identifier from a request value.
    ///
    /// Strings are taken verbatim and numbers are rendered in decimal; every
    /// other JSON type is rejected.
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let raw = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            _ => {
                return Err(DomainError::validation(
                    "psd_id",
                    "expected a string or number",
                ));
            }
        };
        Self::parse(raw)
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DomainError::validation("psd_id", "must not be empty"));
        }
        if raw.contains(['/', '\\', '\0']) {
            return Err(DomainError::validation(
                "psd_id",
                "must not contain path separators",
            ));
        }

        let mut components = Path::new(&raw).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(Self(raw)),
            _ => Err(DomainError::validation(
                "psd_id",
                "must be a plain file name",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the source document, e.g. `1.psd`.
    pub fn source_file_name(&self) -> String {
        format!("{}.{SOURCE_EXTENSION}", self.0)
    }

    /// File name of the exported JPEG, e.g. `1_output.jpg`.
    pub fn artifact_file_name(&self) -> String {
        format!("{}{ARTIFACT_SUFFIX}", self.0)
    }
}

impl fmt::Display for PsdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_source_and_artifact_names() {
        let id = PsdId::parse("banner-01").expect("valid id");
        assert_eq!(id.source_file_name(), "banner-01.psd");
        assert_eq!(id.artifact_file_name(), "banner-01_output.jpg");
    }

    #[test]
    fn numbers_are_rendered_in_decimal() {
        let id = PsdId::from_value(&json!(42)).expect("numeric id");
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn rejects_non_scalar_values() {
        for value in [json!(null), json!(true), json!(["1"]), json!({ "id": 1 })] {
            assert!(PsdId::from_value(&value).is_err(), "accepted {value}");
        }
    }

    #[test]
    fn rejects_identifiers_that_escape_the_directory() {
        for raw in ["", ".", "..", "../secret", "nested/file", "nested\\file"] {
            assert!(PsdId::parse(raw).is_err(), "accepted {raw:?}");
        }
    }
}
