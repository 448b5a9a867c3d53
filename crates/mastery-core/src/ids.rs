//! Identifier types.
//!
//! `RecordId` is the native identifier used for every entity this crate owns
//! or reads. `StoredId` is how catalog documents reference indicators on
//! disk: historical data holds a mix of native ids and free-form strings,
//! so both shapes are accepted and normalized through [`StoredId::canonical`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MasteryError;

/// Native identifier for students, indicators, resources, and attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier-shaped string, returning `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }

    /// Parse a required request field, naming the field in the error.
    pub fn parse_field(field: &str, value: Option<&str>) -> Result<Self, MasteryError> {
        let raw = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MasteryError::Validation(format!("{field} is required")))?;
        Self::parse(raw).ok_or_else(|| {
            MasteryError::Validation(format!("{field} is not a valid identifier: '{raw}'"))
        })
    }

    /// Parse an optional request field; present-but-malformed is still an error.
    pub fn parse_optional_field(
        field: &str,
        value: Option<&str>,
    ) -> Result<Option<Self>, MasteryError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => Self::parse_field(field, Some(raw)).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = MasteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| MasteryError::Validation(format!("not a valid identifier: '{s}'")))
    }
}

impl From<Uuid> for RecordId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// An indicator reference as persisted in catalog documents.
///
/// Serialized as `{"$id": "<uuid>"}` for native references and as a bare
/// string for legacy text references. The `$id` payload is kept verbatim and
/// only resolved on use, so a malformed one makes a single reference
/// unmatchable rather than the whole document unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredId {
    Native {
        #[serde(rename = "$id")]
        id: String,
    },
    Text(String),
}

impl StoredId {
    pub fn native(id: RecordId) -> Self {
        StoredId::Native { id: id.to_string() }
    }

    pub fn text(s: impl Into<String>) -> Self {
        StoredId::Text(s.into())
    }

    /// Canonical string form used for tolerant comparisons.
    ///
    /// Text that parses as an identifier is re-rendered in native form, so
    /// `" 6F1C...-UPPER "` and `{"$id": "6f1c..."}` compare equal.
    pub fn canonical(&self) -> String {
        let raw = self.raw();
        match RecordId::parse(raw) {
            Some(id) => id.to_string(),
            None => raw.trim().to_lowercase(),
        }
    }

    /// The native id this reference resolves to, if any.
    pub fn resolve(&self) -> Option<RecordId> {
        RecordId::parse(self.raw())
    }

    fn raw(&self) -> &str {
        match self {
            StoredId::Native { id } | StoredId::Text(id) => id,
        }
    }

    /// Both exact encodings a direct lookup for `id` must try.
    pub fn encodings_of(id: RecordId) -> [StoredId; 2] {
        [StoredId::native(id), StoredId::Text(id.to_string())]
    }
}

impl From<RecordId> for StoredId {
    fn from(id: RecordId) -> Self {
        StoredId::native(id)
    }
}

/// Parse a mixed bag of raw identifiers, dropping anything malformed.
pub fn parse_lenient<S: AsRef<str>>(raw: &[S]) -> Vec<RecordId> {
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        match RecordId::parse(value.as_ref()) {
            Some(id) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None => tracing::warn!("dropping malformed identifier '{}'", value.as_ref()),
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_reports_missing_and_malformed() {
        let missing = RecordId::parse_field("student_id", None).unwrap_err();
        assert!(missing.to_string().contains("student_id is required"));

        let blank = RecordId::parse_field("student_id", Some("   ")).unwrap_err();
        assert!(blank.to_string().contains("required"));

        let bad = RecordId::parse_field("student_id", Some("abc")).unwrap_err();
        assert!(bad.to_string().contains("not a valid identifier"));

        let id = RecordId::new();
        let parsed = RecordId::parse_field("student_id", Some(&id.to_string())).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn canonical_forms_agree_across_encodings() {
        let id = RecordId::new();
        let upper = format!("  {}  ", id.to_string().to_uppercase());
        assert_eq!(StoredId::native(id).canonical(), id.to_string());
        assert_eq!(StoredId::text(upper).canonical(), id.to_string());
        assert_eq!(StoredId::text(" Legacy-Code ").canonical(), "legacy-code");
    }

    #[test]
    fn stored_id_serde_shapes() {
        let id = RecordId::new();
        let native = serde_json::to_string(&StoredId::native(id)).unwrap();
        assert_eq!(native, format!("{{\"$id\":\"{id}\"}}"));

        let back: StoredId = serde_json::from_str(&native).unwrap();
        assert_eq!(back, StoredId::native(id));

        let text: StoredId = serde_json::from_str(&format!("\"{id}\"")).unwrap();
        assert_eq!(text, StoredId::Text(id.to_string()));
        assert_eq!(text.resolve(), Some(id));
    }

    #[test]
    fn malformed_native_payload_is_unmatchable_not_fatal() {
        let stored: StoredId = serde_json::from_str(r#"{"$id": "LEGACY-42"}"#).unwrap();
        assert_eq!(stored, StoredId::Native { id: "LEGACY-42".into() });
        assert_eq!(stored.resolve(), None);
        assert_eq!(stored.canonical(), "legacy-42");

        let id = RecordId::new();
        let upper = format!("{{\"$id\": \"{}\"}}", id.to_string().to_uppercase());
        let stored: StoredId = serde_json::from_str(&upper).unwrap();
        assert_eq!(stored.resolve(), Some(id));
        assert_eq!(stored.canonical(), id.to_string());
    }

    #[test]
    fn parse_lenient_drops_malformed_and_duplicates() {
        let a = RecordId::new();
        let raw = vec![a.to_string(), "nope".to_string(), a.to_string(), String::new()];
        assert_eq!(parse_lenient(&raw), vec![a]);
    }
}
