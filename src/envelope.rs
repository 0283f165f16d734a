/*!
 * Request Envelope Validation
 * Straight-line checks over the raw inbound JSON; the first failing check
 * decides the single reason reported back
 */

use crate::error::FailureReason;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub const ABIS_INSERT: &str = "mosip.abis.insert";
pub const ABIS_IDENTIFY: &str = "mosip.abis.identify";
pub const ABIS_DELETE: &str = "mosip.abis.delete";
pub const MV_ADJUDICATE: &str = "mosip.manual.adjudication.adjudicate";

const TAG_ID: &str = "id";
const TAG_VERSION: &str = "version";
const TAG_REQUEST_ID: &str = "requestId";
const TAG_REQUEST_TIME: &str = "requesttime";
const TAG_REFERENCE_ID: &str = "referenceId";
const TAG_REFERENCE_URL: &str = "referenceURL";

const INSERT_KEYS: &[&str] = &[
    TAG_ID,
    TAG_VERSION,
    TAG_REQUEST_ID,
    TAG_REQUEST_TIME,
    TAG_REFERENCE_ID,
    TAG_REFERENCE_URL,
];

const IDENTIFY_KEYS: &[&str] = &[
    TAG_ID,
    TAG_VERSION,
    TAG_REQUEST_ID,
    TAG_REQUEST_TIME,
    TAG_REFERENCE_ID,
    TAG_REFERENCE_URL,
    "gallery",
    "flags",
];

/// Protocol operation named by an envelope's `id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AbisInsert,
    AbisIdentify,
    AbisDelete,
    MvAdjudicate,
}

impl Operation {
    pub fn literal(self) -> &'static str {
        match self {
            Operation::AbisInsert => ABIS_INSERT,
            Operation::AbisIdentify => ABIS_IDENTIFY,
            Operation::AbisDelete => ABIS_DELETE,
            Operation::MvAdjudicate => MV_ADJUDICATE,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        [
            Operation::AbisInsert,
            Operation::AbisIdentify,
            Operation::AbisDelete,
            Operation::MvAdjudicate,
        ]
        .into_iter()
        .find(|op| op.literal().eq_ignore_ascii_case(id.trim()))
    }

    fn allowed_keys(self) -> Option<&'static [&'static str]> {
        match self {
            Operation::AbisInsert => Some(INSERT_KEYS),
            Operation::AbisIdentify => Some(IDENTIFY_KEYS),
            Operation::AbisDelete | Operation::MvAdjudicate => None,
        }
    }
}

/// Operation named by the envelope, if any
pub fn operation_of(raw: &Map<String, Value>) -> Option<Operation> {
    text(raw, TAG_ID).and_then(Operation::from_id)
}

/// Validate `raw` as an envelope for `operation`.
///
/// Order: id, version, requestId, requesttime (presence, then format),
/// referenceId, referenceURL (insert), unexpected keys (insert/identify).
pub fn validate(raw: &Map<String, Value>, operation: Operation) -> Result<(), FailureReason> {
    match text(raw, TAG_ID) {
        Some(id) if id.eq_ignore_ascii_case(operation.literal()) => {}
        _ => return Err(FailureReason::InvalidId),
    }

    match text(raw, TAG_VERSION) {
        Some(version) if version_pattern().is_match(version) => {}
        _ => return Err(FailureReason::InvalidVersion),
    }

    if text(raw, TAG_REQUEST_ID).is_none() {
        return Err(FailureReason::MissingRequestId);
    }

    let requesttime = text(raw, TAG_REQUEST_TIME).ok_or(FailureReason::MissingRequestTime)?;
    if DateTime::parse_from_rfc3339(requesttime).is_err() {
        return Err(FailureReason::InvalidRequestTimeFormat);
    }

    if text(raw, TAG_REFERENCE_ID).is_none() {
        return Err(FailureReason::MissingReferenceId);
    }

    if operation == Operation::AbisInsert && text(raw, TAG_REFERENCE_URL).is_none() {
        return Err(FailureReason::MissingReferenceUrl);
    }

    if let Some(allowed) = operation.allowed_keys() {
        if raw.keys().any(|key| !allowed.contains(&key.as_str())) {
            return Err(FailureReason::InvalidRequestStructure);
        }
    }

    Ok(())
}

/// Non-blank string field
pub fn text<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+\.\d$").expect("version pattern compiles"))
}

/// Response timestamp, UTC with millisecond precision
pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Candidate reference IDs a request is checked against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    #[serde(default)]
    pub reference_ids: Vec<ReferenceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceId {
    #[serde(default)]
    pub reference_id: String,
}

impl Gallery {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.reference_ids.iter().map(|r| r.reference_id.as_str())
    }

    /// True when the gallery names at least one non-blank reference ID first
    pub fn is_usable(&self) -> bool {
        self.reference_ids
            .first()
            .is_some_and(|r| !r.reference_id.trim().is_empty())
    }
}

impl<S: Into<String>> FromIterator<S> for Gallery {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            reference_ids: iter
                .into_iter()
                .map(|id| ReferenceId {
                    reference_id: id.into(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn insert() -> Map<String, Value> {
        envelope(json!({
            "id": "mosip.abis.insert",
            "version": "1.1",
            "requestId": "r1",
            "requesttime": "2024-04-22T10:00:00Z",
            "referenceId": "ref1",
            "referenceURL": "http://datashare/ref1"
        }))
    }

    #[test]
    fn valid_insert_passes() {
        assert_eq!(validate(&insert(), Operation::AbisInsert), Ok(()));
    }

    #[test]
    fn minimal_identify_passes() {
        let raw = envelope(json!({
            "id": "mosip.abis.identify",
            "version": "1.1",
            "requestId": "r1",
            "requesttime": "2024-04-22T10:00:00Z",
            "referenceId": "ref1"
        }));
        assert_eq!(validate(&raw, Operation::AbisIdentify), Ok(()));
    }

    #[test]
    fn missing_request_id_is_reported_specifically() {
        let mut raw = insert();
        raw.remove("requestId");
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::MissingRequestId)
        );
    }

    #[test]
    fn first_failure_wins() {
        // Bad id and missing requestId: id is checked first
        let mut raw = insert();
        raw.insert("id".to_string(), json!("mosip.abis.other"));
        raw.remove("requestId");
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::InvalidId)
        );

        // Bad version and missing referenceId: version first
        let mut raw = insert();
        raw.insert("version".to_string(), json!("v1"));
        raw.remove("referenceId");
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::InvalidVersion)
        );
    }

    #[test]
    fn version_pattern_is_enforced() {
        for bad in ["1", "1.10", "a.b", "1.1.1", ""] {
            let mut raw = insert();
            raw.insert("version".to_string(), json!(bad));
            assert_eq!(
                validate(&raw, Operation::AbisInsert),
                Err(FailureReason::InvalidVersion),
                "version {bad:?}"
            );
        }

        let mut raw = insert();
        raw.insert("version".to_string(), json!("10.2"));
        assert_eq!(validate(&raw, Operation::AbisInsert), Ok(()));
    }

    #[test]
    fn requesttime_presence_then_format() {
        let mut raw = insert();
        raw.insert("requesttime".to_string(), json!("  "));
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::MissingRequestTime)
        );

        raw.insert("requesttime".to_string(), json!("2024-04-22 10:00:00"));
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::InvalidRequestTimeFormat)
        );

        raw.insert("requesttime".to_string(), json!("2024-04-22T10:00:00.123Z"));
        assert_eq!(validate(&raw, Operation::AbisInsert), Ok(()));
    }

    #[test]
    fn missing_reference_id_is_reported_before_reference_url() {
        let mut raw = insert();
        raw.remove("referenceId");
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::MissingReferenceId)
        );

        raw.insert("referenceId".to_string(), json!("   "));
        raw.remove("referenceURL");
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::MissingReferenceId)
        );
        assert_eq!(FailureReason::MissingReferenceId.code(), "5");

        let mut raw = insert();
        raw.remove("referenceId");
        raw.insert("id".to_string(), json!("mosip.abis.identify"));
        raw.remove("referenceURL");
        assert_eq!(
            validate(&raw, Operation::AbisIdentify),
            Err(FailureReason::MissingReferenceId)
        );
    }

    #[test]
    fn insert_requires_reference_url() {
        let mut raw = insert();
        raw.remove("referenceURL");
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::MissingReferenceUrl)
        );

        // Delete envelopes carry no referenceURL
        raw.insert("id".to_string(), json!(ABIS_DELETE));
        assert_eq!(validate(&raw, Operation::AbisDelete), Ok(()));
    }

    #[test]
    fn unexpected_keys_fail_structure_check() {
        let mut raw = insert();
        raw.insert("gallery".to_string(), json!({ "referenceIds": [] }));
        assert_eq!(
            validate(&raw, Operation::AbisInsert),
            Err(FailureReason::InvalidRequestStructure)
        );
    }

    #[test]
    fn operation_lookup_ignores_case() {
        let raw = envelope(json!({ "id": "MOSIP.ABIS.IDENTIFY" }));
        assert_eq!(operation_of(&raw), Some(Operation::AbisIdentify));
        assert_eq!(operation_of(&envelope(json!({ "id": "x" }))), None);
    }

    #[test]
    fn gallery_usability() {
        let gallery: Gallery = ["", "ref-2"].into_iter().collect();
        assert!(!gallery.is_usable());

        let gallery: Gallery = ["ref-1"].into_iter().collect();
        assert!(gallery.is_usable());
        assert_eq!(gallery.ids().collect::<Vec<_>>(), vec!["ref-1"]);
        assert!(!Gallery::default().is_usable());
    }
}
