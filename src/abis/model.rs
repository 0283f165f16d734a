/*!
 * Proxy ABIS wire types and expectations
 */

use crate::envelope::Gallery;
use crate::error::{ErrorCode, FailureReason};
use crate::expectation::Keyed;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SET_EXPECTATION: ErrorCode = ErrorCode {
    code: "MOS-MABIS-007",
    message: "Invalid set expectation",
};

pub const INVALID_CONFIGURATION: ErrorCode = ErrorCode {
    code: "MOS-MABIS-010",
    message: "Invalid configure",
};

pub const RETURN_SUCCESS: u8 = 1;
pub const RETURN_FAILURE: u8 = 2;

/// Programmed interference with Insert or Identify requests.
///
/// Keyed by the request reference ID or by the hash of one of its templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbisExpectation {
    pub id: String,
    pub version: String,
    pub requesttime: Option<String>,
    /// `Insert` or `Identify`
    pub action_to_interfere: String,
    /// `Error`, `Duplicate` or `Success` (default)
    pub forced_response: String,
    /// Failure reason reported when `forced_response` is `Error`
    pub error_code: String,
    /// Seconds, as a string
    pub delay_in_execution: String,
    pub gallery: Gallery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Insert,
    Identify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedResponse {
    Error,
    Duplicate,
    Success,
}

impl AbisExpectation {
    pub fn interferes_with(&self, action: Action) -> bool {
        let name = match action {
            Action::Insert => "Insert",
            Action::Identify => "Identify",
        };
        self.action_to_interfere.trim().eq_ignore_ascii_case(name)
    }

    pub fn forced(&self) -> ForcedResponse {
        let forced = self.forced_response.trim();
        if forced.eq_ignore_ascii_case("Error") {
            ForcedResponse::Error
        } else if forced.eq_ignore_ascii_case("Duplicate") {
            ForcedResponse::Duplicate
        } else {
            ForcedResponse::Success
        }
    }

    /// Unparsable delays count as no delay
    pub fn delay_secs(&self) -> u64 {
        self.delay_in_execution.trim().parse().unwrap_or(0)
    }

    pub fn failure_reason(&self) -> FailureReason {
        match self.error_code.trim() {
            "" => FailureReason::InternalErrorUnknown,
            code => FailureReason::Forced(code.to_string()),
        }
    }
}

impl Keyed for AbisExpectation {
    fn key(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsertRequest {
    pub id: String,
    pub version: String,
    pub request_id: String,
    pub requesttime: String,
    pub reference_id: String,
    #[serde(rename = "referenceURL")]
    pub reference_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentifyRequest {
    pub id: String,
    pub version: String,
    pub request_id: String,
    pub requesttime: String,
    pub reference_id: String,
    #[serde(rename = "referenceURL", alias = "referenceUrl", skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Gallery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteRequest {
    pub id: String,
    pub version: String,
    pub request_id: String,
    pub requesttime: String,
    pub reference_id: String,
}

/// Acknowledgement of a completed insert or delete
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbisResponse {
    pub id: String,
    pub request_id: String,
    pub responsetime: String,
    pub return_value: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub id: String,
    pub request_id: String,
    pub responsetime: String,
    pub return_value: u8,
    pub failure_reason: FailureReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub confidence: u32,
    pub internal_score: u32,
    pub key1: String,
    pub key2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modality {
    pub biometric_type: String,
    pub analytics: Analytics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub reference_id: String,
    pub analytics: Analytics,
    pub modalities: Vec<Modality>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateList {
    pub count: usize,
    pub candidates: Vec<Candidate>,
}

impl From<Vec<Candidate>> for CandidateList {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self {
            count: candidates.len(),
            candidates,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResponse {
    pub id: String,
    pub request_id: String,
    pub responsetime: String,
    pub return_value: u8,
    pub candidate_list: CandidateList,
    pub analytics: Analytics,
}

/// Any payload the ABIS mock delivers
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AbisReply {
    Done(AbisResponse),
    Identified(IdentifyResponse),
    Failed(FailureResponse),
}

impl AbisReply {
    pub fn is_failure(&self) -> bool {
        matches!(self, AbisReply::Failed(_))
    }
}

/// `GET/POST /abis/config/configure` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureDto {
    pub find_duplicate: Option<bool>,
}
