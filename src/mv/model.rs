/*!
 * Mock MV wire types
 */

use crate::decision::DecisionOverride;
use crate::envelope::Gallery;
use crate::error::ErrorCode;
use crate::expectation::Keyed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CONFIGURE: ErrorCode = ErrorCode {
    code: "MOS-MMV-001",
    message: "Exception while configuration",
};

pub const SET_EXPECTATION: ErrorCode = ErrorCode {
    code: "MOS-MMV-003",
    message: "Exception while setting expectation",
};

/// Programmed decision for one registration ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MvExpectation {
    pub rid: String,
    /// `APPROVED` / `REJECTED`; empty falls back to the default decision
    pub mock_mv_decision: String,
    pub delay_in_response: u64,
}

impl Keyed for MvExpectation {
    fn key(&self) -> &str {
        &self.rid
    }
}

impl DecisionOverride for MvExpectation {
    fn forced_decision(&self) -> Option<&str> {
        Some(&self.mock_mv_decision)
    }

    fn delay_secs(&self) -> u64 {
        self.delay_in_response
    }
}

/// `/mv/config/configureMockMv` body. The field name is spelled as the
/// registration processor tooling sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureMvDto {
    #[serde(rename = "mockMvDescision")]
    pub mock_mv_decision: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualAdjudicationRequest {
    pub id: String,
    pub version: String,
    pub request_id: String,
    pub reference_id: String,
    pub requesttime: String,
    #[serde(rename = "referenceURL")]
    pub reference_url: String,
    pub gallery: Gallery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAdjudicationResponse {
    pub id: String,
    pub request_id: String,
    pub responsetime: String,
    pub return_value: u8,
    pub candidate_list: MvCandidateList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvCandidateList {
    pub count: usize,
    pub analytics: BTreeMap<String, String>,
    pub candidates: Vec<MvCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvCandidate {
    pub reference_id: String,
    pub analytics: OperatorAnalytics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorAnalytics {
    #[serde(rename = "primaryOperatorID")]
    pub primary_operator_id: String,
    #[serde(rename = "primaryOperatorComments")]
    pub primary_operator_comments: String,
    #[serde(rename = "secondaryOperatorID")]
    pub secondary_operator_id: String,
    #[serde(rename = "secondaryOperatorComments")]
    pub secondary_operator_comments: String,
    pub analytics: BTreeMap<String, String>,
}

/// Synchronous acknowledgement of an accepted request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvAck {
    pub request_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvErrorDetail {
    pub error_code: String,
    pub message: String,
}

/// Returned with HTTP 200 when the request envelope is rejected
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvErrorResponse {
    pub id: String,
    pub request_id: String,
    pub responsetime: String,
    pub errors: Vec<MvErrorDetail>,
}
