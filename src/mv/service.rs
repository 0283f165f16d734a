/*!
 * Mock MV Service
 * Resolves a manual adjudication decision per registration ID and delivers
 * the adjudication response after the programmed delay
 */

use super::model::*;
use crate::config::{MvConfig, OperatorConfig};
use crate::decision::{Decision, DecisionResolver, Resolution};
use crate::delivery::Destination;
use crate::envelope::{self, Operation};
use crate::error::FailureReason;
use crate::expectation::ExpectationStore;
use crate::scheduler::{DeliveryHandle, DeliveryScheduler};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const ACCEPTED: &str = "ACCEPTED";

pub struct MvService {
    resolver: DecisionResolver<MvExpectation>,
    scheduler: Arc<DeliveryScheduler>,
    destination: Destination,
    response_id: String,
    operators: OperatorConfig,
}

impl MvService {
    pub fn new(config: &MvConfig, scheduler: Arc<DeliveryScheduler>) -> Self {
        Self {
            resolver: DecisionResolver::new(
                Arc::new(ExpectationStore::new()),
                config.default_decision.clone(),
            ),
            scheduler,
            destination: config.destination(),
            response_id: config.response_id.clone(),
            operators: config.operators.clone(),
        }
    }

    pub fn expectations(&self) -> &ExpectationStore<MvExpectation> {
        self.resolver.expectations()
    }

    pub fn default_decision(&self) -> String {
        self.resolver.default_decision()
    }

    pub fn set_default_decision(&self, decision: impl Into<String>) {
        let decision = decision.into();
        info!(%decision, "Mock MV default decision updated");
        self.resolver.set_default_decision(decision);
    }

    /// `submit` for a raw request body. A body that is not a JSON object is
    /// refused with `InvalidRequestStructure`.
    pub fn submit_body(&self, body: &[u8]) -> Result<(MvAck, Option<DeliveryHandle>), MvErrorResponse> {
        match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(raw) => self.submit(&raw),
            Err(e) => {
                warn!(error = %e, "Manual adjudication body is not a JSON object");
                Err(error_response(&Map::new(), FailureReason::InvalidRequestStructure))
            }
        }
    }

    /// Validate and accept a request; the adjudication response is delivered
    /// after the resolved delay.
    pub fn submit(&self, raw: &Map<String, Value>) -> Result<(MvAck, Option<DeliveryHandle>), MvErrorResponse> {
        let (response, delay_secs) = self
            .adjudicate(raw)
            .map_err(|reason| error_response(raw, reason))?;

        let ack = MvAck {
            request_id: response.request_id.clone(),
            status: ACCEPTED.to_string(),
        };

        let handle = match serde_json::to_value(&response) {
            Ok(payload) => Some(self.scheduler.schedule(payload, delay_secs, self.destination.clone())),
            Err(e) => {
                error!(error = %e, "Failed to serialize adjudication response");
                None
            }
        };

        Ok((ack, handle))
    }

    /// Build the adjudication response for `raw` and its delivery delay
    pub fn adjudicate(&self, raw: &Map<String, Value>) -> Result<(ManualAdjudicationResponse, u64), FailureReason> {
        envelope::validate(raw, Operation::MvAdjudicate)?;
        let request: ManualAdjudicationRequest = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|_| FailureReason::InvalidRequestStructure)?;

        let resolution = self.resolver.resolve(&request.reference_id, request.gallery.ids());
        info!(
            reference_id = %request.reference_id,
            decision = ?resolution.decision,
            delay_secs = resolution.delay_secs,
            "Manual adjudication decided"
        );

        let delay_secs = resolution.delay_secs;
        Ok((self.response(&request, resolution), delay_secs))
    }

    fn response(&self, request: &ManualAdjudicationRequest, resolution: Resolution) -> ManualAdjudicationResponse {
        let candidate_list = match resolution.decision {
            Decision::Accept => MvCandidateList::default(),
            Decision::Reject => {
                let candidates: Vec<MvCandidate> = resolution
                    .candidates
                    .into_iter()
                    .map(|reference_id| MvCandidate {
                        reference_id,
                        analytics: self.operator_analytics(),
                    })
                    .collect();

                MvCandidateList {
                    count: candidates.len(),
                    analytics: BTreeMap::from([
                        ("primaryOperatorID".to_string(), self.operators.primary_id.clone()),
                        (
                            "primaryOperatorComments".to_string(),
                            self.operators.primary_comments.clone(),
                        ),
                    ]),
                    candidates,
                }
            }
        };

        ManualAdjudicationResponse {
            id: self.response_id.clone(),
            request_id: request.request_id.clone(),
            responsetime: envelope::utc_now(),
            return_value: 1,
            candidate_list,
        }
    }

    fn operator_analytics(&self) -> OperatorAnalytics {
        OperatorAnalytics {
            primary_operator_id: self.operators.primary_id.clone(),
            primary_operator_comments: self.operators.primary_comments.clone(),
            secondary_operator_id: self.operators.secondary_id.clone(),
            secondary_operator_comments: self.operators.secondary_comments.clone(),
            analytics: BTreeMap::new(),
        }
    }
}

fn error_response(raw: &Map<String, Value>, reason: FailureReason) -> MvErrorResponse {
    warn!(reason = reason.code(), %reason, "Rejected manual adjudication request");
    MvErrorResponse {
        id: envelope::text(raw, "id").unwrap_or_default().to_string(),
        request_id: envelope::text(raw, "requestId").unwrap_or_default().to_string(),
        responsetime: envelope::utc_now(),
        errors: vec![MvErrorDetail {
            error_code: reason.code().to_string(),
            message: reason.to_string(),
        }],
    }
}
