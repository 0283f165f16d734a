/*!
 * Proxy ABIS Service
 * Insert, identify and delete over the biometric store, with programmed
 * expectations able to force errors, duplicates and delays
 */

use super::model::*;
use super::store::{BiometricRecord, BiometricSegment, BiometricStore, DuplicateMatch};
use super::template::TemplateSource;
use crate::config::AbisConfig;
use crate::delivery::Destination;
use crate::envelope::{self, Gallery, Operation};
use crate::error::FailureReason;
use crate::expectation::ExpectationStore;
use crate::scheduler::{DeliveryHandle, DeliveryScheduler};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Modalities reported for candidates forced through a `Duplicate` expectation
const FORCED_MODALITIES: [&str; 3] = ["FACE", "FINGER", "IRIS"];

/// A reply and the delay before it is delivered
#[derive(Debug, Clone)]
pub struct AbisOutcome {
    pub reply: AbisReply,
    pub delay_secs: u64,
}

impl AbisOutcome {
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.reply)
    }
}

/// Why a request failed, and how long to hold the failure back
#[derive(Debug, Clone, PartialEq, Eq)]
struct AbisFailure {
    reason: FailureReason,
    delay_secs: u64,
}

impl From<FailureReason> for AbisFailure {
    fn from(reason: FailureReason) -> Self {
        Self {
            reason,
            delay_secs: 0,
        }
    }
}

pub struct AbisService {
    expectations: ExpectationStore<AbisExpectation>,
    biometrics: BiometricStore,
    templates: Arc<dyn TemplateSource>,
    scheduler: Arc<DeliveryScheduler>,
    destination: Destination,
    find_duplicate: AtomicBool,
    force_duplicate: bool,
    response_delay_secs: u64,
    analytics: Analytics,
}

impl AbisService {
    pub fn new(
        config: &AbisConfig,
        templates: Arc<dyn TemplateSource>,
        scheduler: Arc<DeliveryScheduler>,
    ) -> Self {
        Self {
            expectations: ExpectationStore::new(),
            biometrics: BiometricStore::new(),
            templates,
            scheduler,
            destination: config.destination(),
            find_duplicate: AtomicBool::new(config.find_duplicate),
            force_duplicate: config.force_duplicate,
            response_delay_secs: config.response_delay_secs,
            analytics: Analytics {
                confidence: config.analytics.confidence,
                internal_score: config.analytics.internal_score,
                key1: config.analytics.key1.clone(),
                key2: config.analytics.key2.clone(),
            },
        }
    }

    pub fn expectations(&self) -> &ExpectationStore<AbisExpectation> {
        &self.expectations
    }

    pub fn biometrics(&self) -> &BiometricStore {
        &self.biometrics
    }

    pub fn find_duplicate(&self) -> bool {
        self.find_duplicate.load(Ordering::Relaxed)
    }

    pub fn set_find_duplicate(&self, enabled: bool) {
        self.find_duplicate.store(enabled, Ordering::Relaxed);
        info!(find_duplicate = enabled, "Configuration updated");
    }

    /// Handle a raw listener body. Anything that is not a JSON object is
    /// answered with an `InvalidRequestStructure` failure.
    pub async fn on_body(&self, body: &[u8]) -> (AbisOutcome, Option<DeliveryHandle>) {
        self.wait_response_delay().await;
        let outcome = match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(raw) => self.handle_message(&raw).await,
            Err(e) => {
                warn!(error = %e, "Listener body is not a JSON object");
                failure(&Map::new(), FailureReason::InvalidRequestStructure, 0)
            }
        };
        let handle = self.deliver(&outcome);
        (outcome, handle)
    }

    /// Handle an envelope from the message listener and schedule its reply.
    ///
    /// Processing starts only after the configured response delay.
    pub async fn on_message(&self, raw: &Map<String, Value>) -> (AbisOutcome, Option<DeliveryHandle>) {
        self.wait_response_delay().await;
        let outcome = self.handle_message(raw).await;
        let handle = self.deliver(&outcome);
        (outcome, handle)
    }

    async fn wait_response_delay(&self) {
        if self.response_delay_secs > 0 {
            debug!(delay_secs = self.response_delay_secs, "Holding listener message");
            tokio::time::sleep(Duration::from_secs(self.response_delay_secs)).await;
        }
    }

    /// Dispatch on the envelope `id`
    pub async fn handle_message(&self, raw: &Map<String, Value>) -> AbisOutcome {
        match envelope::operation_of(raw) {
            Some(Operation::AbisInsert) => self.insert(raw).await,
            Some(Operation::AbisIdentify) => self.identify(raw),
            Some(Operation::AbisDelete) => self.delete(raw),
            _ => {
                warn!(id = ?raw.get("id"), "Message with unknown id");
                failure(raw, FailureReason::InvalidId, 0)
            }
        }
    }

    /// Schedule delivery of `outcome` to the outbound destination.
    pub fn deliver(&self, outcome: &AbisOutcome) -> Option<DeliveryHandle> {
        match outcome.payload() {
            Ok(payload) => Some(self.scheduler.schedule(
                payload,
                outcome.delay_secs,
                self.destination.clone(),
            )),
            Err(e) => {
                error!(error = %e, "Failed to serialize ABIS reply");
                None
            }
        }
    }

    pub async fn insert(&self, raw: &Map<String, Value>) -> AbisOutcome {
        if let Err(reason) = envelope::validate(raw, Operation::AbisInsert) {
            return failure(raw, reason, 0);
        }
        let request: InsertRequest = match decode(raw) {
            Ok(request) => request,
            Err(reason) => return failure(raw, reason, 0),
        };

        match self.try_insert(&request).await {
            Ok(delay_secs) => AbisOutcome {
                reply: AbisReply::Done(AbisResponse {
                    id: request.id,
                    request_id: request.request_id,
                    responsetime: envelope::utc_now(),
                    return_value: RETURN_SUCCESS,
                }),
                delay_secs,
            },
            Err(AbisFailure { reason, delay_secs }) => failure(raw, reason, delay_secs),
        }
    }

    async fn try_insert(&self, request: &InsertRequest) -> Result<u64, AbisFailure> {
        if self.biometrics.contains(&request.reference_id) {
            warn!(reference_id = %request.reference_id, "Reference ID already exists");
            return Err(FailureReason::ReferenceIdAlreadyExists.into());
        }

        let templates = self.templates.fetch(&request.reference_url).await?;
        let segments: Vec<BiometricSegment> = templates
            .iter()
            .map(|t| BiometricSegment {
                modality: t.modality.clone(),
                subtype: t.subtype.clone(),
                template_hash: t.digest(),
            })
            .collect();

        let expectation = self.matching_expectation(
            Action::Insert,
            &request.reference_id,
            segments.iter().map(|s| s.template_hash.as_str()),
        );
        let delay_secs = expectation.as_ref().map_or(0, AbisExpectation::delay_secs);

        if let Some(expectation) = expectation {
            if expectation.forced() == ForcedResponse::Error {
                return Err(AbisFailure {
                    reason: expectation.failure_reason(),
                    delay_secs,
                });
            }
        }

        self.biometrics
            .insert(BiometricRecord {
                reference_id: request.reference_id.clone(),
                request_id: request.request_id.clone(),
                inserted_at: envelope::utc_now(),
                segments,
            })
            .map_err(|reason| AbisFailure { reason, delay_secs })?;

        info!(reference_id = %request.reference_id, "Inserted biometrics");
        Ok(delay_secs)
    }

    pub fn identify(&self, raw: &Map<String, Value>) -> AbisOutcome {
        if let Err(reason) = envelope::validate(raw, Operation::AbisIdentify) {
            return failure(raw, reason, 0);
        }
        let request: IdentifyRequest = match decode(raw) {
            Ok(request) => request,
            Err(reason) => return failure(raw, reason, 0),
        };

        match self.try_identify(&request) {
            Ok((candidate_list, delay_secs)) => AbisOutcome {
                reply: AbisReply::Identified(IdentifyResponse {
                    id: request.id,
                    request_id: request.request_id,
                    responsetime: envelope::utc_now(),
                    return_value: RETURN_SUCCESS,
                    candidate_list,
                    analytics: Analytics::default(),
                }),
                delay_secs,
            },
            Err(AbisFailure { reason, delay_secs }) => failure(raw, reason, delay_secs),
        }
    }

    fn try_identify(&self, request: &IdentifyRequest) -> Result<(CandidateList, u64), AbisFailure> {
        let reference_id = request.reference_id.as_str();
        let hashes = self.biometrics.hashes_of(reference_id);

        if let Some(expectation) =
            self.matching_expectation(Action::Identify, reference_id, hashes.iter().map(String::as_str))
        {
            let delay_secs = expectation.delay_secs();
            info!(reference_id, expectation = %expectation.id, "Identify expectation matched");
            return match expectation.forced() {
                ForcedResponse::Error => Err(AbisFailure {
                    reason: expectation.failure_reason(),
                    delay_secs,
                }),
                ForcedResponse::Duplicate => Ok((self.forced_candidates(&expectation.gallery), delay_secs)),
                ForcedResponse::Success => Ok((CandidateList::default(), delay_secs)),
            };
        }

        let duplicates = match request.gallery.as_ref().filter(|g| g.is_usable()) {
            Some(gallery) => {
                let ids: Vec<String> = gallery.ids().map(str::to_string).collect();
                self.biometrics.duplicates_of(reference_id, Some(&ids))
            }
            None if self.force_duplicate || self.find_duplicate() => {
                self.biometrics.duplicates_of(reference_id, None)
            }
            None => Vec::new(),
        };

        info!(reference_id, duplicates = duplicates.len(), "Duplicate search complete");
        Ok((self.candidates(duplicates), 0))
    }

    pub fn delete(&self, raw: &Map<String, Value>) -> AbisOutcome {
        if let Err(reason) = envelope::validate(raw, Operation::AbisDelete) {
            return failure(raw, reason, 0);
        }
        let request: DeleteRequest = match decode(raw) {
            Ok(request) => request,
            Err(reason) => return failure(raw, reason, 0),
        };

        if self.biometrics.delete(&request.reference_id).is_none() {
            warn!(reference_id = %request.reference_id, "Delete of unknown reference ID");
            return failure(raw, FailureReason::ReferenceIdNotFound, 0);
        }

        info!(reference_id = %request.reference_id, "Deleted biometrics");
        AbisOutcome {
            reply: AbisReply::Done(AbisResponse {
                id: request.id,
                request_id: request.request_id,
                responsetime: envelope::utc_now(),
                return_value: RETURN_SUCCESS,
            }),
            delay_secs: 0,
        }
    }

    /// First expectation for `action`, keyed by the reference ID, then by
    /// each template hash in order.
    fn matching_expectation<'a>(
        &self,
        action: Action,
        reference_id: &'a str,
        hashes: impl IntoIterator<Item = &'a str>,
    ) -> Option<AbisExpectation> {
        std::iter::once(reference_id)
            .chain(hashes)
            .filter_map(|key| self.expectations.lookup(key))
            .find(|e| e.interferes_with(action))
    }

    fn forced_candidates(&self, gallery: &Gallery) -> CandidateList {
        let modalities: Vec<Modality> = FORCED_MODALITIES
            .iter()
            .map(|m| Modality {
                biometric_type: m.to_string(),
                analytics: self.analytics.clone(),
            })
            .collect();

        gallery
            .ids()
            .filter(|id| !id.trim().is_empty())
            .map(|id| Candidate {
                reference_id: id.to_string(),
                analytics: self.analytics.clone(),
                modalities: modalities.clone(),
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn candidates(&self, duplicates: Vec<DuplicateMatch>) -> CandidateList {
        duplicates
            .into_iter()
            .map(|d| Candidate {
                reference_id: d.reference_id,
                analytics: self.analytics.clone(),
                modalities: d
                    .segments
                    .into_iter()
                    .map(|s| Modality {
                        biometric_type: s.modality,
                        analytics: self.analytics.clone(),
                    })
                    .collect(),
            })
            .collect::<Vec<_>>()
            .into()
    }
}

fn decode<T: DeserializeOwned>(raw: &Map<String, Value>) -> Result<T, FailureReason> {
    serde_json::from_value(Value::Object(raw.clone())).map_err(|e| {
        warn!(error = %e, "Envelope does not match request structure");
        FailureReason::InvalidRequestStructure
    })
}

fn failure(raw: &Map<String, Value>, reason: FailureReason, delay_secs: u64) -> AbisOutcome {
    warn!(reason = reason.code(), %reason, "ABIS request failed");
    AbisOutcome {
        reply: AbisReply::Failed(FailureResponse {
            id: envelope::text(raw, "id").unwrap_or_default().to_string(),
            request_id: envelope::text(raw, "requestId").unwrap_or_default().to_string(),
            responsetime: envelope::utc_now(),
            return_value: RETURN_FAILURE,
            failure_reason: reason,
        }),
        delay_secs,
    }
}
