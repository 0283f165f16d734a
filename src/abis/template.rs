/*!
 * Template Source
 * Fetches the biometric templates behind an insert's referenceURL
 */

use crate::error::FailureReason;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

/// A decoded template and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiometricTemplate {
    pub modality: String,
    pub subtype: String,
    pub data: Vec<u8>,
}

impl BiometricTemplate {
    /// Lowercase hex SHA-256 of the template bytes
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self, reference_url: &str) -> Result<Vec<BiometricTemplate>, FailureReason>;
}

#[derive(Debug, Deserialize)]
struct TemplateDocument {
    #[serde(default)]
    segments: Vec<TemplateSegment>,
}

#[derive(Debug, Deserialize)]
struct TemplateSegment {
    #[serde(rename = "type")]
    modality: String,
    #[serde(default)]
    subtype: String,
    data: String,
}

/// Decode a `{"segments":[{"type","subtype","data"}]}` document.
pub fn parse_templates(body: &[u8]) -> Result<Vec<BiometricTemplate>, FailureReason> {
    let document: TemplateDocument =
        serde_json::from_slice(body).map_err(|_| FailureReason::InvalidCbeffFormat)?;

    if document.segments.is_empty() {
        return Err(FailureReason::InvalidCbeffFormat);
    }

    document
        .segments
        .into_iter()
        .map(|segment| {
            let data = STANDARD
                .decode(segment.data.trim())
                .map_err(|_| FailureReason::InvalidCbeffFormat)?;
            if data.is_empty() {
                return Err(FailureReason::CbeffHasNoData);
            }
            Ok(BiometricTemplate {
                modality: segment.modality.to_ascii_uppercase(),
                subtype: segment.subtype,
                data,
            })
        })
        .collect()
}

/// GETs the reference URL over HTTP
pub struct HttpTemplateSource {
    http: reqwest::Client,
}

impl HttpTemplateSource {
    /// Fetches slower than `timeout` fail with `UnableToFetchBiometricDetails`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn fetch(&self, reference_url: &str) -> Result<Vec<BiometricTemplate>, FailureReason> {
        debug!(reference_url, "Fetching biometric templates");

        let response = self
            .http
            .get(reference_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(reference_url, error = %e, "Template fetch failed");
                FailureReason::UnableToFetchBiometricDetails
            })?;

        let body = response.bytes().await.map_err(|e| {
            warn!(reference_url, error = %e, "Template body unreadable");
            FailureReason::UnableToFetchBiometricDetails
        })?;

        parse_templates(&body)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use dashmap::DashMap;

    /// In-memory templates keyed by reference URL
    #[derive(Default)]
    pub struct StaticTemplates {
        documents: DashMap<String, Vec<BiometricTemplate>>,
    }

    impl StaticTemplates {
        pub fn with(self, url: &str, templates: &[(&str, &[u8])]) -> Self {
            let templates = templates
                .iter()
                .map(|(modality, data)| BiometricTemplate {
                    modality: modality.to_string(),
                    subtype: String::new(),
                    data: data.to_vec(),
                })
                .collect();
            self.documents.insert(url.to_string(), templates);
            self
        }
    }

    #[async_trait]
    impl TemplateSource for StaticTemplates {
        async fn fetch(&self, reference_url: &str) -> Result<Vec<BiometricTemplate>, FailureReason> {
            self.documents
                .get(reference_url)
                .map(|t| t.value().clone())
                .ok_or(FailureReason::UnableToFetchBiometricDetails)
        }
    }
}
