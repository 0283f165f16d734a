/*!
 * Capture Sessions
 * Per-session capture state for one modality, kept in an explicit registry
 */

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

const FINGER_SAMPLES: &[&str] = &[
    "Left IndexFinger",
    "Left MiddleFinger",
    "Left RingFinger",
    "Left LittleFinger",
    "Right IndexFinger",
    "Right MiddleFinger",
    "Right RingFinger",
    "Right LittleFinger",
    "Left Thumb",
    "Right Thumb",
];

const IRIS_SAMPLES: &[&str] = &["Left", "Right"];

const FACE_SAMPLES: &[&str] = &["Face"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    Finger,
    Iris,
    Face,
}

impl Modality {
    /// Sub-sample names, in capture order
    pub fn samples(self) -> &'static [&'static str] {
        match self {
            Modality::Finger => FINGER_SAMPLES,
            Modality::Iris => IRIS_SAMPLES,
            Modality::Face => FACE_SAMPLES,
        }
    }

    pub fn has_sample(self, name: &str) -> bool {
        self.samples().contains(&name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture session not found: {0}")]
    SessionNotFound(String),

    #[error("{sample} is not a {modality:?} sub-sample")]
    UnknownSample { modality: Modality, sample: String },

    /// Profile names must be a single plain directory name
    #[error("Invalid capture profile: {0}")]
    InvalidProfile(String),
}

/// Provides the raw template for a sub-sample, if the profile has one
pub trait SampleSource {
    fn sample(&self, name: &str) -> Option<Vec<u8>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleState {
    pub captured: bool,
    /// Base64url template; absent for exceptions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub modality: Modality,
    pub profile: String,
    pub samples: BTreeMap<String, SampleState>,
    pub exceptions: BTreeSet<String>,
    /// Set once any expected sample is captured; never cleared
    pub completed: bool,
}

impl CaptureSession {
    pub fn new(
        modality: Modality,
        profile: impl Into<String>,
        exceptions: impl IntoIterator<Item = String>,
    ) -> Result<Self, CaptureError> {
        let exceptions: BTreeSet<String> = exceptions.into_iter().collect();
        if let Some(unknown) = exceptions.iter().find(|e| !modality.has_sample(e)) {
            return Err(CaptureError::UnknownSample {
                modality,
                sample: unknown.clone(),
            });
        }

        Ok(Self {
            modality,
            profile: profile.into(),
            samples: modality
                .samples()
                .iter()
                .map(|name| (name.to_string(), SampleState::default()))
                .collect(),
            exceptions,
            completed: false,
        })
    }

    /// Capture `requested` sub-samples (all when empty) from `source`.
    ///
    /// Returns the names captured by this call. Excepted samples are marked
    /// captured without a value; already captured samples are left alone.
    pub fn capture(
        &mut self,
        requested: &[String],
        score: f32,
        source: &dyn SampleSource,
    ) -> Result<Vec<String>, CaptureError> {
        let names: Vec<String> = if requested.is_empty() {
            self.modality.samples().iter().map(|s| s.to_string()).collect()
        } else {
            if let Some(unknown) = requested.iter().find(|r| !self.modality.has_sample(r)) {
                return Err(CaptureError::UnknownSample {
                    modality: self.modality,
                    sample: unknown.clone(),
                });
            }
            requested.to_vec()
        };

        let mut captured = Vec::new();
        for name in names {
            let excepted = self.exceptions.contains(&name);
            let Some(state) = self.samples.get_mut(&name) else {
                continue;
            };
            if state.captured {
                continue;
            }

            if excepted {
                state.captured = true;
                continue;
            }

            if let Some(data) = source.sample(&name) {
                state.captured = true;
                state.value = Some(URL_SAFE_NO_PAD.encode(data));
                state.score = Some(score);
                captured.push(name);
            }
        }

        if !captured.is_empty() {
            self.completed = true;
        }
        Ok(captured)
    }
}

/// Session ID -> capture session
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, CaptureSession>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        format!("session-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Create or replace the session under `id`
    pub fn init(&self, id: impl Into<String>, session: CaptureSession) {
        self.sessions.insert(id.into(), session);
    }

    pub fn get(&self, id: &str) -> Option<CaptureSession> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn capture(
        &self,
        id: &str,
        requested: &[String],
        score: f32,
        source: &dyn SampleSource,
    ) -> Result<(Vec<String>, CaptureSession), CaptureError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| CaptureError::SessionNotFound(id.to_string()))?;
        let captured = session.capture(requested, score, source)?;
        Ok((captured, session.value().clone()))
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
