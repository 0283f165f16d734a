/*!
 * Mock SBI capture sessions
 *
 * A session is initialised for one modality and captures its sub-samples
 * from the templates of a named profile.
 */

pub mod profile;
pub mod routes;
pub mod session;

pub use profile::ProfileSource;
pub use session::{CaptureError, CaptureSession, Modality, SessionRegistry};

/// Sessions plus the profile templates they capture from
pub struct CaptureService {
    pub sessions: SessionRegistry,
    pub profiles: ProfileSource,
    pub default_profile: String,
}

impl CaptureService {
    pub fn new(profiles: ProfileSource, default_profile: impl Into<String>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            profiles,
            default_profile: default_profile.into(),
        }
    }
}
