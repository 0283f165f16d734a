/*!
 * Capture Profiles
 * `<profile_dir>/<profile>/<sub-sample>.iso` files supply captured templates
 */

use super::session::{CaptureError, SampleSource};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub struct ProfileSource {
    root: PathBuf,
}

impl ProfileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Templates of one named profile. Names that would leave the profile
    /// root (`..`, separators, absolute paths) are refused.
    pub fn profile(&self, name: &str) -> Result<ProfileDirectory, CaptureError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(dir)), None) if dir == name => Ok(ProfileDirectory {
                dir: self.root.join(dir),
            }),
            _ => Err(CaptureError::InvalidProfile(name.to_string())),
        }
    }
}

pub struct ProfileDirectory {
    dir: PathBuf,
}

impl ProfileDirectory {
    pub fn path_of(&self, sample: &str) -> PathBuf {
        self.dir.join(format!("{sample}.iso"))
    }
}

impl SampleSource for ProfileDirectory {
    /// A missing or unreadable file means the sample is not produced
    fn sample(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.path_of(name);
        match std::fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No profile template");
                None
            }
        }
    }
}
