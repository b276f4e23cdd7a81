//! The reference sRGB profile every image is normalized into.
//!
//! Loaded once per process and shared read-only afterwards. The source is
//! either a profile file named in the configuration or, when none is given,
//! Little CMS's built-in sRGB profile serialized to ICC bytes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileLoadError {
    #[error("cannot read reference profile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reference profile {0} is not a valid ICC profile: {1}")]
    Invalid(String, String),
    #[error("reference profile {origin} describes {actual:?} data, expected RGB")]
    NotRgb {
        origin: String,
        actual: lcms2::ColorSpaceSignature,
    },
}

/// Validated ICC bytes of the canonical sRGB profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceProfile {
    icc: Vec<u8>,
    description: String,
}

static GLOBAL: OnceLock<Arc<ReferenceProfile>> = OnceLock::new();

impl ReferenceProfile {
    /// Little CMS's built-in sRGB profile.
    pub fn builtin() -> Result<Self, ProfileLoadError> {
        let icc = lcms2::Profile::new_srgb()
            .icc()
            .map_err(|e| ProfileLoadError::Invalid("built-in sRGB".into(), e.to_string()))?;
        Self::from_icc(icc, "built-in sRGB")
    }

    /// Read a profile file from disk.
    pub fn from_file(path: &Path) -> Result<Self, ProfileLoadError> {
        let icc = std::fs::read(path).map_err(|source| ProfileLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_icc(icc, &path.display().to_string())
    }

    /// Validate raw ICC bytes: they must parse and describe RGB data.
    pub fn from_icc(icc: Vec<u8>, origin: &str) -> Result<Self, ProfileLoadError> {
        let profile = lcms2::Profile::new_icc(&icc)
            .map_err(|e| ProfileLoadError::Invalid(origin.to_string(), e.to_string()))?;
        let actual = profile.color_space();
        if actual != lcms2::ColorSpaceSignature::RgbData {
            return Err(ProfileLoadError::NotRgb {
                origin: origin.to_string(),
                actual,
            });
        }
        let description = profile
            .info(lcms2::InfoType::Description, lcms2::Locale::none())
            .unwrap_or_else(|| origin.to_string());
        Ok(Self { icc, description })
    }

    /// Load from `path`, or the built-in profile when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ProfileLoadError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// The process-wide reference profile, loaded on first call.
    ///
    /// Later calls return the already-loaded profile and ignore `path`.
    pub fn global(path: Option<&Path>) -> Result<Arc<Self>, ProfileLoadError> {
        if let Some(existing) = GLOBAL.get() {
            return Ok(Arc::clone(existing));
        }
        let loaded = Arc::new(Self::load(path)?);
        tracing::info!(profile = %loaded.description, "loaded reference color profile");
        Ok(Arc::clone(GLOBAL.get_or_init(|| loaded)))
    }

    pub fn icc(&self) -> &[u8] {
        &self.icc
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Fresh Little CMS handle for building a transform.
    pub(crate) fn to_lcms(&self) -> Result<lcms2::Profile, String> {
        lcms2::Profile::new_icc(&self.icc).map_err(|e| e.to_string())
    }
}
