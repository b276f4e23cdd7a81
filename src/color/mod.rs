//! Color-space normalization.
//!
//! Every image entering the pipeline is brought into one canonical space,
//! sRGB as described by the reference profile, before any manipulator touches
//! its pixels.
//!
//! The module is split into:
//! - **Header**: declared color space straight from JPEG/PNG headers
//! - **Inspect**: [`ColorProfile`] of raw bytes (declared space + embedded ICC)
//! - **Reference**: the process-wide [`ReferenceProfile`]
//! - **Normalize**: [`ColorNormalizer`], the conditional convert-and-re-encode step

mod header;
pub mod inspect;
pub mod normalize;
pub mod reference;

pub use inspect::{ColorProfile, inspect};
pub use normalize::{ColorNormalizer, NormalizeError};
pub use reference::{ProfileLoadError, ReferenceProfile};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Color space an image declares in its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// The canonical space.
    Srgb,
    Gray,
    Cmyk,
    /// Adobe-transformed CMYK in JPEG.
    Ycck,
}

impl ColorSpace {
    pub fn is_canonical(self) -> bool {
        self == ColorSpace::Srgb
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorSpace::Srgb => "sRGB",
            ColorSpace::Gray => "Gray",
            ColorSpace::Cmyk => "CMYK",
            ColorSpace::Ycck => "YCCK",
        })
    }
}

/// Rendering intent for the conversion into the reference profile.
///
/// Determines how out-of-gamut colors are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Compresses the source gamut to fit the destination.
    #[default]
    Perceptual,
    /// Clips out-of-gamut colors, white point mapped to destination white.
    #[serde(alias = "relative_colorimetric")]
    Relative,
    /// Keeps saturation at the expense of hue accuracy.
    Saturation,
    /// Clips out-of-gamut colors without white point adaptation.
    #[serde(alias = "absolute_colorimetric")]
    Absolute,
}

impl From<Intent> for lcms2::Intent {
    fn from(intent: Intent) -> Self {
        match intent {
            Intent::Perceptual => lcms2::Intent::Perceptual,
            Intent::Relative => lcms2::Intent::RelativeColorimetric,
            Intent::Saturation => lcms2::Intent::Saturation,
            Intent::Absolute => lcms2::Intent::AbsoluteColorimetric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_srgb_is_canonical() {
        assert!(ColorSpace::Srgb.is_canonical());
        assert!(!ColorSpace::Gray.is_canonical());
        assert!(!ColorSpace::Cmyk.is_canonical());
        assert!(!ColorSpace::Ycck.is_canonical());
    }

    #[test]
    fn intent_maps_to_lcms() {
        assert_eq!(
            lcms2::Intent::from(Intent::Relative),
            lcms2::Intent::RelativeColorimetric
        );
        assert_eq!(lcms2::Intent::from(Intent::default()), lcms2::Intent::Perceptual);
    }
}
