//! Color profile inspection of raw image bytes.

use super::ColorSpace;
use super::header::declared_color_space;
use crate::imaging::codec::{DecodeError, open_decoder};
use image::metadata::Orientation;
use image::{ImageDecoder, ImageFormat};

/// What an encoded image says about its own colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProfile {
    pub format: ImageFormat,
    pub color_space: ColorSpace,
    /// Embedded ICC profile, if any.
    pub icc_profile: Option<Vec<u8>>,
    /// EXIF orientation. Re-encoding drops the EXIF block, so this is the
    /// only record of it once an image has been normalized.
    pub orientation: Orientation,
}

impl ColorProfile {
    pub fn has_icc_profile(&self) -> bool {
        self.icc_profile.is_some()
    }

    /// Description tag of the embedded profile, when it parses.
    pub fn icc_description(&self) -> Option<String> {
        let icc = self.icc_profile.as_deref()?;
        let profile = lcms2::Profile::new_icc(icc).ok()?;
        profile.info(lcms2::InfoType::Description, lcms2::Locale::none())
    }
}

/// Read the declared color space and embedded ICC profile without decoding
/// pixel data.
pub fn inspect(raw: &[u8]) -> Result<ColorProfile, DecodeError> {
    let (format, mut decoder) = open_decoder(raw)?;
    let icc_profile = decoder
        .icc_profile()
        .map_err(|source| DecodeError::Malformed { format, source })?
        .filter(|icc| !icc.is_empty());
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);

    let color_space = declared_color_space(raw).unwrap_or_else(|| {
        if decoder.color_type().has_color() {
            ColorSpace::Srgb
        } else {
            ColorSpace::Gray
        }
    });

    Ok(ColorProfile {
        format,
        color_space,
        icc_profile,
        orientation,
    })
}
