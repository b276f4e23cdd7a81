//! sRGB normalization of raw image bytes.
//!
//! An image is converted when its declared color space is not sRGB **or** it
//! carries an embedded ICC profile. Either condition alone is enough: viewers
//! honor an embedded profile over the declared space, so the presence of one
//! means the pixel values cannot be trusted as sRGB. The only embedded profile
//! that does not trigger conversion is the reference profile itself, which is
//! what this module writes; that makes normalization a fixed point.
//!
//! Conversion runs in three steps:
//!
//! 1. The reference profile becomes the image's profile tag and the transform
//!    target.
//! 2. Pixels are transformed into it with Little CMS. The source profile is
//!    the embedded one when it matches the decoded layout (RGB or gray), and
//!    the built-in sRGB profile otherwise. Alpha is carried over untouched.
//! 3. The result is re-encoded into the input's container with the reference
//!    profile embedded.
//!
//! Images that need no conversion come back borrowed, byte for byte.

use super::inspect::{ColorProfile, inspect};
use super::reference::ReferenceProfile;
use super::Intent;
use crate::imaging::codec::{
    DecodeError, EncodeError, EncodeOptions, ImageCodec, RustCodec, encode_pixels,
};
use crate::imaging::params::Quality;
use image::{ColorType, DynamicImage, ImageBuffer, Rgb, RgbImage, Rgba};
use lcms2::{ColorSpaceSignature, PixelFormat, Profile, Transform};
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info_span};

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("color conversion failed: {0}")]
    Convert(String),
    #[error("re-encoding normalized image failed: {0}")]
    Encode(#[from] EncodeError),
}

/// Converts raw images into the reference sRGB space.
///
/// Holds only shared read-only state, so one normalizer serves any number of
/// concurrent invocations.
#[derive(Debug, Clone)]
pub struct ColorNormalizer {
    reference: Arc<ReferenceProfile>,
    intent: Intent,
    quality: Quality,
}

impl ColorNormalizer {
    pub fn new(reference: Arc<ReferenceProfile>) -> Self {
        Self {
            reference,
            intent: Intent::default(),
            quality: Quality::new(95),
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    /// Quality used when the re-encode is lossy.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn reference(&self) -> &ReferenceProfile {
        &self.reference
    }

    /// Whether `profile` must be converted before pixel work.
    pub fn needs_conversion(&self, profile: &ColorProfile) -> bool {
        let foreign_profile = profile
            .icc_profile
            .as_deref()
            .is_some_and(|icc| icc != self.reference.icc());
        !profile.color_space.is_canonical() || foreign_profile
    }

    /// Return `raw` in the reference color space, unchanged when it already is.
    pub fn normalize<'a>(&self, raw: &'a [u8]) -> Result<Cow<'a, [u8]>, NormalizeError> {
        self.normalize_inspected(raw).map(|(bytes, _)| bytes)
    }

    /// [`normalize`](Self::normalize), also returning the source's
    /// [`ColorProfile`].
    ///
    /// Converted bytes carry no EXIF block, so callers that decode them take
    /// the orientation from the returned profile.
    pub fn normalize_inspected<'a>(
        &self,
        raw: &'a [u8],
    ) -> Result<(Cow<'a, [u8]>, ColorProfile), NormalizeError> {
        let profile = inspect(raw)?;
        if !self.needs_conversion(&profile) {
            debug!(format = ?profile.format, "color already canonical, skipping normalization");
            return Ok((Cow::Borrowed(raw), profile));
        }

        let _span = info_span!(
            "normalize",
            format = ?profile.format,
            color_space = %profile.color_space,
            embedded_icc = profile.has_icc_profile(),
        )
        .entered();

        // 1. Reference profile is both the new tag and the transform target
        let target = self.reference.to_lcms().map_err(NormalizeError::Convert)?;

        // 2. Pixel conversion
        let decoded = RustCodec::new().decode(raw)?;
        let source_icc = profile.icc_profile.as_deref();
        let converted = convert_pixels(&decoded.pixels, source_icc, &target, self.intent)?;

        // 3. Commit back into the same container
        let bytes = encode_pixels(
            &converted,
            &EncodeOptions {
                format: profile.format,
                quality: self.quality,
                icc_profile: Some(self.reference.icc()),
            },
        )?;
        debug!(
            input_bytes = raw.len(),
            output_bytes = bytes.len(),
            "normalized to reference sRGB"
        );
        Ok((Cow::Owned(bytes), profile))
    }
}

/// Which profile the decoded pixels are actually in.
enum Source<'a> {
    Rgb(&'a Profile),
    Gray(&'a Profile),
}

fn convert_pixels(
    img: &DynamicImage,
    source_icc: Option<&[u8]>,
    target: &Profile,
    intent: Intent,
) -> Result<DynamicImage, NormalizeError> {
    let embedded = source_icc
        .map(|icc| Profile::new_icc(icc).map_err(|e| DecodeError::Profile(e.to_string())))
        .transpose()?;
    let fallback = Profile::new_srgb();

    let color = img.color();
    let source = match &embedded {
        Some(p) if p.color_space() == ColorSpaceSignature::RgbData && color.has_color() => {
            Source::Rgb(p)
        }
        Some(p) if p.color_space() == ColorSpaceSignature::GrayData && !color.has_color() => {
            Source::Gray(p)
        }
        Some(p) if p.color_space() == ColorSpaceSignature::CmykData => {
            debug!(
                "CMYK profile ignored: decoder already produced RGB pixels, converting from sRGB"
            );
            Source::Rgb(&fallback)
        }
        Some(p) => {
            debug!(
                profile_space = ?p.color_space(),
                "embedded profile does not match decoded pixels, assuming sRGB"
            );
            Source::Rgb(&fallback)
        }
        None => Source::Rgb(&fallback),
    };

    let intent: lcms2::Intent = intent.into();
    let (width, height) = (img.width(), img.height());
    let alpha = color.has_alpha();

    let converted = if is_high_depth(color) {
        let rgb: Vec<[u16; 3]> = match source {
            Source::Rgb(src) => {
                let input = img.to_rgb16();
                run_transform(
                    bytemuck::cast_slice::<u16, [u16; 3]>(input.as_raw()),
                    src,
                    PixelFormat::RGB_16,
                    target,
                    PixelFormat::RGB_16,
                    intent,
                )?
            }
            Source::Gray(src) => {
                let input = img.to_luma16();
                run_transform(
                    bytemuck::cast_slice::<u16, [u16; 1]>(input.as_raw()),
                    src,
                    PixelFormat::GRAY_16,
                    target,
                    PixelFormat::RGB_16,
                    intent,
                )?
            }
        };
        if alpha {
            let alpha_channel = img.to_rgba16();
            let data = rgb
                .iter()
                .zip(alpha_channel.pixels())
                .flat_map(|(c, a)| [c[0], c[1], c[2], a.0[3]])
                .collect();
            ImageBuffer::<Rgba<u16>, Vec<u16>>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgba16)
        } else {
            let data = rgb.into_iter().flatten().collect();
            ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(width, height, data)
                .map(DynamicImage::ImageRgb16)
        }
    } else {
        let rgb: Vec<[u8; 3]> = match source {
            Source::Rgb(src) => {
                let input = img.to_rgb8();
                run_transform(
                    bytemuck::cast_slice::<u8, [u8; 3]>(input.as_raw()),
                    src,
                    PixelFormat::RGB_8,
                    target,
                    PixelFormat::RGB_8,
                    intent,
                )?
            }
            Source::Gray(src) => {
                let input = img.to_luma8();
                run_transform(
                    bytemuck::cast_slice::<u8, [u8; 1]>(input.as_raw()),
                    src,
                    PixelFormat::GRAY_8,
                    target,
                    PixelFormat::RGB_8,
                    intent,
                )?
            }
        };
        if alpha {
            let alpha_channel = img.to_rgba8();
            let data = rgb
                .iter()
                .zip(alpha_channel.pixels())
                .flat_map(|(c, a)| [c[0], c[1], c[2], a.0[3]])
                .collect();
            image::RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
        } else {
            let data = rgb.into_iter().flatten().collect();
            RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
    };

    converted.ok_or_else(|| NormalizeError::Convert("pixel buffer size mismatch".into()))
}

fn run_transform<I, O>(
    input: &[I],
    source: &Profile,
    in_format: PixelFormat,
    target: &Profile,
    out_format: PixelFormat,
    intent: lcms2::Intent,
) -> Result<Vec<O>, NormalizeError>
where
    I: Copy + bytemuck::Pod,
    O: Copy + Default + bytemuck::Pod,
{
    let transform = Transform::<I, O>::new(source, in_format, target, out_format, intent)
        .map_err(|e| NormalizeError::Convert(e.to_string()))?;
    let mut output = vec![O::default(); input.len()];
    transform.transform_pixels(input, &mut output);
    Ok(output)
}

fn is_high_depth(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L16
            | ColorType::La16
            | ColorType::Rgb16
            | ColorType::Rgba16
            | ColorType::Rgb32F
            | ColorType::Rgba32F
    )
}
