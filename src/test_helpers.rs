//! Shared test utilities for the glidekit test suite.
//!
//! Provides synthetic images (with and without embedded ICC profiles),
//! synthetic profiles built with Little CMS, and a recording manipulator for
//! asserting chain behavior.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = gradient_jpeg(64, 48, Some(&wide_gamut_icc()));
//! let profile = crate::color::inspect(&jpeg).unwrap();
//! assert!(profile.has_icc_profile());
//! ```

use crate::imaging::codec::{DecodedImage, EncodeOptions, encode_pixels};
use crate::imaging::manipulator::{ManipulationError, Manipulator, Stage, stage_fn};
use crate::imaging::params::{ParameterSet, Quality};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use lcms2::{CIExyY, CIExyYTRIPLE, ColorSpaceSignature, Profile, ToneCurve};
use std::sync::{Arc, Mutex};

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

fn encode(pixels: &DynamicImage, format: ImageFormat, icc: Option<&[u8]>) -> Vec<u8> {
    encode_pixels(
        pixels,
        &EncodeOptions {
            format,
            quality: Quality::new(95),
            icc_profile: icc,
        },
    )
    .unwrap()
}

/// RGB gradient JPEG, optionally tagged with `icc`.
pub fn gradient_jpeg(width: u32, height: u32, icc: Option<&[u8]>) -> Vec<u8> {
    encode(
        &DynamicImage::ImageRgb8(gradient(width, height)),
        ImageFormat::Jpeg,
        icc,
    )
}

/// RGB gradient PNG, optionally tagged with `icc`.
pub fn gradient_png(width: u32, height: u32, icc: Option<&[u8]>) -> Vec<u8> {
    encode(
        &DynamicImage::ImageRgb8(gradient(width, height)),
        ImageFormat::Png,
        icc,
    )
}

/// RGBA gradient PNG whose alpha ramps from left to right.
pub fn gradient_png_rgba(width: u32, height: u32, icc: Option<&[u8]>) -> Vec<u8> {
    let rgb = gradient(width, height);
    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Rgba([r, g, b, (x * 255 / width.max(1)) as u8])
    });
    encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png, icc)
}

fn gray_ramp(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width.max(1)) as u8]))
}

/// Single-channel JPEG, optionally tagged with `icc`.
pub fn gray_jpeg(width: u32, height: u32, icc: Option<&[u8]>) -> Vec<u8> {
    encode(
        &DynamicImage::ImageLuma8(gray_ramp(width, height)),
        ImageFormat::Jpeg,
        icc,
    )
}

/// Single-channel PNG without a profile.
pub fn gray_png(width: u32, height: u32) -> Vec<u8> {
    encode(
        &DynamicImage::ImageLuma8(gray_ramp(width, height)),
        ImageFormat::Png,
        None,
    )
}

/// Insert an APP1 Exif segment carrying only `orientation` (1-8) right after
/// the JPEG SOI marker.
pub fn with_exif_orientation(jpeg: Vec<u8>, orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");
    let mut payload = b"Exif\0\0".to_vec();
    // Big-endian TIFF header, first IFD at offset 8
    payload.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    // One entry: tag 0x0112 (Orientation), SHORT, count 1, value
    payload.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00]);
    // No next IFD
    payload.extend_from_slice(&[0x00; 4]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Decoded mid-gray RGB image.
pub fn solid_image(width: u32, height: u32) -> DecodedImage {
    DecodedImage::new(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 120, 120]))),
        ImageFormat::Png,
    )
}

// =========================================================================
// Synthetic profiles
// =========================================================================

fn xy(x: f64, y: f64) -> CIExyY {
    CIExyY { x, y, Y: 1.0 }
}

/// Linear-gamma RGB profile with BT.2020 primaries.
///
/// Far enough from sRGB that converting visibly changes pixel values.
pub fn wide_gamut_icc() -> Vec<u8> {
    let primaries = CIExyYTRIPLE {
        Red: xy(0.708, 0.292),
        Green: xy(0.170, 0.797),
        Blue: xy(0.131, 0.046),
    };
    let linear = ToneCurve::new(1.0);
    Profile::new_rgb(&xy(0.3127, 0.3290), &primaries, &[&linear, &linear, &linear])
        .unwrap()
        .icc()
        .unwrap()
}

/// Gamma 2.2 gray profile with a D50 white point.
pub fn gray_icc() -> Vec<u8> {
    let gamma = ToneCurve::new(2.2);
    Profile::new_gray(&xy(0.3457, 0.3585), &gamma)
        .unwrap()
        .icc()
        .unwrap()
}

/// CMYK ink-limiting device link. Its color space is CMYK, which is all a
/// tag on RGB pixels needs to take the CMYK fallback path.
pub fn cmyk_icc() -> Vec<u8> {
    Profile::ink_limiting(ColorSpaceSignature::CmykData, 300.0)
        .unwrap()
        .icc()
        .unwrap()
}

// =========================================================================
// Recording manipulator
// =========================================================================

/// What a [`RecordingManipulator`] does when run.
#[derive(Debug, Clone, Copy)]
pub enum StepBehavior {
    /// Return the image unchanged.
    Pass,
    /// Replace the image with a new one of this size.
    Resize(u32, u32),
    /// Fail with [`ManipulationError::Failed`].
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedStep {
    SetParams { name: String, params: usize },
    Run { name: String, width: u32, height: u32 },
}

/// Manipulator that records every bind and run into a shared log.
/// Uses Mutex (not RefCell) so it is Sync like real manipulators.
pub struct RecordingManipulator {
    name: String,
    behavior: StepBehavior,
    log: Arc<Mutex<Vec<RecordedStep>>>,
}

impl RecordingManipulator {
    pub fn new(name: &str, behavior: StepBehavior, log: Arc<Mutex<Vec<RecordedStep>>>) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            log,
        }
    }
}

impl Manipulator for RecordingManipulator {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        self.log.lock().unwrap().push(RecordedStep::SetParams {
            name: self.name.clone(),
            params: params.len(),
        });
        let name = self.name.clone();
        let behavior = self.behavior;
        let log = Arc::clone(&self.log);
        Ok(stage_fn(move |image| {
            log.lock().unwrap().push(RecordedStep::Run {
                name: name.clone(),
                width: image.width(),
                height: image.height(),
            });
            match behavior {
                StepBehavior::Pass => Ok(image),
                StepBehavior::Resize(w, h) => {
                    Ok(image.map(|p| p.resize_exact(w, h, FilterType::Nearest)))
                }
                StepBehavior::Fail => Err(ManipulationError::Failed {
                    stage: name.clone(),
                    message: "recorded failure".to_string(),
                }),
            }
        }))
    }
}
