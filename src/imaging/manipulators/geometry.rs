//! Manipulators that change the pixel grid: orientation, crop, size, flip.

use super::{keyword, number};
use crate::imaging::calculations::{
    apply_device_pixel_ratio, calculate_contain_dimensions, calculate_fill_dimensions,
    center_offset, limit_area, resolve_target_dimensions,
};
use crate::imaging::manipulator::{ManipulationError, Manipulator, Stage, passthrough, stage_fn};
use crate::imaging::params::ParameterSet;
use crate::imaging::registry::ManipulatorLimits;
use image::imageops::FilterType;
use image::metadata::Orientation as ExifOrientation;

/// Largest edge `size` accepts, before `dpr`.
const MAX_EDGE: f64 = 100_000.0;

// =========================================================================
// Orientation
// =========================================================================

/// Applies the EXIF orientation (`or=auto`, also when absent) or rotates
/// counter-clockwise by a fixed angle.
pub struct Orientation;

impl Manipulator for Orientation {
    fn name(&self) -> &str {
        "orientation"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let value = keyword(params, "or").unwrap_or_else(|| "auto".to_string());
        let angle: Option<u16> = match value.as_str() {
            "auto" => None,
            "0" => Some(0),
            "90" => Some(90),
            "180" => Some(180),
            "270" => Some(270),
            _ => {
                return Err(ManipulationError::malformed(
                    self.name(),
                    "or",
                    &value,
                    "auto, 0, 90, 180 or 270",
                ));
            }
        };

        Ok(stage_fn(move |mut image| {
            match angle {
                None => {
                    image.pixels.apply_orientation(image.orientation);
                    image.orientation = ExifOrientation::NoTransforms;
                }
                Some(90) => image.pixels = image.pixels.rotate270(),
                Some(180) => image.pixels = image.pixels.rotate180(),
                Some(270) => image.pixels = image.pixels.rotate90(),
                Some(_) => {}
            }
            Ok(image)
        }))
    }
}

// =========================================================================
// Crop
// =========================================================================

/// Cuts `crop=width,height,x,y` out of the image.
///
/// A rectangle reaching past the right or bottom edge is clipped. An origin
/// outside the image is an error.
pub struct Crop;

impl Manipulator for Crop {
    fn name(&self) -> &str {
        "crop"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let Some(value) = keyword(params, "crop") else {
            return Ok(passthrough());
        };
        let malformed = || {
            ManipulationError::malformed(
                "crop",
                "crop",
                &value,
                "width,height,x,y with positive width and height",
            )
        };
        let parts: Vec<u32> = value
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| malformed())?;
        let [width, height, x, y] = parts[..] else {
            return Err(malformed());
        };
        if width == 0 || height == 0 {
            return Err(malformed());
        }

        Ok(stage_fn(move |image| {
            let (img_w, img_h) = (image.width(), image.height());
            if x >= img_w || y >= img_h {
                return Err(ManipulationError::OutOfBounds {
                    stage: "crop".to_string(),
                    message: format!("origin {x},{y} lies outside the {img_w}x{img_h} image"),
                });
            }
            let w = width.min(img_w - x);
            let h = height.min(img_h - y);
            Ok(image.map(|p| p.crop_imm(x, y, w, h)))
        }))
    }
}

// =========================================================================
// Size
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fit {
    /// Fit inside the box, keeping aspect ratio.
    Contain,
    /// Like `Contain` but never enlarges.
    Max,
    /// Exactly the box, ignoring aspect ratio.
    Stretch,
    /// Cover the box, then center-crop to it.
    Crop,
}

impl Fit {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "contain" => Some(Self::Contain),
            "max" => Some(Self::Max),
            "stretch" => Some(Self::Stretch),
            "crop" => Some(Self::Crop),
            _ => None,
        }
    }
}

/// Resizes to `w`/`h` (aliases `width`/`height`) using the `fit` mode,
/// scaled by `dpr`.
pub struct Size {
    limits: ManipulatorLimits,
}

impl Size {
    pub fn new(limits: ManipulatorLimits) -> Self {
        Self { limits }
    }

    fn edge(
        &self,
        params: &ParameterSet,
        keys: &[&str],
    ) -> Result<Option<u32>, ManipulationError> {
        match params.first_of(keys) {
            Some((key, _)) => Ok(number(self.name(), params, key, 1.0, MAX_EDGE)?
                .map(|n| n.round() as u32)),
            None => Ok(None),
        }
    }
}

impl Manipulator for Size {
    fn name(&self) -> &str {
        "size"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let width = self.edge(params, &["w", "width"])?;
        let height = self.edge(params, &["h", "height"])?;
        let fit = match keyword(params, "fit") {
            Some(value) => Fit::parse(&value).ok_or_else(|| {
                ManipulationError::malformed(
                    self.name(),
                    "fit",
                    &value,
                    "contain, max, stretch or crop",
                )
            })?,
            None => Fit::Contain,
        };
        let dpr = number(self.name(), params, "dpr", 1.0, 8.0)?.unwrap_or(1.0);

        if width.is_none() && height.is_none() {
            return Ok(passthrough());
        }
        let max_pixels = self.limits.max_image_pixels;

        Ok(stage_fn(move |image| {
            let source = (image.width(), image.height());
            let Some(mut target) = resolve_target_dimensions(source, width, height) else {
                return Ok(image);
            };
            target = apply_device_pixel_ratio(target, dpr);
            if let Some(max) = max_pixels {
                let limited = limit_area(target, max);
                if limited != target {
                    tracing::debug!(
                        requested = ?target,
                        limited = ?limited,
                        "size request exceeds max_image_pixels"
                    );
                    target = limited;
                }
            }

            let resized = match fit {
                Fit::Contain => {
                    let (w, h) = calculate_contain_dimensions(source, target);
                    image.map(|p| p.resize_exact(w, h, FilterType::Lanczos3))
                }
                Fit::Max => {
                    if source.0 <= target.0 && source.1 <= target.1 {
                        image
                    } else {
                        let (w, h) = calculate_contain_dimensions(source, target);
                        image.map(|p| p.resize_exact(w, h, FilterType::Lanczos3))
                    }
                }
                Fit::Stretch => {
                    image.map(|p| p.resize_exact(target.0, target.1, FilterType::Lanczos3))
                }
                Fit::Crop => {
                    let fill = calculate_fill_dimensions(source, target);
                    if let Some(max) = max_pixels {
                        let area = fill.0 as u64 * fill.1 as u64;
                        if area > max {
                            return Err(ManipulationError::OutOfBounds {
                                stage: "size".to_string(),
                                message: format!(
                                    "crop fill {}x{} ({area} pixels) exceeds max_image_pixels {max}",
                                    fill.0, fill.1
                                ),
                            });
                        }
                    }
                    let (x, y) = center_offset(fill, target);
                    image.map(|p| {
                        p.resize_exact(fill.0, fill.1, FilterType::Lanczos3)
                            .crop_imm(x, y, target.0, target.1)
                    })
                }
            };
            Ok(resized)
        }))
    }
}

// =========================================================================
// Flip
// =========================================================================

/// Mirrors the image: `flip=h`, `v` or `both`.
pub struct Flip;

impl Manipulator for Flip {
    fn name(&self) -> &str {
        "flip"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let Some(value) = keyword(params, "flip") else {
            return Ok(passthrough());
        };
        let (horizontal, vertical) = match value.as_str() {
            "h" => (true, false),
            "v" => (false, true),
            "both" => (true, true),
            _ => {
                return Err(ManipulationError::malformed(
                    self.name(),
                    "flip",
                    &value,
                    "h, v or both",
                ));
            }
        };

        Ok(stage_fn(move |mut image| {
            if horizontal {
                image.pixels.apply_orientation(ExifOrientation::FlipHorizontal);
            }
            if vertical {
                image.pixels.apply_orientation(ExifOrientation::FlipVertical);
            }
            Ok(image)
        }))
    }
}
