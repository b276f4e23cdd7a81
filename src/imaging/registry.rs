//! Built-in manipulators by name.

use super::manipulator::Manipulator;
use super::manipulators::{
    Background, Blur, Brightness, Contrast, Crop, Filter, Flip, Gamma, Orientation, Pixelate,
    Sharpen, Size,
};
use serde::{Deserialize, Serialize};

/// Default for [`ManipulatorLimits::max_image_pixels`]: 100 megapixels.
pub const DEFAULT_MAX_IMAGE_PIXELS: u64 = 100_000_000;

/// Limits shared by manipulators that allocate new pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManipulatorLimits {
    /// Largest buffer `size` may allocate, in pixels. Larger targets are
    /// scaled down proportionally. A crop fill over the limit is
    /// [`ManipulationError::OutOfBounds`](super::ManipulationError::OutOfBounds).
    /// `None` lifts the limit.
    pub max_image_pixels: Option<u64>,
}

impl Default for ManipulatorLimits {
    fn default() -> Self {
        Self {
            max_image_pixels: Some(DEFAULT_MAX_IMAGE_PIXELS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManipulatorKind {
    Orientation,
    Crop,
    Size,
    Brightness,
    Contrast,
    Gamma,
    Sharpen,
    Filter,
    Flip,
    Blur,
    Pixelate,
    Background,
}

impl ManipulatorKind {
    /// All built-ins in default chain order.
    pub const ALL: [ManipulatorKind; 12] = [
        Self::Orientation,
        Self::Crop,
        Self::Size,
        Self::Brightness,
        Self::Contrast,
        Self::Gamma,
        Self::Sharpen,
        Self::Filter,
        Self::Flip,
        Self::Blur,
        Self::Pixelate,
        Self::Background,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Orientation => "orientation",
            Self::Crop => "crop",
            Self::Size => "size",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Gamma => "gamma",
            Self::Sharpen => "sharpen",
            Self::Filter => "filter",
            Self::Flip => "flip",
            Self::Blur => "blur",
            Self::Pixelate => "pixelate",
            Self::Background => "background",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Parameter keys read by this manipulator.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            Self::Orientation => &["or"],
            Self::Crop => &["crop"],
            Self::Size => &["w", "width", "h", "height", "fit", "dpr"],
            Self::Brightness => &["bri"],
            Self::Contrast => &["con"],
            Self::Gamma => &["gam"],
            Self::Sharpen => &["sharp"],
            Self::Filter => &["filt"],
            Self::Flip => &["flip"],
            Self::Blur => &["blur"],
            Self::Pixelate => &["pixel"],
            Self::Background => &["bg"],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Orientation => "rotate by EXIF orientation or a fixed angle",
            Self::Crop => "cut a rectangle out of the image",
            Self::Size => "resize with contain/max/stretch/crop fitting",
            Self::Brightness => "lighten or darken",
            Self::Contrast => "raise or lower contrast",
            Self::Gamma => "gamma correction",
            Self::Sharpen => "unsharp mask",
            Self::Filter => "greyscale or sepia",
            Self::Flip => "mirror horizontally, vertically or both",
            Self::Blur => "gaussian blur",
            Self::Pixelate => "block pixelation",
            Self::Background => "flatten transparency onto a color",
        }
    }

    pub fn build(self, limits: &ManipulatorLimits) -> Box<dyn Manipulator> {
        match self {
            Self::Orientation => Box::new(Orientation),
            Self::Crop => Box::new(Crop),
            Self::Size => Box::new(Size::new(*limits)),
            Self::Brightness => Box::new(Brightness),
            Self::Contrast => Box::new(Contrast),
            Self::Gamma => Box::new(Gamma),
            Self::Sharpen => Box::new(Sharpen),
            Self::Filter => Box::new(Filter),
            Self::Flip => Box::new(Flip),
            Self::Blur => Box::new(Blur),
            Self::Pixelate => Box::new(Pixelate),
            Self::Background => Box::new(Background),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in ManipulatorKind::ALL {
            assert_eq!(ManipulatorKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.build(&ManipulatorLimits::default()).name(), kind.name());
        }
    }

    #[test]
    fn default_limits_are_finite() {
        assert_eq!(
            ManipulatorLimits::default().max_image_pixels,
            Some(DEFAULT_MAX_IMAGE_PIXELS)
        );
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(ManipulatorKind::from_name("Size"), None);
        assert_eq!(ManipulatorKind::from_name("watermark"), None);
    }
}
