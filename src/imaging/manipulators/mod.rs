//! Built-in manipulators.
//!
//! Parameter names follow the common image-server URL vocabulary:
//!
//! | Manipulator | Keys | Values |
//! |---|---|---|
//! | `orientation` | `or` | `auto` (default), `0`, `90`, `180`, `270` |
//! | `crop` | `crop` | `width,height,x,y` |
//! | `size` | `w`/`width`, `h`/`height`, `fit`, `dpr` | `fit`: `contain`, `max`, `stretch`, `crop` |
//! | `brightness` | `bri` | -100..100 |
//! | `contrast` | `con` | -100..100 |
//! | `gamma` | `gam` | 0.1..9.99 |
//! | `sharpen` | `sharp` | 0..100 |
//! | `filter` | `filt` | `greyscale`, `sepia` |
//! | `flip` | `flip` | `h`, `v`, `both` |
//! | `blur` | `blur` | 0..100 |
//! | `pixelate` | `pixel` | 0..1000 |
//! | `background` | `bg` | hex color |
//!
//! An absent key leaves the image alone. A present but malformed value is an
//! error.

mod adjust;
mod background;
mod effects;
mod geometry;

pub use adjust::{Brightness, Contrast, Gamma};
pub use background::Background;
pub use effects::{Blur, Filter, Pixelate, Sharpen};
pub use geometry::{Crop, Flip, Orientation, Size};

use super::manipulator::ManipulationError;
use super::params::ParameterSet;
use image::DynamicImage;

/// Range-checked numeric parameter, with errors attributed to `stage`.
fn number(
    stage: &str,
    params: &ParameterSet,
    key: &str,
    min: f64,
    max: f64,
) -> Result<Option<f64>, ManipulationError> {
    params
        .get_number_in(key, min, max)
        .map_err(|e| ManipulationError::invalid(stage, e))
}

/// Trimmed, lowercased text parameter. Empty counts as absent.
fn keyword(params: &ParameterSet, key: &str) -> Option<String> {
    params
        .get_text(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

/// Apply `f` to every color channel through an 8-bit lookup table.
///
/// Alpha is left untouched. The result is 8-bit RGB or RGBA.
fn map_color_channels(pixels: DynamicImage, f: impl Fn(f32) -> f32) -> DynamicImage {
    let lut: Vec<u8> = (0..=255u16)
        .map(|v| (f(v as f32 / 255.0).clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();

    if pixels.color().has_alpha() {
        let mut buf = pixels.into_rgba8();
        for px in buf.pixels_mut() {
            for c in &mut px.0[..3] {
                *c = lut[*c as usize];
            }
        }
        DynamicImage::ImageRgba8(buf)
    } else {
        let mut buf = pixels.into_rgb8();
        for px in buf.pixels_mut() {
            for c in &mut px.0 {
                *c = lut[*c as usize];
            }
        }
        DynamicImage::ImageRgb8(buf)
    }
}
