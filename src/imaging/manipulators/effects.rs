//! Filters and effects.

use super::{keyword, number};
use crate::imaging::manipulator::{ManipulationError, Manipulator, Stage, passthrough, stage_fn};
use crate::imaging::params::ParameterSet;
use image::imageops::FilterType;
use image::DynamicImage;

/// `sharp=0..100`: unsharp mask.
pub struct Sharpen;

impl Manipulator for Sharpen {
    fn name(&self) -> &str {
        "sharpen"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let sigma = match number(self.name(), params, "sharp", 0.0, 100.0)? {
            Some(amount) if amount > 0.0 => amount as f32 / 20.0,
            _ => return Ok(passthrough()),
        };
        Ok(stage_fn(move |image| Ok(image.map(|p| p.unsharpen(sigma, 0)))))
    }
}

/// `filt=greyscale` or `filt=sepia`.
pub struct Filter;

#[derive(Debug, Clone, Copy)]
enum FilterKind {
    Greyscale,
    Sepia,
}

impl Manipulator for Filter {
    fn name(&self) -> &str {
        "filter"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let Some(value) = keyword(params, "filt") else {
            return Ok(passthrough());
        };
        let kind = match value.as_str() {
            "greyscale" | "grayscale" => FilterKind::Greyscale,
            "sepia" => FilterKind::Sepia,
            _ => {
                return Err(ManipulationError::malformed(
                    self.name(),
                    "filt",
                    &value,
                    "greyscale or sepia",
                ));
            }
        };
        Ok(stage_fn(move |image| {
            Ok(image.map(|p| match kind {
                FilterKind::Greyscale => p.grayscale(),
                FilterKind::Sepia => sepia(p),
            }))
        }))
    }
}

fn sepia(pixels: DynamicImage) -> DynamicImage {
    let mut buf = pixels.into_rgba8();
    for px in buf.pixels_mut() {
        let [r, g, b, a] = px.0.map(f32::from);
        let tone = |wr: f32, wg: f32, wb: f32| (r * wr + g * wg + b * wb).min(255.0).round() as u8;
        px.0 = [
            tone(0.393, 0.769, 0.189),
            tone(0.349, 0.686, 0.168),
            tone(0.272, 0.534, 0.131),
            a as u8,
        ];
    }
    DynamicImage::ImageRgba8(buf)
}

/// `blur=0..100`: gaussian blur.
pub struct Blur;

impl Manipulator for Blur {
    fn name(&self) -> &str {
        "blur"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let sigma = match number(self.name(), params, "blur", 0.0, 100.0)? {
            Some(amount) if amount > 0.0 => amount as f32 * 0.5,
            _ => return Ok(passthrough()),
        };
        Ok(stage_fn(move |image| Ok(image.map(|p| p.blur(sigma)))))
    }
}

/// `pixel=0..1000`: replace blocks of that edge length with their average.
pub struct Pixelate;

impl Manipulator for Pixelate {
    fn name(&self) -> &str {
        "pixelate"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let block = match number(self.name(), params, "pixel", 0.0, 1000.0)? {
            Some(size) if size >= 2.0 => size.round() as u32,
            _ => return Ok(passthrough()),
        };
        Ok(stage_fn(move |image| {
            let (w, h) = (image.width(), image.height());
            let small = (w.div_ceil(block).max(1), h.div_ceil(block).max(1));
            Ok(image.map(|p| {
                p.resize_exact(small.0, small.1, FilterType::Triangle)
                    .resize_exact(w, h, FilterType::Nearest)
            }))
        }))
    }
}
