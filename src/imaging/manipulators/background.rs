//! Background color for transparent images.

use super::keyword;
use crate::imaging::manipulator::{ManipulationError, Manipulator, Stage, passthrough, stage_fn};
use crate::imaging::params::ParameterSet;
use image::{DynamicImage, Rgba, RgbaImage, imageops};

/// `bg=<color>`: composite the image over a solid color.
///
/// Colors are hex, with or without `#`: `RGB`, `ARGB`, `RRGGBB` or
/// `AARRGGBB` (alpha first), or one of `black`, `white`, `gray`, `red`,
/// `green`, `blue`. Opaque images pass through unchanged.
pub struct Background;

impl Manipulator for Background {
    fn name(&self) -> &str {
        "background"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let Some(value) = keyword(params, "bg") else {
            return Ok(passthrough());
        };
        let color = parse_color(&value).ok_or_else(|| {
            ManipulationError::malformed(self.name(), "bg", &value, "a hex color or color name")
        })?;

        Ok(stage_fn(move |image| {
            if !image.pixels.color().has_alpha() {
                return Ok(image);
            }
            Ok(image.map(|p| {
                let mut canvas = RgbaImage::from_pixel(p.width(), p.height(), color);
                imageops::overlay(&mut canvas, &p.to_rgba8(), 0, 0);
                if color.0[3] == u8::MAX {
                    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).into_rgb8())
                } else {
                    DynamicImage::ImageRgba8(canvas)
                }
            }))
        }))
    }
}

fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let named = match value {
        "black" => Some([0, 0, 0]),
        "white" => Some([255, 255, 255]),
        "gray" | "grey" => Some([128, 128, 128]),
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 128, 0]),
        "blue" => Some([0, 0, 255]),
        _ => None,
    };
    if let Some([r, g, b]) = named {
        return Some(Rgba([r, g, b, 255]));
    }

    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let [a, r, g, b] = match hex.len() {
        3 => [Some(255), nibble(0), nibble(1), nibble(2)],
        4 => [nibble(0), nibble(1), nibble(2), nibble(3)],
        6 => [Some(255), byte(0), byte(2), byte(4)],
        8 => [byte(0), byte(2), byte(4), byte(6)],
        _ => return None,
    };
    Some(Rgba([r?, g?, b?, a?]))
}
