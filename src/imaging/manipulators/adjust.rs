//! Tone adjustments.

use super::{map_color_channels, number};
use crate::imaging::manipulator::{ManipulationError, Manipulator, Stage, passthrough, stage_fn};
use crate::imaging::params::ParameterSet;

/// `bri=-100..100`: shift every channel by that percentage of full scale.
pub struct Brightness;

impl Manipulator for Brightness {
    fn name(&self) -> &str {
        "brightness"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let level = match number(self.name(), params, "bri", -100.0, 100.0)? {
            Some(level) if level != 0.0 => level as f32 / 100.0,
            _ => return Ok(passthrough()),
        };
        Ok(stage_fn(move |image| {
            Ok(image.map(|p| map_color_channels(p, |v| v + level)))
        }))
    }
}

/// `con=-100..100`: stretch or compress values around mid-gray.
pub struct Contrast;

impl Manipulator for Contrast {
    fn name(&self) -> &str {
        "contrast"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let level = match number(self.name(), params, "con", -100.0, 100.0)? {
            Some(level) if level != 0.0 => level as f32,
            _ => return Ok(passthrough()),
        };
        Ok(stage_fn(move |image| Ok(image.map(|p| p.adjust_contrast(level)))))
    }
}

/// `gam=0.1..9.99`: gamma correction, values above 1 lighten midtones.
pub struct Gamma;

impl Manipulator for Gamma {
    fn name(&self) -> &str {
        "gamma"
    }

    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let exponent = match number(self.name(), params, "gam", 0.1, 9.99)? {
            Some(gamma) => 1.0 / gamma as f32,
            None => return Ok(passthrough()),
        };
        Ok(stage_fn(move |image| {
            Ok(image.map(|p| map_color_channels(p, |v| v.powf(exponent))))
        }))
    }
}
