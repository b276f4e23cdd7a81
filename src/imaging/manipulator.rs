//! The manipulator capability contract.
//!
//! A [`Manipulator`] is one named transformation step. Binding request
//! parameters to it with [`Manipulator::set_params`] yields a [`Stage`]: a
//! single-use, per-invocation value that owns everything parsed from those
//! parameters. The manipulator itself is never mutated, so a chain of them can
//! be shared between threads while every invocation keeps its own parameter
//! state.
//!
//! [`Stage::run`] takes the image by value and hands back the image for the
//! next step, either the same buffer edited in place or a new one.

use super::codec::DecodedImage;
use super::params::{ParamError, ParameterSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManipulationError {
    #[error("{stage}: {source}")]
    InvalidParam {
        stage: String,
        #[source]
        source: ParamError,
    },
    #[error("{stage}: {message}")]
    OutOfBounds { stage: String, message: String },
    #[error("{stage}: {message}")]
    Failed { stage: String, message: String },
}

impl ManipulationError {
    pub fn invalid(stage: &str, source: ParamError) -> Self {
        Self::InvalidParam {
            stage: stage.to_string(),
            source,
        }
    }

    pub fn malformed(stage: &str, key: &str, value: &str, expected: &'static str) -> Self {
        Self::invalid(
            stage,
            ParamError::Malformed {
                key: key.to_string(),
                value: value.to_string(),
                expected,
            },
        )
    }

    /// Name of the stage that failed.
    pub fn stage(&self) -> &str {
        match self {
            Self::InvalidParam { stage, .. }
            | Self::OutOfBounds { stage, .. }
            | Self::Failed { stage, .. } => stage,
        }
    }
}

/// A named transformation step.
pub trait Manipulator: Send + Sync {
    /// Stable name used in configuration and logs.
    fn name(&self) -> &str;

    /// Bind this step's parameters for one invocation.
    ///
    /// Reads only the keys this manipulator owns. Malformed values fail here,
    /// before any pixel work for this stage.
    fn set_params(&self, params: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError>;
}

pub type StageResult = Result<DecodedImage, ManipulationError>;

/// A manipulator bound to one invocation's parameters.
pub trait Stage {
    fn run(&self, image: DecodedImage) -> StageResult;
}

impl<F> Stage for F
where
    F: Fn(DecodedImage) -> StageResult,
{
    fn run(&self, image: DecodedImage) -> StageResult {
        self(image)
    }
}

/// Box a closure as a [`Stage`].
pub fn stage_fn(f: impl Fn(DecodedImage) -> StageResult + 'static) -> Box<dyn Stage> {
    Box::new(f)
}

/// Stage that passes the image through.
pub fn passthrough() -> Box<dyn Stage> {
    stage_fn(|image| Ok(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops::FilterType;
    use image::{DynamicImage, ImageFormat, RgbImage};

    #[test]
    fn passthrough_returns_same_image() {
        let image = DecodedImage::new(
            DynamicImage::ImageRgb8(RgbImage::new(3, 2)),
            ImageFormat::Png,
        );
        let out = passthrough().run(image).unwrap();
        assert_eq!((out.width(), out.height()), (3, 2));
    }

    #[test]
    fn closures_are_stages() {
        let stage = stage_fn(|image| Ok(image.map(|p| p.resize_exact(1, 1, FilterType::Nearest))));
        let image = DecodedImage::new(
            DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            ImageFormat::Png,
        );
        assert_eq!(stage.run(image).unwrap().width(), 1);
    }

    #[test]
    fn error_reports_stage_name() {
        let err = ManipulationError::malformed("size", "w", "abc", "a number");
        assert_eq!(err.stage(), "size");
        assert!(err.to_string().starts_with("size: parameter 'w'"));
    }
}
