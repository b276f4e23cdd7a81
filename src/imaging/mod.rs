//! Image processing: codec, parameters and the manipulator chain.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image` codecs behind [`ImageCodec`] |
//! | **Resize** | `resize_exact` with Lanczos3 |
//! | **Tone** | per-channel lookup tables, `adjust_contrast` |
//! | **Effects** | `blur`, `unsharpen`, `grayscale`, `imageops::overlay` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: [`ParameterSet`] and [`Quality`]
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Manipulator**: [`Manipulator`] / [`Stage`] contract
//! - **Chain**: [`ManipulatorChain`], the ordered list run per invocation
//! - **Registry / manipulators**: the built-in steps, addressable by name

pub mod calculations;
pub mod chain;
pub mod codec;
pub mod manipulator;
pub mod manipulators;
pub mod params;
pub mod registry;

pub use chain::{ConfigurationError, ManipulatorChain};
pub use codec::{
    DecodeError, DecodedImage, EncodeError, EncodeOptions, ImageCodec, OutputFormat, RustCodec,
};
pub use manipulator::{ManipulationError, Manipulator, Stage, StageResult, passthrough, stage_fn};
pub use params::{ParamError, ParamValue, ParameterSet, Quality};
pub use registry::{DEFAULT_MAX_IMAGE_PIXELS, ManipulatorKind, ManipulatorLimits};
