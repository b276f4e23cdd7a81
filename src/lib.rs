//! # Glidekit
//!
//! An image manipulation pipeline that normalizes color before it touches a
//! single pixel. Raw image bytes go in together with a flat set of request
//! parameters (`w=300&fit=crop&bri=10`), and encoded bytes come out.
//!
//! # Architecture: Normalize, Then Manipulate
//!
//! ```text
//! raw bytes ──► color normalization ──► decode ──► manipulator chain ──► encode
//!               (into reference sRGB)              (configured order)
//! ```
//!
//! Every image is first converted into one canonical color space, sRGB as
//! described by the reference profile. Images that already are sRGB pass
//! through byte for byte. Manipulators can therefore assume sRGB input, and
//! output colors stay consistent across wide-gamut, grayscale and
//! profile-less sources.
//!
//! Manipulators run in the order the configuration lists them. Each step is
//! bound to the request's parameters first (which yields a runnable
//! [`imaging::Stage`]) and then run on the previous step's output. A step that
//! finds none of its parameters is a passthrough. A malformed parameter ends
//! the invocation with an error naming the step.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`color`] | Color-space detection, reference profile, conditional sRGB conversion |
//! | [`imaging`] | Codec, request parameters, the manipulator contract and built-in manipulators |
//! | [`pipeline`] | [`Pipeline`]: normalize, decode, run the chain, encode |
//! | [`batch`] | Parallel processing of a directory tree through one shared pipeline |
//! | [`config`] | `glidekit.toml` loading, stock defaults, validation |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Pipeline Per Process
//!
//! The reference profile is loaded once and shared behind an `Arc`, and the
//! chain is built once from configuration. [`Pipeline::run`] takes `&self` and
//! keeps no per-call state, so any number of threads can share one pipeline.
//! Per-request state lives only in the stages produced for that request.
//!
//! ## Pure-Rust Imaging, LittleCMS For Color
//!
//! Decoding, resampling and encoding use the `image` crate. Color transforms
//! go through LittleCMS (`lcms2`), which reads embedded ICC profiles of any
//! kind and converts with a selectable rendering intent.
//!
//! ## Parameters Are Strings Until A Step Reads Them
//!
//! Callers hand over untyped values. Each manipulator parses only the keys it
//! owns, so an unknown key is ignored and a malformed one is reported by the
//! step that owns it. Defaults and named presets from the config are merged
//! under the request's own values (see [`imaging::ParameterSet::resolve`]).

pub mod batch;
pub mod color;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod pipeline;

pub use imaging::{ManipulationError, Manipulator, ManipulatorChain, ParameterSet};
pub use pipeline::{Pipeline, PipelineError, RenderedImage, SetupError};

#[cfg(test)]
pub(crate) mod test_helpers;
