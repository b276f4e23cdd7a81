//! The image pipeline: normalize, decode, manipulate, encode.
//!
//! One [`Pipeline`] is built per process and shared by every invocation.
//! [`Pipeline::run`] turns raw source bytes plus a [`ParameterSet`] into
//! encoded output bytes:
//!
//! ```text
//! raw bytes ──► ColorNormalizer ──► codec.decode ──► manipulator 1 … n ──► codec.encode
//!               (sRGB or unchanged)                 (set_params → run,     (fm / q or
//!                                                    in chain order)        configured)
//! ```
//!
//! Normalization always runs before any manipulator sees pixels. A failure at
//! any step ends the invocation; nothing partial is returned.

use crate::color::{ColorNormalizer, NormalizeError, ProfileLoadError, ReferenceProfile};
use crate::config::GlideConfig;
use crate::imaging::{
    ConfigurationError, DecodeError, EncodeError, EncodeOptions, ImageCodec, ManipulationError,
    ManipulatorChain, OutputFormat, ParamError, ParameterSet, Quality, RustCodec,
};
use image::ImageFormat;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info_span};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("color normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("manipulation failed: {0}")]
    Manipulation(#[from] ManipulationError),
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("invalid output parameter: {0}")]
    Output(#[from] ParamError),
}

/// Errors building a pipeline from configuration.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Profile(#[from] ProfileLoadError),
}

/// Final encode settings, overridable per request with `fm` and `q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Embed the reference profile in the output.
    pub embed_profile: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Auto,
            quality: Quality::default(),
            embed_profile: true,
        }
    }
}

/// Result of one invocation.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

pub struct Pipeline<C: ImageCodec = RustCodec> {
    normalizer: ColorNormalizer,
    chain: ManipulatorChain,
    codec: C,
    output: OutputSettings,
    defaults: ParameterSet,
    presets: BTreeMap<String, ParameterSet>,
}

impl Pipeline<RustCodec> {
    pub fn new(normalizer: ColorNormalizer, chain: ManipulatorChain) -> Self {
        Self {
            normalizer,
            chain,
            codec: RustCodec::new(),
            output: OutputSettings::default(),
            defaults: ParameterSet::new(),
            presets: BTreeMap::new(),
        }
    }

    /// Build the pipeline a config file describes.
    ///
    /// Loads the process-wide reference profile on first use and resolves
    /// manipulator names against the built-ins.
    pub fn from_config(config: &GlideConfig) -> Result<Self, SetupError> {
        let reference = ReferenceProfile::global(config.color.reference_profile.as_deref())?;
        let normalizer = ColorNormalizer::new(reference)
            .with_intent(config.color.intent)
            .with_quality(Quality::new(config.color.quality));
        let chain = ManipulatorChain::from_names(&config.manipulators, &config.limits)?;
        debug!(chain = ?chain, "pipeline configured");

        Ok(Self::new(normalizer, chain)
            .with_output(OutputSettings {
                format: config.output.format,
                quality: Quality::new(config.output.quality),
                embed_profile: config.output.embed_profile,
            })
            .with_parameters(config.defaults.clone(), config.presets.clone()))
    }
}

impl<C: ImageCodec> Pipeline<C> {
    /// Swap the decode/encode collaborator.
    pub fn with_codec<D: ImageCodec>(self, codec: D) -> Pipeline<D> {
        Pipeline {
            normalizer: self.normalizer,
            chain: self.chain,
            codec,
            output: self.output,
            defaults: self.defaults,
            presets: self.presets,
        }
    }

    pub fn with_output(mut self, output: OutputSettings) -> Self {
        self.output = output;
        self
    }

    /// Parameters layered under every request, see [`ParameterSet::resolve`].
    pub fn with_parameters(
        mut self,
        defaults: ParameterSet,
        presets: BTreeMap<String, ParameterSet>,
    ) -> Self {
        self.defaults = defaults;
        self.presets = presets;
        self
    }

    pub fn chain(&self) -> &ManipulatorChain {
        &self.chain
    }

    pub fn normalizer(&self) -> &ColorNormalizer {
        &self.normalizer
    }

    pub fn output(&self) -> &OutputSettings {
        &self.output
    }

    /// Process one image and return the encoded bytes.
    pub fn run(&self, source: &[u8], params: &ParameterSet) -> Result<Vec<u8>, PipelineError> {
        self.render(source, params).map(|rendered| rendered.bytes)
    }

    /// Process one image, also reporting the output container and size.
    pub fn render(
        &self,
        source: &[u8],
        params: &ParameterSet,
    ) -> Result<RenderedImage, PipelineError> {
        let _span = info_span!("pipeline", input_bytes = source.len()).entered();
        let params = ParameterSet::resolve(params, &self.defaults, &self.presets);
        let (format, quality) = self.output_overrides(&params)?;

        let (normalized, source_profile) = self.normalizer.normalize_inspected(source)?;
        let mut image = self.codec.decode(&normalized)?;
        // Converted bytes lost the source's EXIF block
        image.orientation = source_profile.orientation;
        let image = self.chain.apply(image, &params)?;

        let format = format.resolve(image.format);
        let bytes = self.codec.encode(
            &image,
            &EncodeOptions {
                format,
                quality,
                icc_profile: self
                    .output
                    .embed_profile
                    .then(|| self.normalizer.reference().icc()),
            },
        )?;
        debug!(
            ?format,
            width = image.width(),
            height = image.height(),
            output_bytes = bytes.len(),
            "image rendered"
        );

        Ok(RenderedImage {
            bytes,
            format,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Output format a request selects once defaults, presets and `fm` apply.
    pub fn output_format(&self, params: &ParameterSet) -> Result<OutputFormat, ParamError> {
        let params = ParameterSet::resolve(params, &self.defaults, &self.presets);
        self.output_overrides(&params).map(|(format, _)| format)
    }

    /// Output format and quality after `fm` / `q` overrides.
    fn output_overrides(
        &self,
        params: &ParameterSet,
    ) -> Result<(OutputFormat, Quality), ParamError> {
        let format = match params.get_text("fm") {
            Some(name) if !name.trim().is_empty() => {
                OutputFormat::from_name(&name).ok_or_else(|| ParamError::Malformed {
                    key: "fm".to_string(),
                    value: name.clone(),
                    expected: "jpg, png, webp, tiff, gif or bmp",
                })?
            }
            _ => self.output.format,
        };
        let quality = params
            .get_number_in("q", 1.0, 100.0)?
            .map(|q| Quality::new(q.round() as u32))
            .unwrap_or(self.output.quality);
        Ok((format, quality))
    }
}
