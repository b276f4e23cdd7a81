//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `glidekit.toml` files. Stock
//! defaults are the base layer; a user config file overrides any subset of
//! them.
//!
//! ## Config File Location
//!
//! Pass `--config <path>` on the command line, or place `glidekit.toml` in the
//! working directory. Without either, stock defaults are used.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! manipulators = ["orientation", "crop", "size", "brightness", "contrast",
//!                 "gamma", "sharpen", "filter", "flip", "blur", "pixelate",
//!                 "background"]
//!
//! [color]
//! # reference_profile = "sRGB.icc"  # ICC file; built-in sRGB when omitted
//! intent = "perceptual"             # perceptual | relative | saturation | absolute
//! quality = 95                      # JPEG quality of the normalization re-encode
//!
//! [output]
//! format = "auto"                   # auto | jpeg | png | webp | tiff | gif | bmp
//! quality = 90                      # Final encode quality (1-100)
//! embed_profile = true              # Tag output with the reference profile
//!
//! [limits]
//! max_image_pixels = 100000000     # Largest area `size` may produce
//!
//! [defaults]                        # Parameters applied to every request
//! # w = 1200
//!
//! [presets.thumb]                   # Selected per request with p=thumb
//! # w = 320
//! # fit = "crop"
//!
//! [processing]
//! # max_processes = 4               # Max parallel workers (omit for auto)
//!
//! [logging]
//! level = "info"                    # trace | debug | info | warn | error
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [output]
//! format = "webp"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::color::Intent;
use crate::imaging::{ManipulatorKind, ManipulatorLimits, OutputFormat, ParameterSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "glidekit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `glidekit.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlideConfig {
    /// Manipulator chain, by name, in execution order.
    pub manipulators: Vec<String>,
    /// Color normalization settings.
    pub color: ColorConfig,
    /// Final encode settings.
    pub output: OutputConfig,
    /// Resource limits passed to manipulators.
    pub limits: ManipulatorLimits,
    /// Parameters applied under every request.
    pub defaults: ParameterSet,
    /// Named parameter bundles selected with `p`.
    pub presets: BTreeMap<String, ParameterSet>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl Default for GlideConfig {
    fn default() -> Self {
        Self {
            manipulators: ManipulatorKind::ALL
                .iter()
                .map(|kind| kind.name().to_string())
                .collect(),
            color: ColorConfig::default(),
            output: OutputConfig::default(),
            limits: ManipulatorLimits::default(),
            defaults: ParameterSet::new(),
            presets: BTreeMap::new(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GlideConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// Manipulator names are checked again when the chain is built; doing it
    /// here as well reports typos at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if !(1..=100).contains(&self.color.quality) {
            return Err(ConfigError::Validation(
                "color.quality must be 1-100".into(),
            ));
        }
        if self.limits.max_image_pixels == Some(0) {
            return Err(ConfigError::Validation(
                "limits.max_image_pixels must be positive".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be positive".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        let mut seen = HashSet::new();
        for name in &self.manipulators {
            if ManipulatorKind::from_name(name).is_none() {
                return Err(ConfigError::Validation(format!(
                    "unknown manipulator '{name}'"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "manipulator '{name}' listed twice"
                )));
            }
        }
        Ok(())
    }
}

/// Color normalization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// ICC file for the reference profile. Relative paths resolve against
    /// the config file's directory.
    pub reference_profile: Option<PathBuf>,
    /// Rendering intent for the conversion.
    pub intent: Intent,
    /// Quality of the lossy re-encode after conversion.
    pub quality: u32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            reference_profile: None,
            intent: Intent::default(),
            quality: 95,
        }
    }
}

/// Final encode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Output container; `auto` keeps the input's.
    pub format: OutputFormat,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
    /// Embed the reference profile in the output.
    pub embed_profile: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Auto,
            quality: 90,
            embed_profile: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Logging settings. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(GlideConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GlideConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GlideConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or from [`DEFAULT_CONFIG_FILE`] in the working
/// directory when `path` is `None`.
///
/// An explicit path must exist; the default file is optional. User values
/// are merged on top of stock defaults, unknown keys are rejected, and the
/// result is validated.
pub fn load_config(path: Option<&Path>) -> Result<GlideConfig, ConfigError> {
    let (file, overlay) = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            (p.to_path_buf(), Some(toml::from_str(&content)?))
        }
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG_FILE);
            let overlay = load_raw_config(&p)?;
            (p, overlay)
        }
    };
    let mut config = resolve_config(stock_defaults_value()?, overlay)?;

    if let (Some(profile), Some(dir)) = (&config.color.reference_profile, file.parent()) {
        if profile.is_relative() {
            config.color.reference_profile = Some(dir.join(profile));
        }
    }
    Ok(config)
}

/// Returns a fully-commented stock `glidekit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# glidekit configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Manipulators run in this order on every image. Remove entries to disable
# them. Run `glidekit manipulators` for the parameters each one reads.
manipulators = [
    "orientation",
    "crop",
    "size",
    "brightness",
    "contrast",
    "gamma",
    "sharpen",
    "filter",
    "flip",
    "blur",
    "pixelate",
    "background",
]

# ---------------------------------------------------------------------------
# Color normalization
# ---------------------------------------------------------------------------
# Images declaring a non-sRGB color space or embedding a foreign ICC profile
# are converted into the reference profile before any manipulator runs.
[color]
# ICC file used as the reference profile. Relative to this file.
# When omitted, the built-in sRGB profile is used.
# reference_profile = "sRGB.icc"

# Rendering intent: perceptual, relative, saturation or absolute.
intent = "perceptual"

# JPEG quality of the re-encode after conversion (1-100).
quality = 95

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# auto keeps the input's container. Also: jpeg, png, webp, tiff, gif, bmp.
# Overridden per request by the fm parameter.
format = "auto"

# Lossy quality (1-100). Overridden per request by the q parameter.
quality = 90

# Embed the reference profile in the output.
embed_profile = true

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest area, in pixels, the size manipulator may produce. Larger requests
# are scaled down proportionally. A crop fit whose intermediate fill would be
# larger fails instead.
max_image_pixels = 100000000

# ---------------------------------------------------------------------------
# Parameters
# ---------------------------------------------------------------------------
# Applied under every request.
[defaults]
# w = 1200

# Named bundles, selected per request with p=name (comma-separate several).
# Precedence: defaults < presets in the order named < request parameters.
[presets]
# thumb = { w = 320, h = 320, fit = "crop" }

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for batch runs. Omit for auto (= CPU cores).
# Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# trace, debug, info, warn or error. RUST_LOG takes precedence when set.
level = "info"
"##
}
