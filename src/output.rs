//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Every entity (image, manipulator) leads with its positional index and
//! identity, with details on indented context lines below. Paths are shown
//! relative where a root is known.
//!
//! # Output Format
//!
//! ## Inspect
//!
//! ```text
//! photo.jpg
//!     Format: Jpeg
//!     Color space: sRGB
//!     ICC profile: Display P3 (548 bytes)
//!     Normalization: convert
//! ```
//!
//! ## Run
//!
//! ```text
//! photo.jpg → out.jpg
//!     800x600 Jpeg, 81234 bytes
//! ```
//!
//! ## Batch
//!
//! ```text
//! Processing 3 images
//! 001 2024/beach.jpg → 2024/beach.jpg (800x600)
//! 002 broken.png: failed
//!     decode failed: ...
//!
//! 2 processed, 1 failed
//! ```
//!
//! ## Manipulators
//!
//! ```text
//! 001 orientation
//!     Params: or
//!     rotate by EXIF orientation or a fixed angle
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::batch::{BatchEvent, BatchReport};
use crate::color::ColorProfile;
use crate::imaging::{ManipulatorChain, ManipulatorKind};
use crate::pipeline::RenderedImage;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Path relative to `root` when it lies beneath it.
fn display_relative(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|r| path.strip_prefix(r).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Inspect
// ============================================================================

/// Format the color facts of one file.
pub fn format_inspect(
    path: &Path,
    profile: &ColorProfile,
    needs_conversion: bool,
) -> Vec<String> {
    let mut lines = vec![path.display().to_string()];
    lines.push(format!("{}Format: {:?}", indent(1), profile.format));
    lines.push(format!("{}Color space: {}", indent(1), profile.color_space));
    let icc = match &profile.icc_profile {
        Some(bytes) => format!(
            "{} ({} bytes)",
            profile
                .icc_description()
                .unwrap_or_else(|| "unnamed".to_string()),
            bytes.len()
        ),
        None => "none".to_string(),
    };
    lines.push(format!("{}ICC profile: {}", indent(1), icc));
    lines.push(format!(
        "{}Normalization: {}",
        indent(1),
        if needs_conversion { "convert" } else { "none" }
    ));
    lines
}

pub fn print_inspect(path: &Path, profile: &ColorProfile, needs_conversion: bool) {
    for line in format_inspect(path, profile, needs_conversion) {
        println!("{}", line);
    }
}

// ============================================================================
// Run
// ============================================================================

pub fn format_run_output(source: &Path, output: &Path, rendered: &RenderedImage) -> Vec<String> {
    vec![
        format!("{} \u{2192} {}", source.display(), output.display()),
        format!(
            "{}{}x{} {:?}, {} bytes",
            indent(1),
            rendered.width,
            rendered.height,
            rendered.format,
            rendered.bytes.len()
        ),
    ]
}

pub fn print_run_output(source: &Path, output: &Path, rendered: &RenderedImage) {
    for line in format_run_output(source, output, rendered) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format one batch progress event. Paths are shown relative to the input
/// and output roots when given.
pub fn format_batch_event(
    event: &BatchEvent,
    input_root: Option<&Path>,
    output_root: Option<&Path>,
) -> Vec<String> {
    match event {
        BatchEvent::Started { total } => vec![format!("Processing {} images", total)],
        BatchEvent::ImageDone {
            index,
            source,
            output,
            width,
            height,
        } => vec![format!(
            "{} {} \u{2192} {} ({}x{})",
            format_index(*index),
            display_relative(source, input_root),
            display_relative(output, output_root),
            width,
            height
        )],
        BatchEvent::ImageFailed {
            index,
            source,
            error,
        } => vec![
            format!(
                "{} {}: failed",
                format_index(*index),
                display_relative(source, input_root)
            ),
            format!("{}{}", indent(1), error),
        ],
    }
}

pub fn format_batch_report(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![String::new(), report.to_string()];
    for failure in &report.failed {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            failure.source.display(),
            failure.error
        ));
    }
    lines
}

pub fn print_batch_report(report: &BatchReport) {
    for line in format_batch_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Manipulators
// ============================================================================

/// Format the configured chain in execution order.
pub fn format_manipulators(chain: &ManipulatorChain) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, name) in chain.names().into_iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), name));
        if let Some(kind) = ManipulatorKind::from_name(name) {
            lines.push(format!("{}Params: {}", indent(1), kind.params().join(", ")));
            lines.push(format!("{}{}", indent(1), kind.description()));
        }
    }
    if lines.is_empty() {
        lines.push("(no manipulators configured)".to_string());
    }
    lines
}

pub fn print_manipulators(chain: &ManipulatorChain) {
    for line in format_manipulators(chain) {
        println!("{}", line);
    }
}
