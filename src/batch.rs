//! Batch processing of a directory tree.
//!
//! Walks the input directory, runs every supported image through one shared
//! [`Pipeline`] in parallel, and writes the results to the same relative
//! paths under the output directory. The output extension follows the
//! rendered format.
//!
//! ## Output Structure
//!
//! ```text
//! photos/                      out/
//! ├── cover.png          →     ├── cover.png
//! ├── notes.txt                │   (skipped: not an image)
//! └── 2024/                    └── 2024/
//!     └── beach.jpg      →         └── beach.jpg
//! ```
//!
//! Output paths are planned before any image is rendered. When two sources
//! map to one output (`a.png` and `a.jpg` with `fm=png`), the first in path
//! order keeps it and the others fail with a collision error.
//!
//! A failing image does not stop the batch. Every outcome is sent as a
//! [`BatchEvent`] when a channel is given, and failures are collected into
//! the returned [`BatchReport`], which [`write_report`] saves as JSON.

use crate::imaging::codec::{extension_for, supported_input_extensions};
use crate::imaging::{ImageCodec, OutputFormat, ParameterSet};
use crate::pipeline::Pipeline;
use image::{ImageFormat, ImageReader};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot walk input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("input is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    ImageDone {
        index: usize,
        source: PathBuf,
        output: PathBuf,
        width: u32,
        height: u32,
    },
    ImageFailed {
        index: usize,
        source: PathBuf,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} failed",
            self.processed,
            self.failed.len()
        )
    }
}

/// Supported images under `input_dir`, sorted by path.
///
/// Anything under `output_dir` is skipped so that writing results inside the
/// input tree does not feed them back in.
pub fn collect_sources(input_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !input_dir.is_dir() {
        return Err(BatchError::NotADirectory(input_dir.to_path_buf()));
    }
    let extensions = supported_input_extensions();
    let mut sources = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.starts_with(output_dir) {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            sources.push(path.to_path_buf());
        }
    }
    Ok(sources)
}

/// Process every supported image under `input_dir` into `output_dir`.
pub fn run_batch<C: ImageCodec>(
    pipeline: &Pipeline<C>,
    input_dir: &Path,
    output_dir: &Path,
    params: &ParameterSet,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchReport, BatchError> {
    let sources = collect_sources(input_dir, output_dir)?;
    std::fs::create_dir_all(output_dir)?;
    tracing::info!(
        total = sources.len(),
        input = %input_dir.display(),
        output = %output_dir.display(),
        "batch started"
    );
    send(&events, BatchEvent::Started {
        total: sources.len(),
    });

    let format = pipeline.output_format(params).unwrap_or(OutputFormat::Auto);
    let planned = plan_outputs(&sources, input_dir, output_dir, format);

    let outcomes: Vec<Result<(), BatchFailure>> = sources
        .par_iter()
        .zip(&planned)
        .enumerate()
        .map(|(index, (source, output))| {
            let result = output
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|output| process_one(pipeline, source, output, params));
            match result {
                Ok((output, width, height)) => {
                    send(&events, BatchEvent::ImageDone {
                        index: index + 1,
                        source: source.clone(),
                        output,
                        width,
                        height,
                    });
                    Ok(())
                }
                Err(error) => {
                    tracing::warn!(source = %source.display(), %error, "image failed");
                    send(&events, BatchEvent::ImageFailed {
                        index: index + 1,
                        source: source.clone(),
                        error: error.clone(),
                    });
                    Err(BatchFailure {
                        source: source.clone(),
                        error,
                    })
                }
            }
        })
        .collect();

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(()) => report.processed += 1,
            Err(failure) => report.failed.push(failure),
        }
    }
    tracing::info!(%report, "batch finished");
    Ok(report)
}

/// Save `report` as pretty-printed JSON.
pub fn write_report(report: &BatchReport, path: &Path) -> Result<(), BatchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

/// Output path for every source, in the same order.
///
/// The extension follows the format the source will render to: its sniffed
/// container under [`OutputFormat::Auto`], otherwise the override. A path
/// already claimed by an earlier source is an error for the later one.
pub fn plan_outputs(
    sources: &[PathBuf],
    input_dir: &Path,
    output_dir: &Path,
    format: OutputFormat,
) -> Vec<Result<PathBuf, String>> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    sources
        .iter()
        .map(|source| {
            let relative = source.strip_prefix(input_dir).unwrap_or(source);
            let output = match source_format(source) {
                Some(detected) => output_dir
                    .join(relative)
                    .with_extension(extension_for(format.resolve(detected))),
                None => output_dir.join(relative),
            };
            match claimed.get(&output) {
                Some(first) => Err(format!(
                    "output {} collides with {}",
                    output.display(),
                    first.display()
                )),
                None => {
                    claimed.insert(output.clone(), source);
                    Ok(output)
                }
            }
        })
        .collect()
}

/// Container format from the file header, else from the extension.
fn source_format(source: &Path) -> Option<ImageFormat> {
    ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .ok()
        .and_then(|reader| reader.format())
        .or_else(|| ImageFormat::from_path(source).ok())
}

fn process_one<C: ImageCodec>(
    pipeline: &Pipeline<C>,
    source: &Path,
    output: &Path,
    params: &ParameterSet,
) -> Result<(PathBuf, u32, u32), String> {
    let bytes = std::fs::read(source).map_err(|e| e.to_string())?;
    let rendered = pipeline.render(&bytes, params).map_err(|e| e.to_string())?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(output, &rendered.bytes).map_err(|e| e.to_string())?;
    Ok((output.to_path_buf(), rendered.width, rendered.height))
}

fn send(events: &Option<Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorNormalizer, ReferenceProfile};
    use crate::imaging::{ManipulatorChain, ManipulatorLimits};
    use crate::test_helpers::{gradient_jpeg, gradient_png};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn size_pipeline() -> Pipeline {
        let chain = ManipulatorChain::from_names(&["size"], &ManipulatorLimits::default()).unwrap();
        Pipeline::new(
            ColorNormalizer::new(Arc::new(ReferenceProfile::builtin().unwrap())),
            chain,
        )
    }

    fn setup_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("in");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("a.png"), gradient_png(40, 20, None)).unwrap();
        fs::write(root.join("nested/b.JPG"), gradient_jpeg(30, 30, None)).unwrap();
        fs::write(root.join("notes.txt"), "not an image").unwrap();
        tmp
    }

    #[test]
    fn collect_sources_filters_and_sorts() {
        let tmp = setup_tree();
        let root = tmp.path().join("in");
        let sources = collect_sources(&root, &tmp.path().join("out")).unwrap();
        assert_eq!(sources, vec![root.join("a.png"), root.join("nested/b.JPG")]);
    }

    #[test]
    fn collect_sources_skips_output_inside_input() {
        let tmp = setup_tree();
        let root = tmp.path().join("in");
        fs::create_dir_all(root.join("out")).unwrap();
        fs::write(root.join("out/old.png"), gradient_png(4, 4, None)).unwrap();
        let sources = collect_sources(&root, &root.join("out")).unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn collect_sources_requires_directory() {
        let tmp = setup_tree();
        let file = tmp.path().join("in/a.png");
        assert!(matches!(
            collect_sources(&file, tmp.path()),
            Err(BatchError::NotADirectory(_))
        ));
    }

    #[test]
    fn batch_mirrors_tree() {
        let tmp = setup_tree();
        let out = tmp.path().join("out");
        let params: ParameterSet = [("w", "10")].into_iter().collect();

        let report =
            run_batch(&size_pipeline(), &tmp.path().join("in"), &out, &params, None).unwrap();

        assert!(report.is_success());
        assert_eq!(report.processed, 2);
        let a = image::open(out.join("a.png")).unwrap();
        assert_eq!((a.width(), a.height()), (10, 5));
        assert!(out.join("nested/b.jpg").exists());
        assert!(!out.join("notes.txt").exists());
    }

    #[test]
    fn same_stem_sources_collide_on_one_output() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("in");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.jpg"), gradient_jpeg(20, 20, None)).unwrap();
        fs::write(root.join("a.png"), gradient_png(40, 20, None)).unwrap();
        let out = tmp.path().join("out");
        let params: ParameterSet = [("fm", "png")].into_iter().collect();

        let report = run_batch(&size_pipeline(), &root, &out, &params, None).unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].source.ends_with("a.png"));
        assert!(report.failed[0].error.contains("collides with"));
        // a.jpg sorts first and keeps the path
        let written = image::open(out.join("a.png")).unwrap();
        assert_eq!((written.width(), written.height()), (20, 20));
    }

    #[test]
    fn plan_outputs_keeps_distinct_extensions_under_auto() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("in");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.jpg"), gradient_jpeg(8, 8, None)).unwrap();
        fs::write(root.join("a.png"), gradient_png(8, 8, None)).unwrap();
        let sources = vec![root.join("a.jpg"), root.join("a.png")];
        let out = tmp.path().join("out");

        let planned = plan_outputs(&sources, &root, &out, OutputFormat::Auto);

        assert_eq!(
            planned,
            vec![Ok(out.join("a.jpg")), Ok(out.join("a.png"))]
        );
    }

    #[test]
    fn batch_reports_failures_and_continues() {
        let tmp = setup_tree();
        fs::write(tmp.path().join("in/broken.png"), b"\x89PNG\r\n\x1a\nnope").unwrap();
        let out = tmp.path().join("out");

        let report = run_batch(
            &size_pipeline(),
            &tmp.path().join("in"),
            &out,
            &ParameterSet::new(),
            None,
        )
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].source.ends_with("broken.png"));
        assert_eq!(report.to_string(), "2 processed, 1 failed");
    }

    #[test]
    fn batch_sends_events() {
        let tmp = setup_tree();
        let (tx, rx) = std::sync::mpsc::channel();
        run_batch(
            &size_pipeline(),
            &tmp.path().join("in"),
            &tmp.path().join("out"),
            &ParameterSet::new(),
            Some(tx),
        )
        .unwrap();

        let events: Vec<BatchEvent> = rx.iter().collect();
        assert_eq!(events[0], BatchEvent::Started { total: 2 });
        let done = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::ImageDone { .. }))
            .count();
        assert_eq!(done, 2);
    }

    #[test]
    fn report_is_written_as_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports/batch.json");
        let report = BatchReport {
            processed: 4,
            failed: vec![BatchFailure {
                source: PathBuf::from("in/broken.png"),
                error: "decode failed".into(),
            }],
        };

        write_report(&report, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"processed\": 4"));
        let loaded: BatchReport = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, report);
    }
}
