//! End-to-end pipeline scenarios through the public API.
//!
//! Source images are synthesized in memory: a gradient, optionally tagged
//! with a linear BT.2020 profile so that normalization has real work to do.

use glidekit::color::{self, ColorNormalizer, ColorSpace, ReferenceProfile};
use glidekit::imaging::{
    ConfigurationError, DecodedImage, EncodeOptions, ImageCodec, ManipulationError, Manipulator,
    ManipulatorChain, ManipulatorLimits, ParameterSet, Quality, RustCodec, Stage, passthrough,
    stage_fn,
};
use glidekit::{Pipeline, PipelineError};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lcms2::{CIExyY, CIExyYTRIPLE, Profile, ToneCurve};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn xy(x: f64, y: f64) -> CIExyY {
    CIExyY { x, y, Y: 1.0 }
}

fn wide_gamut_icc() -> Vec<u8> {
    let primaries = CIExyYTRIPLE {
        Red: xy(0.708, 0.292),
        Green: xy(0.170, 0.797),
        Blue: xy(0.131, 0.046),
    };
    let linear = ToneCurve::new(1.0);
    Profile::new_rgb(&xy(0.3127, 0.3290), &primaries, &[&linear, &linear, &linear])
        .unwrap()
        .icc()
        .unwrap()
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 90])
    }))
}

fn encode(pixels: DynamicImage, format: ImageFormat, icc: Option<&[u8]>) -> Vec<u8> {
    RustCodec::new()
        .encode(
            &DecodedImage::new(pixels, format),
            &EncodeOptions {
                format,
                quality: Quality::new(95),
                icc_profile: icc,
            },
        )
        .unwrap()
}

fn normalizer() -> ColorNormalizer {
    ColorNormalizer::new(Arc::new(ReferenceProfile::builtin().unwrap()))
}

fn pipeline_with(names: &[&str]) -> Pipeline {
    let chain = ManipulatorChain::from_names(names, &ManipulatorLimits::default()).unwrap();
    Pipeline::new(normalizer(), chain)
}

fn params(pairs: &[(&str, &str)]) -> ParameterSet {
    pairs.iter().copied().collect()
}

// =========================================================================
// Color normalization before manipulation
// =========================================================================

#[test]
fn wide_gamut_jpeg_is_normalized_and_resized() {
    let icc = wide_gamut_icc();
    let source = encode(gradient(200, 100), ImageFormat::Jpeg, Some(&icc));
    assert!(normalizer().needs_conversion(&color::inspect(&source).unwrap()));

    let output = pipeline_with(&["size"])
        .run(&source, &params(&[("w", "100")]))
        .unwrap();

    let profile = color::inspect(&output).unwrap();
    assert_eq!(profile.format, ImageFormat::Jpeg);
    assert_eq!(profile.color_space, ColorSpace::Srgb);
    assert!(!normalizer().needs_conversion(&profile));
    let decoded = image::load_from_memory(&output).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));
}

#[test]
fn srgb_png_through_empty_chain_keeps_pixels() {
    let pixels = gradient(32, 16);
    let source = encode(pixels.clone(), ImageFormat::Png, None);

    let output = Pipeline::new(normalizer(), ManipulatorChain::empty())
        .run(&source, &ParameterSet::new())
        .unwrap();

    let decoded = image::load_from_memory_with_format(&output, ImageFormat::Png).unwrap();
    assert_eq!(decoded.to_rgb8(), pixels.to_rgb8());
}

#[test]
fn gray_source_reaches_manipulators_as_rgb() {
    struct ColorRecorder(Arc<Mutex<Vec<bool>>>);

    impl Manipulator for ColorRecorder {
        fn name(&self) -> &str {
            "color-recorder"
        }

        fn set_params(&self, _: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
            let seen = Arc::clone(&self.0);
            Ok(stage_fn(move |image: DecodedImage| {
                seen.lock().unwrap().push(image.pixels.color().has_color());
                Ok(image)
            }))
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let chain = ManipulatorChain::new(vec![Box::new(ColorRecorder(Arc::clone(&seen)))]);
    let gray = DynamicImage::ImageLuma8(gradient(16, 16).to_luma8());
    let source = encode(gray, ImageFormat::Png, None);
    assert_eq!(
        color::inspect(&source).unwrap().color_space,
        ColorSpace::Gray
    );

    Pipeline::new(normalizer(), chain)
        .run(&source, &ParameterSet::new())
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![true]);
}

// =========================================================================
// Chain configuration and failure
// =========================================================================

#[test]
fn unknown_manipulator_is_a_configuration_error() {
    let err = ManipulatorChain::from_names(&["size", "vignette"], &ManipulatorLimits::default())
        .unwrap_err();
    assert_eq!(err, ConfigurationError::UnknownManipulator("vignette".into()));
}

/// Counts runs; fails when `fail` is set.
struct Step {
    name: &'static str,
    runs: Arc<AtomicUsize>,
    fail: bool,
}

impl Manipulator for Step {
    fn name(&self) -> &str {
        self.name
    }

    fn set_params(&self, _: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
        let runs = Arc::clone(&self.runs);
        let (name, fail) = (self.name, self.fail);
        Ok(stage_fn(move |image| {
            runs.fetch_add(1, Ordering::SeqCst);
            if fail {
                return Err(ManipulationError::Failed {
                    stage: name.to_string(),
                    message: "refused".into(),
                });
            }
            Ok(image)
        }))
    }
}

#[test]
fn failure_mid_chain_stops_later_steps() {
    let counters: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let steps: Vec<Box<dyn Manipulator>> = ["first", "second", "third"]
        .into_iter()
        .zip(&counters)
        .map(|(name, runs)| {
            Box::new(Step {
                name,
                runs: Arc::clone(runs),
                fail: name == "second",
            }) as Box<dyn Manipulator>
        })
        .collect();
    let source = encode(gradient(8, 8), ImageFormat::Png, None);

    let err = Pipeline::new(normalizer(), ManipulatorChain::new(steps))
        .run(&source, &ParameterSet::new())
        .unwrap_err();

    match err {
        PipelineError::Manipulation(e) => assert_eq!(e.stage(), "second"),
        other => panic!("expected manipulation error, got {other:?}"),
    }
    let runs: Vec<usize> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(runs, vec![1, 1, 0]);
}

#[test]
fn malformed_parameter_names_the_step() {
    let source = encode(gradient(8, 8), ImageFormat::Png, None);
    let err = pipeline_with(&["size", "brightness"])
        .run(&source, &params(&[("bri", "loud")]))
        .unwrap_err();
    match err {
        PipelineError::Manipulation(e) => assert_eq!(e.stage(), "brightness"),
        other => panic!("expected manipulation error, got {other:?}"),
    }
}

#[test]
fn absent_parameters_make_every_builtin_a_passthrough() {
    let pixels = gradient(24, 12);
    let source = encode(pixels.clone(), ImageFormat::Png, None);

    let chain = ManipulatorChain::default_chain(&ManipulatorLimits::default());
    let output = Pipeline::new(normalizer(), chain)
        .run(&source, &ParameterSet::new())
        .unwrap();

    let decoded = image::load_from_memory(&output).unwrap();
    assert_eq!(decoded.to_rgb8(), pixels.to_rgb8());
}

#[test]
fn passthrough_stage_from_custom_manipulator() {
    struct Noop;

    impl Manipulator for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn set_params(&self, _: &ParameterSet) -> Result<Box<dyn Stage>, ManipulationError> {
            Ok(passthrough())
        }
    }

    let source = encode(gradient(8, 4), ImageFormat::Png, None);
    let rendered = Pipeline::new(normalizer(), ManipulatorChain::new(vec![Box::new(Noop)]))
        .render(&source, &ParameterSet::new())
        .unwrap();
    assert_eq!((rendered.width, rendered.height), (8, 4));
}

// =========================================================================
// Parameters, presets and output selection
// =========================================================================

#[test]
fn presets_and_format_override() {
    let presets = BTreeMap::from([("thumb".to_string(), params(&[("w", "20"), ("h", "20")]))]);
    let pipeline = pipeline_with(&["size"]).with_parameters(params(&[("fit", "crop")]), presets);
    let source = encode(gradient(80, 40), ImageFormat::Jpeg, None);

    let rendered = pipeline
        .render(&source, &params(&[("p", "thumb"), ("fm", "png")]))
        .unwrap();

    assert_eq!(rendered.format, ImageFormat::Png);
    assert_eq!((rendered.width, rendered.height), (20, 20));
    assert_eq!(
        image::guess_format(&rendered.bytes).unwrap(),
        ImageFormat::Png
    );
}

// =========================================================================
// Sharing one pipeline
// =========================================================================

#[test]
fn concurrent_runs_share_one_pipeline() {
    let pipeline = pipeline_with(&["size", "blur"]);
    let icc = wide_gamut_icc();
    let source = encode(gradient(120, 60), ImageFormat::Jpeg, Some(&icc));

    let widths: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = [10u32, 20, 30, 40]
            .into_iter()
            .map(|w| {
                let (pipeline, source) = (&pipeline, &source);
                scope.spawn(move || {
                    let w = w.to_string();
                    pipeline
                        .render(source, &params(&[("w", w.as_str()), ("blur", "2")]))
                        .unwrap()
                        .width
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(widths, vec![10, 20, 30, 40]);
}

#[test]
fn garbage_input_is_rejected_before_any_step() {
    let runs = Arc::new(AtomicUsize::new(0));
    let chain = ManipulatorChain::new(vec![Box::new(Step {
        name: "first",
        runs: Arc::clone(&runs),
        fail: false,
    })]);

    let result = Pipeline::new(normalizer(), chain).run(b"not an image", &ParameterSet::new());

    assert!(result.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}
