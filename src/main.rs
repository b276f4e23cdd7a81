use clap::{Parser, Subcommand};
use glidekit::color::{self, ColorNormalizer, ReferenceProfile};
use glidekit::imaging::{ManipulatorChain, ParameterSet};
use glidekit::pipeline::Pipeline;
use glidekit::{batch, config, logging, output};
use std::path::PathBuf;

/// Manipulation parameters shared by `run` and `batch`.
#[derive(clap::Args, Clone)]
struct ParamArgs {
    /// Manipulation parameter as key=value (repeatable), e.g. -p w=300
    #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Parameters as a query string, e.g. "w=300&fit=crop". -p values win.
    #[arg(long)]
    query: Option<String>,
}

impl ParamArgs {
    fn to_parameter_set(&self) -> ParameterSet {
        let mut set = self
            .query
            .as_deref()
            .map(ParameterSet::parse_query)
            .unwrap_or_default();
        for (key, value) in &self.params {
            set.insert(key.clone(), value.clone());
        }
        set
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

#[derive(Parser)]
#[command(name = "glidekit")]
#[command(about = "Color-normalizing image manipulation pipeline")]
#[command(long_about = "\
Color-normalizing image manipulation pipeline

Every image is first brought into the sRGB reference profile, then run
through the configured manipulators in order, then encoded.

  input ──► normalize to sRGB ──► orientation ──► crop ──► size ──► … ──► encode

Parameters use the usual image-server names:

  glidekit run photo.jpg -o thumb.jpg -p w=300 -p h=300 -p fit=crop
  glidekit run photo.jpg -o small.webp --query 'w=800&fm=webp&q=80'
  glidekit batch photos/ -o out/ -p p=thumb      # preset from config

Run 'glidekit manipulators' to list the chain and the parameters each step
reads. Run 'glidekit gen-config' to generate a documented glidekit.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./glidekit.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one image
    Run {
        /// Source image
        input: PathBuf,
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Process every image under a directory in parallel
    Batch {
        /// Source directory
        input: PathBuf,
        /// Destination directory (mirrors the source tree)
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the batch report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Show an image's color space and embedded profile
    Inspect {
        /// Source image
        input: PathBuf,
    },
    /// List the configured manipulator chain
    Manipulators,
    /// Print a stock glidekit.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?;
    logging::init_logging(&config.logging.level, cli.verbose);

    match cli.command {
        Command::Run {
            input,
            output: output_path,
            params,
        } => {
            let pipeline = Pipeline::from_config(&config)?;
            let source = std::fs::read(&input)?;
            let rendered = pipeline.render(&source, &params.to_parameter_set())?;
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output_path, &rendered.bytes)?;
            output::print_run_output(&input, &output_path, &rendered);
        }
        Command::Batch {
            input,
            output: output_dir,
            report: report_path,
            params,
        } => {
            init_thread_pool(&config.processing);
            let pipeline = Pipeline::from_config(&config)?;
            let (tx, rx) = std::sync::mpsc::channel();
            let (input_root, output_root) = (input.clone(), output_dir.clone());
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(
                        &event,
                        Some(&input_root),
                        Some(&output_root),
                    ) {
                        println!("{}", line);
                    }
                }
            });
            let report = batch::run_batch(
                &pipeline,
                &input,
                &output_dir,
                &params.to_parameter_set(),
                Some(tx),
            )?;
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_batch_report(&report);
            if let Some(path) = report_path {
                batch::write_report(&report, &path)?;
            }
            if !report.is_success() {
                return Err(format!("{} image(s) failed", report.failed.len()).into());
            }
        }
        Command::Inspect { input } => {
            let bytes = std::fs::read(&input)?;
            let profile = color::inspect(&bytes)?;
            let reference =
                ReferenceProfile::global(config.color.reference_profile.as_deref())?;
            let normalizer = ColorNormalizer::new(reference);
            output::print_inspect(&input, &profile, normalizer.needs_conversion(&profile));
        }
        Command::Manipulators => {
            let chain = ManipulatorChain::from_names(&config.manipulators, &config.limits)?;
            output::print_manipulators(&chain);
        }
        // Printed before config loading
        Command::GenConfig => {}
    }

    Ok(())
}

/// Size the global rayon pool from `[processing] max_processes`.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
