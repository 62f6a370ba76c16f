//! Command-line front end: argument parsing, config layering and wiring.

use crate::config::BridgeConfig;
use crate::dataset::export_features;
use crate::error::Result;
use crate::features::FeatureScheme;
use crate::model::load_classifier;
use crate::pipeline::Pipeline;
use crate::record::{record, Recorder};
use crate::sink::{open_output, shared_link, ByteSink, OutputSpec};
use crate::source::{open_link, open_source, SampleSource, SourceSpec};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

pub const RECORDINGS_DIR: &str = "recordings";

#[derive(Debug, Parser)]
#[command(
    name = "clapbridge",
    about = "Arduino microphone to clap-trigger bridge",
    version
)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON file with default settings; flags override it
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify the stream and write a trigger byte per window
    Run(RunArgs),
    /// Save labeled raw samples to CSV for training
    Record(RecordArgs),
    /// Turn a recording into a table of feature vectors
    Features(FeaturesArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// serial:COMPORT | file:PATH | microphone:[default | index:N | name:STR]
    #[arg(short, long, value_name = "SOURCE")]
    pub source: SourceSpec,

    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<u32>,
}

#[derive(Debug, Args)]
pub struct WindowArgs {
    /// Samples per window
    #[arg(short, long)]
    pub window_size: Option<usize>,

    /// Features per window
    #[arg(short, long)]
    pub feature_count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// stdout | serial:COMPORT | file:PATH
    #[arg(short, long, default_value = "stdout", value_name = "OUTPUT")]
    pub output: OutputSpec,

    /// Model file (.onnx or logistic regression .json)
    #[arg(short, long, default_value = "./models/model.onnx", value_name = "MODEL_PATH")]
    pub model: PathBuf,

    /// Seconds between two triggers
    #[arg(short, long)]
    pub cooldown: Option<f64>,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Where to write the CSV, defaults to a timestamped file under recordings/
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<OutputSpec>,

    /// Seconds of stream time to record
    #[arg(short = 't', long = "time", value_name = "SECONDS")]
    pub seconds: Option<f64>,

    /// Label stored with every row (1 = clap, 0 = noise)
    #[arg(short, long, default_value_t = 0)]
    pub label: i64,
}

#[derive(Debug, Args)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub window: WindowArgs,

    /// stdout | serial:COMPORT | file:PATH
    #[arg(short, long, default_value = "stdout", value_name = "OUTPUT")]
    pub output: OutputSpec,

    #[arg(long, value_enum, default_value_t = FeatureScheme::Sliding)]
    pub scheme: FeatureScheme,
}

impl SourceArgs {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
    }
}

impl WindowArgs {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(window_size) = self.window_size {
            config.window_size = window_size;
        }
        if let Some(feature_count) = self.feature_count {
            config.feature_count = feature_count;
        }
    }
}

pub fn default_recording_output() -> OutputSpec {
    let ts = Utc::now().format("%y%m%d-%H%M%S");
    OutputSpec::File {
        path: PathBuf::from(format!("{RECORDINGS_DIR}/recording_{ts}.csv")),
    }
}

/// Resolves the final config: defaults, then the config file, then flags.
pub fn resolve_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    match &cli.command {
        Command::Run(args) => {
            args.source.apply(&mut config);
            args.window.apply(&mut config);
            if let Some(cooldown) = args.cooldown {
                config.cooldown_secs = cooldown;
            }
        }
        Command::Record(args) => args.source.apply(&mut config),
        Command::Features(args) => {
            args.source.apply(&mut config);
            args.window.apply(&mut config);
        }
    }
    config.validate()?;
    Ok(config)
}

/// Opens the source, then the output. An output on the source's serial port
/// writes through the same device.
fn open_io(source: &SourceSpec, output: &OutputSpec, config: &BridgeConfig) -> Result<(Box<dyn SampleSource>, Box<dyn Write>)> {
    let link = open_link(source, config)?;
    let shared = shared_link(output, link.as_ref())?;
    let source = open_source(source, link)?;
    let out = open_output(output, shared, config)?;
    Ok((source, out))
}

pub fn execute(cli: Cli, running: &AtomicBool) -> Result<()> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Run(args) => {
            let classifier = load_classifier(&args.model, config.feature_count)?;
            let mut pipeline = Pipeline::new(&config, classifier)?;
            let (mut source, out) = open_io(&args.source.source, &args.output, &config)?;
            let mut sink = ByteSink::new(out);
            info!(
                "Listening for claps on {} (window {}, {} features, cooldown {}s)",
                args.source.source, config.window_size, config.feature_count, config.cooldown_secs
            );
            pipeline.run(&mut source, &mut sink, running)?;
        }
        Command::Record(args) => {
            let output = args.output.unwrap_or_else(default_recording_output);
            let (mut source, out) = open_io(&args.source.source, &output, &config)?;
            let mut recorder = Recorder::new(out)?;
            record(&mut source, &mut recorder, args.seconds, args.label, running)?;
            info!("Recording written to {}", output);
        }
        Command::Features(args) => {
            let (mut source, out) = open_io(&args.source.source, &args.output, &config)?;
            export_features(
                &mut source,
                out,
                args.scheme,
                config.window_size,
                config.feature_count,
                running,
            )?;
        }
    }
    Ok(())
}
