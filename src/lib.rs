pub mod cli;
pub mod config;
pub mod dataset;
pub mod entry;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod serial;
pub mod sink;
pub mod source;
pub mod trigger;
pub mod window;


/// Largest window the ring buffer can hold.
pub const MAX_WINDOW_SIZE: usize = 4096;

pub use config::BridgeConfig;
pub use entry::{DataEntry, EntryValue};
pub use error::{BridgeError, Result};
pub use features::FeatureExtractor;
pub use model::{load_classifier, Classifier, Prediction};
pub use pipeline::{Pipeline, RunSummary};
pub use sink::{ByteSink, OutputSpec, TriggerSink};
pub use source::{open_source, SampleSource, SourceSpec};
pub use trigger::{Debouncer, Trigger};
