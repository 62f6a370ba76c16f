use crate::config::BridgeConfig;
use crate::entry::DataEntry;
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::model::{Classifier, Prediction};
use crate::sink::TriggerSink;
use crate::source::SampleSource;
use crate::trigger::{Debouncer, Trigger};
use crate::window::{WindowStatus, Windower};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of one classified window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub time: f64,
    pub prediction: Prediction,
    pub trigger: Trigger,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: u64,
    pub windows: u64,
    pub fires: u64,
}

/// Windower, extractor, classifier and debouncer for one stream.
pub struct Pipeline {
    windower: Windower,
    extractor: FeatureExtractor,
    classifier: Box<dyn Classifier>,
    debouncer: Debouncer,
}

impl Pipeline {
    pub fn new(config: &BridgeConfig, classifier: Box<dyn Classifier>) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline {
            windower: Windower::new(config.window_size)?,
            extractor: FeatureExtractor::new(config.window_size, config.feature_count)?,
            classifier,
            debouncer: Debouncer::new(config.cooldown_secs),
        })
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Pushes one sample; classifies when the window is full.
    pub fn process(&mut self, entry: &DataEntry) -> Result<Option<Decision>> {
        let window_size = self.windower.window_size();
        let window = match self.windower.push(entry.amplitude) {
            WindowStatus::Filling(count) => {
                trace!("window filling {}/{}", count, window_size);
                return Ok(None);
            }
            WindowStatus::Full(window) => window,
        };
        let features = self.extractor.extract(window);
        let prediction = self.classifier.predict(&features)?;
        let trigger = self.debouncer.update(prediction.label, entry.time);
        Ok(Some(Decision {
            time: entry.time,
            prediction,
            trigger,
        }))
    }

    /// Pulls samples until the source ends or `running` is cleared.
    pub fn run(&mut self, source: &mut dyn SampleSource, sink: &mut dyn TriggerSink, running: &AtomicBool) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let result = self.drive(source, sink, running, &mut summary);
        // flush whatever was written even when the loop failed
        let flushed = sink.finish();
        info!(
            "Processed {} samples, {} windows, {} claps",
            summary.samples, summary.windows, summary.fires
        );
        result?;
        flushed?;
        Ok(summary)
    }

    fn drive(
        &mut self,
        source: &mut dyn SampleSource,
        sink: &mut dyn TriggerSink,
        running: &AtomicBool,
        summary: &mut RunSummary,
    ) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            let Some(entry) = source.next_entry()? else {
                debug!("Source exhausted");
                return Ok(());
            };
            summary.samples += 1;
            if let Some(decision) = self.process(&entry)? {
                summary.windows += 1;
                if decision.trigger.fired() {
                    info!(
                        "Clap detected at {:.3}s (confidence {:.2})",
                        decision.time, decision.prediction.confidence
                    );
                    summary.fires += 1;
                }
                sink.emit(decision.trigger)?;
            }
        }
        info!("Stop requested");
        Ok(())
    }
}
