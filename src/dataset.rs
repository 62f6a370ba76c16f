//! Feature tables for offline training.

use crate::entry::VALUE_LABEL;
use crate::error::Result;
use crate::features::{check_dimensions, frame_average_features, FeatureExtractor, FeatureScheme};
use crate::source::SampleSource;
use crate::window::{Sample, WindowStatus, Windower};
use log::info;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

fn header(feature_count: usize) -> Vec<String> {
    (0..feature_count)
        .map(|i| format!("f{i}"))
        .chain(std::iter::once(VALUE_LABEL.to_string()))
        .collect()
}

fn write_row<W: Write>(writer: &mut csv::Writer<W>, features: &[f32], label: u8) -> Result<()> {
    let row: Vec<String> = features
        .iter()
        .map(|f| f.to_string())
        .chain(std::iter::once(label.to_string()))
        .collect();
    writer.write_record(&row)?;
    Ok(())
}

/// Writes `f0..f{F-1},label` rows for a recording; returns the row count.
pub fn export_features<W: Write>(
    source: &mut dyn SampleSource,
    out: W,
    scheme: FeatureScheme,
    window_size: usize,
    feature_count: usize,
    running: &AtomicBool,
) -> Result<u64> {
    check_dimensions(window_size, feature_count)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(header(feature_count))?;

    let rows = match scheme {
        FeatureScheme::Sliding => {
            let mut windower = Windower::new(window_size)?;
            let mut extractor = FeatureExtractor::new(window_size, feature_count)?;
            let mut rows = 0;
            while running.load(Ordering::SeqCst) {
                let Some(entry) = source.next_entry()? else { break };
                if let WindowStatus::Full(window) = windower.push(entry.amplitude) {
                    let features = extractor.extract(window);
                    write_row(&mut writer, &features, entry.value.as_label())?;
                    rows += 1;
                }
            }
            rows
        }
        FeatureScheme::FrameAverage => {
            let mut signal: Vec<Sample> = vec![];
            let mut label = None;
            while running.load(Ordering::SeqCst) {
                let Some(entry) = source.next_entry()? else { break };
                label.get_or_insert(entry.value.as_label());
                signal.push(entry.amplitude);
            }
            match label {
                Some(label) => {
                    let features = frame_average_features(&signal, window_size, feature_count);
                    write_row(&mut writer, &features, label)?;
                    1
                }
                None => 0,
            }
        }
    };
    writer.flush()?;
    info!("Exported {} feature rows ({:?})", rows, scheme);
    Ok(rows)
}
