use crate::entry::{DataEntry, EntryValue, MIC_VALUE_LABEL, TIME_LABEL, VALUE_LABEL};
use crate::error::Result;
use crate::source::SampleSource;
use log::{debug, info};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Writes labeled rows under the `time,mic_value,label` header.
///
/// Every row is flushed as soon as it is written, so a recording cut short
/// by an error is still a complete CSV file.
pub struct Recorder<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> Recorder<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        writer.write_record([TIME_LABEL, MIC_VALUE_LABEL, VALUE_LABEL])?;
        writer.flush()?;
        Ok(Recorder { writer, rows: 0 })
    }

    pub fn write(&mut self, entry: &DataEntry) -> Result<()> {
        self.writer.serialize(entry)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}

/// Copies samples from `source` to `recorder`, stamping every row with `label`.
///
/// Stops once `seconds` of stream time have passed, when the source ends, or
/// when `running` is cleared.
pub fn record<W: Write>(
    source: &mut dyn SampleSource,
    recorder: &mut Recorder<W>,
    seconds: Option<f64>,
    label: i64,
    running: &AtomicBool,
) -> Result<u64> {
    match seconds {
        Some(s) => info!("Recording for {}s (label={})", s, label),
        None => info!("Recording until the source ends (label={})", label),
    }
    while running.load(Ordering::SeqCst) {
        let Some(entry) = source.next_entry()? else {
            debug!("Source exhausted");
            break;
        };
        if seconds.is_some_and(|s| entry.time >= s) {
            debug!("Reached {:.3}s, stopping", entry.time);
            break;
        }
        recorder.write(&DataEntry::new(entry.time, entry.amplitude, EntryValue::Label(label)))?;
    }
    info!("Saved {} rows", recorder.rows());
    Ok(recorder.rows())
}
