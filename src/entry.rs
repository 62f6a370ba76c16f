use crate::window::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TIME_LABEL: &str = "time";
pub const MIC_VALUE_LABEL: &str = "mic_value";
pub const VALUE_LABEL: &str = "label";

/// Third column of a recording: a supervised label or a clap confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryValue {
    Label(i64),
    Confidence(f64),
}

impl EntryValue {
    pub fn as_label(&self) -> u8 {
        match *self {
            EntryValue::Label(l) => u8::from(l == 1),
            EntryValue::Confidence(c) => u8::from(c >= 0.5),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(l) = raw.parse::<i64>() {
            return Some(EntryValue::Label(l));
        }
        raw.parse::<f64>().ok().filter(|c| c.is_finite()).map(EntryValue::Confidence)
    }
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryValue::Label(l) => write!(f, "{l}"),
            EntryValue::Confidence(c) => write!(f, "{c}"),
        }
    }
}

/// One sample with its stream time, as recorded to or replayed from CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub time: f64,
    #[serde(rename = "mic_value")]
    pub amplitude: Sample,
    #[serde(rename = "label")]
    pub value: EntryValue,
}

impl DataEntry {
    pub fn new(time: f64, amplitude: Sample, value: EntryValue) -> Self {
        DataEntry { time, amplitude, value }
    }

    /// Entry for a live sample that carries no label.
    pub fn unlabeled(time: f64, amplitude: Sample) -> Self {
        DataEntry::new(time, amplitude, EntryValue::Label(0))
    }

    pub fn from_fields(time: &str, amplitude: &str, value: &str) -> Option<Self> {
        let time = time.trim().parse::<f64>().ok().filter(|t| t.is_finite() && *t >= 0.0)?;
        let amplitude = amplitude.trim().parse::<Sample>().ok()?;
        let value = EntryValue::parse(value)?;
        Some(DataEntry::new(time, amplitude, value))
    }
}

pub fn is_header(fields: &[&str]) -> bool {
    fields.len() == 3
        && fields[0].trim() == TIME_LABEL
        && fields[1].trim() == MIC_VALUE_LABEL
        && fields[2].trim() == VALUE_LABEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_label_and_confidence_rows() {
        let labeled = DataEntry::from_fields("0.5", "512", "1").unwrap();
        assert_eq!(labeled.value, EntryValue::Label(1));
        assert_eq!(labeled.amplitude, 512);

        let scored = DataEntry::from_fields("1.25", "-3", "0.75").unwrap();
        assert_eq!(scored.value, EntryValue::Confidence(0.75));
        assert_eq!(scored.value.as_label(), 1);
    }

    #[test]
    fn rejects_mangled_fields() {
        assert!(DataEntry::from_fields("abc", "1", "0").is_none());
        assert!(DataEntry::from_fields("0.1", "1.5", "0").is_none());
        assert!(DataEntry::from_fields("0.1", "1", "").is_none());
        assert!(DataEntry::from_fields("-1.0", "1", "0").is_none());
        assert!(DataEntry::from_fields("NaN", "1", "0").is_none());
    }

    #[test]
    fn confidence_threshold() {
        assert_eq!(EntryValue::Confidence(0.49).as_label(), 0);
        assert_eq!(EntryValue::Confidence(0.5).as_label(), 1);
        assert_eq!(EntryValue::Label(0).as_label(), 0);
        assert_eq!(EntryValue::Label(2).as_label(), 0);
    }

    #[test]
    fn csv_round_trip() {
        let entries = vec![
            DataEntry::new(0.0, 12, EntryValue::Label(1)),
            DataEntry::new(0.0123456789, -40, EntryValue::Label(0)),
            DataEntry::new(3.5, 1023, EntryValue::Confidence(0.8125)),
        ];
        let mut writer = csv::Writer::from_writer(vec![]);
        for e in &entries {
            writer.serialize(e).unwrap();
        }
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(text.starts_with("time,mic_value,label\n"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let parsed: Vec<DataEntry> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(parsed.len(), entries.len());
        for (a, b) in parsed.iter().zip(&entries) {
            assert_relative_eq!(a.time, b.time, epsilon = 1e-12);
            assert_eq!(a.amplitude, b.amplitude);
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn header_detection() {
        assert!(is_header(&["time", "mic_value", "label"]));
        assert!(!is_header(&["0.1", "5", "0"]));
    }
}
