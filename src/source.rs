//! Where raw microphone readings come from
//!
//! Every source yields [`DataEntry`] values in arrival order and swallows
//! malformed input itself: the pipeline only ever sees valid samples.

use crate::config::BridgeConfig;
use crate::entry::{is_header, DataEntry};
use crate::error::{BridgeError, Result};
use crate::serial::SerialLink;
use crate::window::Sample;
use log::{debug, info, trace, warn};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicrophoneSelector {
    Default,
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Serial { port: String },
    File { path: PathBuf },
    Microphone(MicrophoneSelector),
}

impl FromStr for SourceSpec {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (scheme, rest) = match s.split_once(':') {
            Some((scheme, rest)) => (scheme, Some(rest)),
            None => (s, None),
        };
        let rest = rest.filter(|r| !r.is_empty());
        match (scheme, rest) {
            ("", _) => Err(BridgeError::InvalidConfig("empty source".to_string())),
            ("serial", Some(port)) => Ok(SourceSpec::Serial { port: port.to_string() }),
            ("serial", None) => Err(BridgeError::InvalidConfig("serial: requires a COMPORT, eg. serial:COM0".to_string())),
            ("file", Some(path)) => Ok(SourceSpec::File { path: PathBuf::from(path) }),
            ("file", None) => Err(BridgeError::InvalidConfig("file: requires a PATH, eg. file:./data.csv".to_string())),
            ("microphone", rest) => parse_microphone(rest).map(SourceSpec::Microphone),
            (other, _) => Err(BridgeError::InvalidConfig(format!("unknown source method {other:?} in {s:?}"))),
        }
    }
}

fn parse_microphone(rest: Option<&str>) -> Result<MicrophoneSelector> {
    let Some(rest) = rest else {
        return Err(BridgeError::InvalidConfig(
            "microphone: requires a submethod eg. microphone:default".to_string(),
        ));
    };
    let (method, arg) = match rest.split_once(':') {
        Some((method, arg)) => (method, Some(arg).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    match (method, arg) {
        ("default", None) => Ok(MicrophoneSelector::Default),
        ("index", Some(i)) => i
            .parse()
            .map(MicrophoneSelector::Index)
            .map_err(|_| BridgeError::InvalidConfig(format!("{i:?} is not a number in \"microphone:index:{i}\""))),
        ("index", None) => Err(BridgeError::InvalidConfig(
            "microphone:index requires a number, eg. microphone:index:0".to_string(),
        )),
        ("name", Some(name)) => Ok(MicrophoneSelector::Name(name.to_string())),
        ("name", None) => Err(BridgeError::InvalidConfig(
            "microphone:name requires a (sub)string of the device name, eg. microphone:name:built-in".to_string(),
        )),
        _ => Err(BridgeError::InvalidConfig(format!("unknown microphone method {rest:?}"))),
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Serial { port } => write!(f, "serial:{port}"),
            SourceSpec::File { path } => write!(f, "file:{}", path.display()),
            SourceSpec::Microphone(MicrophoneSelector::Default) => write!(f, "microphone:default"),
            SourceSpec::Microphone(MicrophoneSelector::Index(i)) => write!(f, "microphone:index:{i}"),
            SourceSpec::Microphone(MicrophoneSelector::Name(n)) => write!(f, "microphone:name:{n}"),
        }
    }
}

pub trait SampleSource {
    /// Next valid entry, or `None` once the stream has ended.
    fn next_entry(&mut self) -> Result<Option<DataEntry>>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_entry(&mut self) -> Result<Option<DataEntry>> {
        (**self).next_entry()
    }
}

/// In-memory source, for replaying entries that are already parsed.
pub struct EntrySource<I> {
    entries: I,
}

impl<I: Iterator<Item = DataEntry>> EntrySource<I> {
    pub fn new(entries: impl IntoIterator<IntoIter = I>) -> Self {
        EntrySource { entries: entries.into_iter() }
    }
}

impl<I: Iterator<Item = DataEntry>> SampleSource for EntrySource<I> {
    fn next_entry(&mut self) -> Result<Option<DataEntry>> {
        Ok(self.entries.next())
    }
}

/// Seconds since the stream was opened.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch(Instant);

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch(Instant::now())
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.0.elapsed().as_secs_f64()
    }
}

/// Longest line worth parsing: an `i32` reading plus sign, padding and `\r\n`.
pub const MAX_LINE_LEN: usize = 32;

/// Newline-delimited integer readings, as an Arduino prints them.
///
/// A read timeout hands back whatever partial line is buffered, the way a
/// serial `readline` does; a timeout with nothing buffered ends the stream.
/// Lines longer than [`MAX_LINE_LEN`] are dropped up to the next newline.
pub struct LineSource<R> {
    reader: R,
    line: Vec<u8>,
    overlong: bool,
    clock: Stopwatch,
    dropped: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            reader,
            line: Vec::with_capacity(MAX_LINE_LEN),
            overlong: false,
            clock: Stopwatch::start(),
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub fn parse_sample(line: &str) -> Option<Sample> {
    line.trim().parse::<Sample>().ok()
}

impl<R: BufRead> SampleSource for LineSource<R> {
    fn next_entry(&mut self) -> Result<Option<DataEntry>> {
        loop {
            let limit = (MAX_LINE_LEN - self.line.len()) as u64;
            match (&mut self.reader).take(limit).read_until(b'\n', &mut self.line) {
                Ok(0) if self.line.is_empty() => return Ok(None),
                Ok(_) if self.line.len() >= MAX_LINE_LEN && !self.line.ends_with(b"\n") => {
                    if !self.overlong {
                        trace!("Dropping line longer than {} bytes", MAX_LINE_LEN);
                        self.overlong = true;
                        self.dropped += 1;
                    }
                    self.line.clear();
                    continue;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    if self.line.is_empty() {
                        debug!("No data before read timeout, ending stream");
                        self.overlong = false;
                        return Ok(None);
                    }
                    trace!("Read timed out with {} bytes pending", self.line.len());
                }
                Err(e) => return Err(e.into()),
            }

            // the tail of an overlong line was already counted
            let sample = if std::mem::take(&mut self.overlong) {
                None
            } else {
                let text = String::from_utf8_lossy(&self.line);
                let sample = parse_sample(&text);
                if sample.is_none() {
                    trace!("Dropped line {:?}", text);
                    self.dropped += 1;
                }
                sample
            };
            self.line.clear();
            if let Some(sample) = sample {
                return Ok(Some(DataEntry::unlabeled(self.clock.elapsed_secs(), sample)));
            }
        }
    }
}

/// Replays a recording: `time,mic_value,label` rows or one bare reading per line.
pub struct CsvSource<R> {
    reader: csv::Reader<R>,
    record: csv::ByteRecord,
    clock: Stopwatch,
    last_time: f64,
    row: u64,
}

impl<R: Read> CsvSource<R> {
    pub fn new(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        CsvSource {
            reader,
            record: csv::ByteRecord::new(),
            clock: Stopwatch::start(),
            last_time: 0.0,
            row: 0,
        }
    }

    fn parse_record(&mut self) -> Option<DataEntry> {
        let fields: Vec<String> = self.record.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect();
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        match fields.as_slice() {
            [] | [""] => None,
            [raw] => parse_sample(raw).map(|s| DataEntry::unlabeled(self.clock.elapsed_secs(), s)),
            f if is_header(f) => None,
            [time, amplitude, value] => match DataEntry::from_fields(time, amplitude, value) {
                Some(entry) if entry.time < self.last_time => {
                    warn!("Skipping row {}: time {} goes back from {}", self.row, entry.time, self.last_time);
                    None
                }
                Some(entry) => Some(entry),
                None => {
                    warn!("Could not parse mangled CSV row {}: {:?}", self.row, fields);
                    None
                }
            },
            _ => {
                warn!("Skipping row {} with {} fields: {:?}", self.row, fields.len(), fields);
                None
            }
        }
    }
}

impl<R: Read> SampleSource for CsvSource<R> {
    fn next_entry(&mut self) -> Result<Option<DataEntry>> {
        while self.reader.read_byte_record(&mut self.record)? {
            self.row += 1;
            if let Some(entry) = self.parse_record() {
                self.last_time = entry.time;
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

/// Opens the source. A serial source hands back its link so the output may share it.
pub fn open_source(spec: &SourceSpec, link: Option<SerialLink>) -> Result<Box<dyn SampleSource>> {
    match spec {
        SourceSpec::Serial { port } => {
            let link = link.ok_or_else(|| BridgeError::open("serial port", port.as_str(), "port was not opened"))?;
            Ok(Box::new(LineSource::new(BufReader::new(link))))
        }
        SourceSpec::File { path } => {
            let file = File::open(path).map_err(|e| BridgeError::open("file", path, e))?;
            info!("Replaying {:?}", path);
            Ok(Box::new(CsvSource::new(BufReader::new(file))))
        }
        SourceSpec::Microphone(_) => Err(BridgeError::Unsupported("microphone capture is not implemented".to_string())),
    }
}

/// Opens the serial device behind a serial source, if it has one.
pub fn open_link(spec: &SourceSpec, config: &BridgeConfig) -> Result<Option<SerialLink>> {
    match spec {
        SourceSpec::Serial { port } => SerialLink::open(port, config).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(source: &mut dyn SampleSource) -> Vec<DataEntry> {
        let mut out = vec![];
        while let Some(entry) = source.next_entry().unwrap() {
            out.push(entry);
        }
        out
    }

    #[test]
    fn parses_source_specs() {
        assert_eq!("serial:COM3".parse::<SourceSpec>().unwrap(), SourceSpec::Serial { port: "COM3".into() });
        assert_eq!(
            "file:./x.csv".parse::<SourceSpec>().unwrap(),
            SourceSpec::File { path: PathBuf::from("./x.csv") }
        );
        assert_eq!(
            "file:C:\\data\\x.csv".parse::<SourceSpec>().unwrap(),
            SourceSpec::File { path: PathBuf::from("C:\\data\\x.csv") }
        );
        assert_eq!(
            "microphone:default".parse::<SourceSpec>().unwrap(),
            SourceSpec::Microphone(MicrophoneSelector::Default)
        );
        assert_eq!(
            "microphone:index:2".parse::<SourceSpec>().unwrap(),
            SourceSpec::Microphone(MicrophoneSelector::Index(2))
        );
        assert_eq!(
            "microphone:name:built-in".parse::<SourceSpec>().unwrap(),
            SourceSpec::Microphone(MicrophoneSelector::Name("built-in".into()))
        );
    }

    #[test]
    fn rejects_bad_source_specs() {
        for bad in ["", "serial", "serial:", "file:", "microphone", "microphone:index:x", "microphone:index", "microphone:loud", "tcp:1234"] {
            let err = bad.parse::<SourceSpec>().unwrap_err();
            assert!(matches!(err, BridgeError::InvalidConfig(_)), "{bad:?} gave {err}");
        }
        assert!("tcp:1234".parse::<SourceSpec>().unwrap_err().to_string().contains("tcp"));
    }

    #[test]
    fn display_round_trips() {
        for s in ["serial:/dev/ttyACM0", "file:rec.csv", "microphone:index:1"] {
            assert_eq!(s.parse::<SourceSpec>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn line_source_drops_garbage() {
        let input = "12\r\nabc\n\n-7\n1.5\n\u{fffd}3\n  42  \n99";
        let mut source = LineSource::new(Cursor::new(input.as_bytes().to_vec()));
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![12, -7, 42, 99]);
        assert_eq!(source.dropped(), 4);
    }

    #[test]
    fn line_source_tolerates_invalid_utf8() {
        let mut bytes = b"5\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"6\n");
        let mut source = LineSource::new(Cursor::new(bytes));
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![5, 6]);
    }

    #[test]
    fn line_source_times_are_non_decreasing() {
        let input: String = (0..200).map(|i| format!("{i}\n")).collect();
        let mut source = LineSource::new(Cursor::new(input.into_bytes()));
        let entries = drain(&mut source);
        assert_eq!(entries.len(), 200);
        assert!(entries.windows(2).all(|w| w[0].time <= w[1].time));
    }

    /// Hands out scripted chunks, turning `None` into a read timeout.
    struct ScriptedPort {
        chunks: Vec<Option<&'static [u8]>>,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
            }
            match self.chunks.remove(0) {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    #[test]
    fn timeout_mid_line_returns_the_partial_line() {
        let port = ScriptedPort { chunks: vec![Some(b"10\n1"), None, Some(b"1\n")] };
        let mut source = LineSource::new(BufReader::new(port));
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![10, 1, 1]);
    }

    #[test]
    fn stalled_partial_line_ends_the_stream() {
        // a single chunk, then the port times out forever
        let port = ScriptedPort { chunks: vec![Some(b"12")] };
        let mut source = LineSource::new(BufReader::new(port));
        assert_eq!(source.next_entry().unwrap().unwrap().amplitude, 12);
        assert!(source.next_entry().unwrap().is_none());
    }

    #[test]
    fn garbage_partial_line_is_dropped_on_timeout() {
        let port = ScriptedPort { chunks: vec![Some(b"7\nzz"), None] };
        let mut source = LineSource::new(BufReader::new(port));
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![7]);
        assert_eq!(source.dropped(), 1);
    }

    #[test]
    fn overlong_lines_are_dropped_whole() {
        let mut input = "1\n".to_string();
        input.push_str(&"9".repeat(3 * MAX_LINE_LEN));
        input.push_str("\n2\n");
        input.push_str(&"8".repeat(MAX_LINE_LEN + 1));
        let mut source = LineSource::new(Cursor::new(input.into_bytes()));
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![1, 2]);
        assert_eq!(source.dropped(), 2);
    }

    #[test]
    fn idle_timeout_ends_stream() {
        let port = ScriptedPort { chunks: vec![Some(b"3\n"), None, Some(b"4\n")] };
        let mut source = LineSource::new(BufReader::new(port));
        assert_eq!(source.next_entry().unwrap().unwrap().amplitude, 3);
        assert!(source.next_entry().unwrap().is_none());
    }

    #[test]
    fn csv_source_reads_recordings() {
        let input = "time,mic_value,label\n0.0,500,0\n0.001,510,1\n0.002,oops,1\n0.003,520,0.9\n";
        let mut source = CsvSource::new(input.as_bytes());
        let entries = drain(&mut source);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].amplitude, 510);
        assert_eq!(entries[1].value.as_label(), 1);
        assert_eq!(entries[2].value.as_label(), 1);
    }

    #[test]
    fn csv_source_skips_rows_going_back_in_time() {
        let input = "1.0,1,0\n0.5,2,0\n1.5,3,0\n";
        let mut source = CsvSource::new(input.as_bytes());
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![1, 3]);
    }

    #[test]
    fn csv_source_reads_bare_readings() {
        let input = "100\n\nnoise\n101\n1,2\n102\n";
        let mut source = CsvSource::new(input.as_bytes());
        let samples: Vec<Sample> = drain(&mut source).iter().map(|e| e.amplitude).collect();
        assert_eq!(samples, vec![100, 101, 102]);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let spec = SourceSpec::File { path: PathBuf::from("/nonexistent/rec.csv") };
        let err = open_source(&spec, None).err().unwrap();
        assert!(matches!(err, BridgeError::Open { .. }));
        assert!(err.to_string().contains("rec.csv"));
    }

    #[test]
    fn microphone_is_unsupported() {
        let spec = SourceSpec::Microphone(MicrophoneSelector::Default);
        let err = open_source(&spec, None).err().unwrap();
        assert!(matches!(err, BridgeError::Unsupported(_)));
    }
}
