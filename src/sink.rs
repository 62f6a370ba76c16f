use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::serial::SerialLink;
use crate::trigger::Trigger;
use log::{debug, info};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSpec {
    Stdout,
    File { path: PathBuf },
    Serial { port: String },
}

impl FromStr for OutputSpec {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (scheme, rest) = match s.split_once(':') {
            Some((scheme, rest)) => (scheme, Some(rest).filter(|r| !r.is_empty())),
            None => (s, None),
        };
        match (scheme, rest) {
            ("stdout", None) => Ok(OutputSpec::Stdout),
            ("file", Some(path)) => Ok(OutputSpec::File { path: PathBuf::from(path) }),
            ("file", None) => Err(BridgeError::InvalidConfig("file: requires a PATH, eg. file:./out.csv".to_string())),
            ("serial", Some(port)) => Ok(OutputSpec::Serial { port: port.to_string() }),
            ("serial", None) => Err(BridgeError::InvalidConfig("serial: requires a COMPORT, eg. serial:COM0".to_string())),
            _ => Err(BridgeError::InvalidConfig(format!(
                "invalid output {s:?}, expected stdout | file:PATH | serial:COMPORT"
            ))),
        }
    }
}

impl fmt::Display for OutputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSpec::Stdout => write!(f, "stdout"),
            OutputSpec::File { path } => write!(f, "file:{}", path.display()),
            OutputSpec::Serial { port } => write!(f, "serial:{port}"),
        }
    }
}

/// Second handle on the source's serial link when the output names the same port.
pub fn shared_link(spec: &OutputSpec, source_link: Option<&SerialLink>) -> Result<Option<SerialLink>> {
    match (spec, source_link) {
        (OutputSpec::Serial { port }, Some(link)) if link.name() == port => {
            debug!("Output shares the source port {}", port);
            link.try_clone().map(Some)
        }
        _ => Ok(None),
    }
}

pub fn open_output(spec: &OutputSpec, shared: Option<SerialLink>, config: &BridgeConfig) -> Result<Box<dyn Write>> {
    match spec {
        OutputSpec::Stdout => Ok(Box::new(io::stdout())),
        OutputSpec::File { path } => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| BridgeError::open("directory", parent, e))?;
            }
            let file = File::create(path).map_err(|e| BridgeError::open("file", path, e))?;
            info!("Writing to {:?}", path);
            Ok(Box::new(BufWriter::new(file)))
        }
        OutputSpec::Serial { port } => match shared {
            Some(link) => Ok(Box::new(link)),
            None => Ok(Box::new(SerialLink::open(port, config)?)),
        },
    }
}

pub trait TriggerSink {
    fn emit(&mut self, trigger: Trigger) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one `'1'`/`'0'` byte per classified window.
pub struct ByteSink<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> ByteSink<W> {
    pub fn new(out: W) -> Self {
        ByteSink { out, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TriggerSink for ByteSink<W> {
    fn emit(&mut self, trigger: Trigger) -> Result<()> {
        self.out.write_all(&[trigger.byte()])?;
        self.out.flush()?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Collects triggers in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub triggers: Vec<Trigger>,
}

impl VecSink {
    pub fn bytes(&self) -> String {
        self.triggers.iter().map(|t| t.byte() as char).collect()
    }
}

impl TriggerSink for VecSink {
    fn emit(&mut self, trigger: Trigger) -> Result<()> {
        self.triggers.push(trigger);
        Ok(())
    }
}
