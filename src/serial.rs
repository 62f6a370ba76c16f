use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use log::{debug, info};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::thread::sleep;

/// An open serial device. The port closes when the last handle is dropped.
pub struct SerialLink {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(name: &str, config: &BridgeConfig) -> Result<Self> {
        let port = serialport::new(name, config.baud_rate)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| BridgeError::open("serial port", name, e))?;
        info!("Connected to device on port {} at {} baud", name, config.baud_rate);

        if config.settle_ms > 0 {
            debug!("Waiting {:?} for the board to reset", config.settle_time());
            sleep(config.settle_time());
        }
        Ok(SerialLink {
            name: name.to_string(),
            port,
        })
    }

    /// Second handle on the same device, for writing triggers back on the port we read from.
    pub fn try_clone(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| BridgeError::open("serial port", self.name.as_str(), e))?;
        Ok(SerialLink {
            name: self.name.clone(),
            port,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        debug!("Closed serial port {}", self.name);
    }
}
