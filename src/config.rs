use crate::error::{BridgeError, Result};
use crate::MAX_WINDOW_SIZE;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub window_size: usize,
    pub feature_count: usize,
    pub cooldown_secs: f64,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub settle_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            window_size: 256,      // samples per classified window
            feature_count: 20,     // frequency groups fed to the model
            cooldown_secs: 1.0,    // minimum gap between two fires
            baud_rate: 115_200,    // must match Serial.begin() on the board
            read_timeout_ms: 1000, // a silent port for this long ends the stream
            settle_ms: 2000,       // the board resets when the port opens
        }
    }
}

impl BridgeConfig {
    /// Reads a JSON config file. Missing keys fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| BridgeError::open("config file", path, e))?;
        let config: BridgeConfig = serde_json::from_str(&text)
            .map_err(|e| BridgeError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config {:?} from {:?}", config, path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(BridgeError::InvalidConfig(format!(
                "window size must be between 1 and {MAX_WINDOW_SIZE}, got {}",
                self.window_size
            )));
        }
        if self.feature_count == 0 {
            return Err(BridgeError::InvalidConfig("feature count must be at least 1".to_string()));
        }
        if !self.cooldown_secs.is_finite() || self.cooldown_secs < 0.0 {
            return Err(BridgeError::InvalidConfig(format!(
                "cooldown must be a non-negative number of seconds, got {}",
                self.cooldown_secs
            )));
        }
        if self.baud_rate == 0 {
            return Err(BridgeError::InvalidConfig("baud rate must be > 0".to_string()));
        }
        let bins = self.window_size / 2 + 1;
        if self.feature_count > bins {
            warn!(
                "feature count {} exceeds the {} spectrum bins of a {}-sample window; extra features stay 0",
                self.feature_count, bins, self.window_size
            );
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
