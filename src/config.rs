// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::drivers::{AcquisitionError, Unit, UnitConverter, ViewState};
/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "fsr_scope.json";
// 界面控件范围
pub const REFRESH_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=1000;
pub const REFRESH_STEP_MS: f64 = 25.0;
pub const DEPTH_RANGE: std::ops::RangeInclusive<usize> = 100..=2500;
pub const DEPTH_STEP: f64 = 100.0;
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub init_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Supply voltage of the divider, measured at the board.
    pub vcc: f64,
    pub pulldown_ohms: f64,
    pub num_channels: usize,
    /// Written into recording headers; the device sets the real rate.
    pub sample_rate_hz: u32,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
    pub refresh_interval_ms: u64,
    pub buffer_depth: usize,
    pub default_unit: Unit,
}
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port_name: if cfg!(windows) { "COM5" } else { "/dev/ttyACM0" }.to_owned(),
            baud_rate: 500_000,
            init_timeout_ms: 5000,
            read_timeout_ms: 100,
            vcc: 5.06,
            pulldown_ohms: 10_000.0,
            num_channels: 6,
            sample_rate_hz: 50,
            log_dir: PathBuf::from("logs"),
            data_dir: PathBuf::from("sensordata"),
            refresh_interval_ms: 250,
            buffer_depth: 1000,
            default_unit: Unit::Raw,
        }
    }
}
impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AcquisitionError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| AcquisitionError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }
    /// Missing file means defaults; a broken one is logged and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {e}");
            Self::default()
        })
    }
    pub fn save(&self, path: &Path) -> Result<(), AcquisitionError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AcquisitionError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
    pub fn validate(&self) -> Result<(), AcquisitionError> {
        let problem = if !(self.vcc > 0.0) {
            Some("vcc must be positive")
        } else if !(self.pulldown_ohms > 0.0) {
            Some("pulldown_ohms must be positive")
        } else if self.num_channels == 0 {
            Some("num_channels must be at least 1")
        } else if self.buffer_depth == 0 {
            Some("buffer_depth must be at least 1")
        } else if self.init_timeout_ms == 0 {
            Some("init_timeout_ms must be positive")
        } else {
            None
        };
        match problem {
            Some(msg) => Err(AcquisitionError::Config(msg.to_owned())),
            None => Ok(()),
        }
    }
    pub fn converter(&self) -> UnitConverter {
        UnitConverter::new(self.vcc, self.pulldown_ohms)
    }
    pub fn initial_view(&self) -> ViewState {
        ViewState::new(
            Duration::from_millis(self.refresh_interval_ms),
            self.buffer_depth,
            self.default_unit,
        )
    }
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
