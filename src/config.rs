use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pointing::{AzEl, Bounds};

pub const CONFIG_FILE: &str = "config.yaml";
pub const CALIBRATION_FILE: &str = "calibration.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub station: StationConfig,
    pub emergency_contact: String,
    pub az_limits: LimitsConfig,
    pub el_limits: LimitsConfig,
    pub stow_position: PositionConfig,
    pub cal_position: PositionConfig,
    pub motor: MotorConfig,
    pub radio: RadioConfig,
    pub beamwidth: f64,
    pub tsys: f64,
    pub tcal: f64,
    pub save_directory: PathBuf,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default = "default_scan_dwell")]
    pub scan_dwell_s: f64,

    /// Populated with the directory the config was loaded from.
    #[serde(skip)]
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitsConfig {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionConfig {
    pub azimuth: f64,
    pub elevation: f64,
}

impl PositionConfig {
    pub fn azel(&self) -> AzEl {
        AzEl::new(self.azimuth, self.elevation)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotorConfig {
    pub kind: MotorKind,
    #[serde(default)]
    pub port: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorKind {
    /// Built-in simulated drive, no hardware attached.
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadioConfig {
    /// Center frequency in Hz.
    pub center_frequency: f64,
    /// Sample rate in Hz.
    pub sample_frequency: f64,
    pub num_bins: usize,
    pub integration_cycles: u32,
    #[serde(default)]
    pub autostart: bool,
    /// Collaborator process argv templates; empty means not configured.
    #[serde(default)]
    pub process_command: Vec<String>,
    #[serde(default)]
    pub calibrate_command: Vec<String>,
    #[serde(default)]
    pub save_raw_command: Vec<String>,
    #[serde(default)]
    pub save_spec_command: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PortsConfig {
    #[serde(default = "default_status_port")]
    pub status: u16,
    #[serde(default = "default_command_port")]
    pub command: u16,
    #[serde(default = "default_rpc_port")]
    pub rpc: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            status: default_status_port(),
            command: default_command_port(),
            rpc: default_rpc_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectConfig {
    pub id: String,
    pub azimuth: f64,
    pub elevation: f64,
}

fn default_status_port() -> u16 {
    5555
}

fn default_command_port() -> u16 {
    5556
}

fn default_rpc_port() -> u16 {
    5557
}

fn default_scan_dwell() -> f64 {
    5.0
}

impl Config {
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.config_dir = dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.az_limits.lower >= self.az_limits.upper {
            return invalid(format!(
                "az_limits lower {} >= upper {}",
                self.az_limits.lower, self.az_limits.upper
            ));
        }
        if self.el_limits.lower >= self.el_limits.upper {
            return invalid(format!(
                "el_limits lower {} >= upper {}",
                self.el_limits.lower, self.el_limits.upper
            ));
        }
        if self.radio.num_bins == 0 {
            return invalid("radio.num_bins must be nonzero".into());
        }
        let bounds = self.bounds();
        if !bounds.contains(self.stow_position.azel()) {
            return invalid(format!(
                "stow position {} outside travel limits",
                self.stow_position.azel()
            ));
        }
        if !bounds.contains(self.cal_position.azel()) {
            return invalid(format!(
                "cal position {} outside travel limits",
                self.cal_position.azel()
            ));
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            az: (self.az_limits.lower, self.az_limits.upper),
            el: (self.el_limits.lower, self.el_limits.upper),
        }
    }

    pub fn stow_position(&self) -> AzEl {
        self.stow_position.azel()
    }

    pub fn cal_position(&self) -> AzEl {
        self.cal_position.azel()
    }

    pub fn calibration_path(&self) -> PathBuf {
        self.config_dir.join(CALIBRATION_FILE)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        station: StationConfig {
            name: "test station".into(),
            latitude: 42.5,
            longitude: -71.5,
        },
        emergency_contact: "ops@example.org".into(),
        az_limits: LimitsConfig {
            lower: 0.0,
            upper: 360.0,
        },
        el_limits: LimitsConfig {
            lower: 5.0,
            upper: 85.0,
        },
        stow_position: PositionConfig {
            azimuth: 90.0,
            elevation: 5.0,
        },
        cal_position: PositionConfig {
            azimuth: 120.0,
            elevation: 8.0,
        },
        motor: MotorConfig {
            kind: MotorKind::None,
            port: None,
        },
        radio: RadioConfig {
            center_frequency: 1_420_000_000.0,
            sample_frequency: 2_400_000.0,
            num_bins: 256,
            integration_cycles: 10,
            autostart: false,
            process_command: Vec::new(),
            calibrate_command: Vec::new(),
            save_raw_command: Vec::new(),
            save_spec_command: Vec::new(),
        },
        beamwidth: 7.0,
        tsys: 171.0,
        tcal: 290.0,
        save_directory: PathBuf::from("/tmp"),
        ports: PortsConfig::default(),
        objects: vec![
            ObjectConfig {
                id: "sun".into(),
                azimuth: 180.0,
                elevation: 45.0,
            },
            ObjectConfig {
                id: "moon".into(),
                azimuth: 220.0,
                elevation: 30.0,
            },
        ],
        scan_dwell_s: 0.0,
        config_dir: PathBuf::from("."),
    }
}
