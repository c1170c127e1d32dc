//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use orbis_orbital::{SimulationSettings, TimeDilation};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Orbital simulation settings.
    pub simulation: SimulationConfig,
    /// Replication settings.
    pub network: NetworkConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
    /// Where the area catalog comes from.
    pub catalog: CatalogConfig,
}

/// Orbital simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds a finished trajectory may linger before it is force-completed.
    pub orbit_gc_delay_secs: f64,
    /// Simulation ticks per real second.
    pub tick_rate: u32,
    /// Phasing altitude (km) used when a plan does not pick one.
    pub default_phasing_altitude_km: f64,
    /// Game seconds per real second.
    pub time_dilation: TimeDilation,
}

/// Replication configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Replication batches per real second.
    pub replication_rate_hz: u32,
    /// Batches at least this large (bytes) are LZ4-compressed.
    pub compression_threshold: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to a file.
    pub log_to_file: bool,
}

/// Area catalog source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// RON catalog file. `None` uses the built-in catalog.
    pub path: Option<PathBuf>,
}

// --- Default implementations ---

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            orbit_gc_delay_secs: 30.0,
            tick_rate: 60,
            default_phasing_altitude_km: 300.0,
            time_dilation: TimeDilation::Normal,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            replication_rate_hz: 10,
            compression_threshold: 256,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

impl SimulationConfig {
    /// Engine settings derived from this section.
    pub fn settings(&self) -> SimulationSettings {
        SimulationSettings {
            orbit_gc_delay_secs: self.orbit_gc_delay_secs,
        }
        .sanitized()
    }
}

/// `<platform config dir>/orbis`, falling back to `./orbis`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orbis")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::WriteError {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::WriteError {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}
