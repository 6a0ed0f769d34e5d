//! Driver and model configuration.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `./hova.toml`, or the file named by `HOVA_CONFIG`
//! 3. Environment overrides (`HOVA_RNG_SEED`, `HOVA_RESET_CYCLES`)
//!
//! ```toml
//! reset_cycles = 10
//! empty_queue = "tolerant"
//! instruction_limit = 100000
//!
//! [model]
//! rng_seed = 0x5a5
//! flag_timing = "same_instruction"
//!
//! [rtl]
//! top = "hova_tb"
//! sources = ["hova_tb.sv", "rtl/hova.v"]
//! include_paths = ["rtl", "."]
//! artifacts = "artifacts"
//! ```

use std::path::Path;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};
use crate::semantics::FlagTiming;

const LOCAL_CONFIG: &str = "hova.toml";

/// Verilator top module the generated bindings are built for.
pub const RTL_TOP: &str = "hova_tb";

/// What to do when the device consumes from an empty input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyQueuePolicy {
    /// Treat the pop as a no-op and log a warning.
    #[default]
    Tolerant,
    /// Fail the execution with [`DriverError::QueueUnderflow`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Clock periods `rst` is held for a full reset.
    pub reset_cycles: u32,
    pub empty_queue: EmptyQueuePolicy,
    /// Upper bound on instructions per program run. Unbounded if unset.
    pub instruction_limit: Option<u64>,
    pub model: ModelConfig,
    pub rtl: RtlConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reset_cycles: 10,
            empty_queue: EmptyQueuePolicy::default(),
            instruction_limit: None,
            model: ModelConfig::default(),
            rtl: RtlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub rng_seed: u16,
    pub flag_timing: FlagTiming,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0x5A5,
            flag_timing: FlagTiming::default(),
        }
    }
}

/// Verilator build inputs for the RTL device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtlConfig {
    /// Informational. The bindings are generated for [`RTL_TOP`] at compile
    /// time, and a different name is only reported.
    pub top: String,
    pub sources: Vec<Utf8PathBuf>,
    pub include_paths: Vec<Utf8PathBuf>,
    pub artifacts: Utf8PathBuf,
}

impl Default for RtlConfig {
    fn default() -> Self {
        Self {
            top: RTL_TOP.to_string(),
            sources: vec!["hova_tb.sv".into(), "rtl/hova.v".into()],
            include_paths: vec!["rtl".into(), ".".into()],
            artifacts: "artifacts".into(),
        }
    }
}

impl Config {
    /// Load from the usual locations, falling back to defaults on any problem.
    pub fn load() -> Self {
        let path = std::env::var("HOVA_CONFIG").unwrap_or_else(|_| LOCAL_CONFIG.to_string());
        let mut config = if Path::new(&path).exists() {
            match Self::from_file(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path);
                    config
                }
                Err(e) => {
                    log::warn!("{}", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DriverError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| DriverError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Some(seed) = env_number("HOVA_RNG_SEED") {
            log::info!("Using HOVA_RNG_SEED from environment: {}", seed);
            self.model.rng_seed = seed;
        }
        if let Some(cycles) = env_number("HOVA_RESET_CYCLES") {
            log::info!("Using HOVA_RESET_CYCLES from environment: {}", cycles);
            self.reset_cycles = cycles;
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring non-numeric {}={}", name, value);
            None
        }
    }
}
