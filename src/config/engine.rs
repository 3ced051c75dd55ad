use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{CoachError, Result};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "ATTUNE_CONFIG";

/// Operational knobs. Formula coefficients and thresholds are constants in
/// the modules that use them and are not configurable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub generator: GeneratorConfig,
    pub history: HistoryConfig,
    pub schedule: ScheduleConfig,
    pub correction: CorrectionConfig,
    pub persist: PersistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: f64,
    pub max_retries: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub circuit_failure_threshold: u64,
    pub circuit_reset_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            timeout_secs: 15.0,
            max_retries: 1,
            backoff_initial_ms: 100,
            backoff_max_ms: 2000,
            circuit_failure_threshold: 3,
            circuit_reset_secs: 60,
        }
    }
}

/// Upper bound on the generator deadline
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub emotion_capacity: usize,
    pub activity_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            emotion_capacity: 50,
            activity_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub max_blocks: usize,
    /// Issued schedules remembered per learner for feedback lookups
    pub issued_capacity: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            max_blocks: 8,
            issued_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrectionConfig {
    pub lower_ratio: f64,
    pub upper_ratio: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        CorrectionConfig {
            lower_ratio: 0.10,
            upper_ratio: 0.30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersistConfig {
    /// JSON-lines snapshot file; `None` disables persistence
    pub path: Option<PathBuf>,
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "Config file not found, using defaults");
                return Ok(EngineConfig::default());
            }
            Err(e) => return Err(CoachError::Io(e)),
        };

        let config = Self::from_toml_str(&content)
            .map_err(|e| CoachError::Config(format!("{} ({:?})", e, path)))?;
        tracing::info!(path = ?path, "Loaded engine config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| CoachError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `ATTUNE_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(EngineConfig::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.generator;
        if !(g.timeout_secs.is_finite() && g.timeout_secs > 0.0 && g.timeout_secs <= MAX_TIMEOUT_SECS) {
            return Err(CoachError::Config(format!(
                "generator.timeout_secs must be in (0, {}]",
                MAX_TIMEOUT_SECS
            )));
        }
        if g.backoff_initial_ms > g.backoff_max_ms {
            return Err(CoachError::Config(
                "generator.backoff_initial_ms exceeds backoff_max_ms".into(),
            ));
        }
        if g.circuit_failure_threshold == 0 {
            return Err(CoachError::Config("generator.circuit_failure_threshold must be > 0".into()));
        }
        if self.history.emotion_capacity == 0 || self.history.activity_capacity == 0 {
            return Err(CoachError::Config("history capacities must be > 0".into()));
        }
        if self.schedule.max_blocks == 0 || self.schedule.issued_capacity == 0 {
            return Err(CoachError::Config("schedule limits must be > 0".into()));
        }
        let c = &self.correction;
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(c.lower_ratio) || !in_unit(c.upper_ratio) || c.lower_ratio >= c.upper_ratio {
            return Err(CoachError::Config(format!(
                "correction band [{}, {}] is invalid",
                c.lower_ratio, c.upper_ratio
            )));
        }
        Ok(())
    }
}
