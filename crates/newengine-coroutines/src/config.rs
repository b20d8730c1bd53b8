use crate::error::{EngineError, EngineResult};
use crate::sched::lag::LagConfig;
use crate::time::DEFAULT_MAX_DT_SEC;

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub const ENV_LAG_THRESHOLD: &str = "NEWENGINE_LAG_THRESHOLD";
pub const ENV_LAG_MAX_TICKS: &str = "NEWENGINE_LAG_MAX_TICKS";
pub const ENV_TARGET_HZ: &str = "NEWENGINE_TARGET_HZ";
pub const ENV_MAX_DT_MS: &str = "NEWENGINE_MAX_DT_MS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub lag: LagConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Clamp for a single scaled delta.
    #[serde(default = "default_max_dt_ms")]
    pub max_dt_ms: u32,
    /// Frame pacing for `Engine::run`. 0 = unpaced.
    #[serde(default)]
    pub target_hz: u32,
}

fn default_max_dt_ms() -> u32 {
    (DEFAULT_MAX_DT_SEC * 1000.0) as u32
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_dt_ms: default_max_dt_ms(),
            target_hz: 0,
        }
    }
}

impl FrameConfig {
    #[inline]
    pub fn max_dt_sec(&self) -> f32 {
        self.max_dt_ms as f32 / 1000.0
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine config with layering:
    /// defaults -> file -> env.
    ///
    /// A missing file is not an error.
    pub fn load_json(path: Option<&Path>) -> EngineResult<EngineConfig> {
        let mut cfg = match path {
            Some(path) => Self::read_file(path)?.unwrap_or_default(),
            None => EngineConfig::default(),
        };
        Self::apply_env(&mut cfg, |key| std::env::var(key).ok());
        Ok(cfg)
    }

    fn read_file(path: &Path) -> EngineResult<Option<EngineConfig>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::config(path, format!("read failed: {e}"))),
        };

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| EngineError::config(path, format!("parse failed (json): {e}")))
    }

    /// Applies environment overrides read through `lookup`.
    /// Unparsable values are ignored with a warning.
    pub fn apply_env<F>(cfg: &mut EngineConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_env::<f32, _>(&lookup, ENV_LAG_THRESHOLD) {
            if v.is_finite() && v >= 0.0 {
                cfg.lag.threshold = v;
            } else {
                warn!("config: {ENV_LAG_THRESHOLD}={v} ignored (must be finite and >= 0)");
            }
        }
        if let Some(v) = parse_env(&lookup, ENV_LAG_MAX_TICKS) {
            cfg.lag.max_ticks = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_TARGET_HZ) {
            cfg.frame.target_hz = v;
        }
        if let Some(v) = parse_env(&lookup, ENV_MAX_DT_MS) {
            cfg.frame.max_dt_ms = v;
        }
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("config: {key}={raw:?} is not a valid value; ignored");
            None
        }
    }
}
