use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{PipelineError, Result};

pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target byte length of each chunk; the last chunk may be shorter.
    pub chunk_size: u64,
    /// Size of the local fan-out pool.
    pub workers: usize,
    /// Attempts per chunk before the whole run is failed (1 = no retry).
    pub max_attempts: u32,
    /// Delay before attempt n+1 is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    /// Delete per-chunk record sets once the archive is persisted.
    pub cleanup_chunk_data: bool,
    /// Zero every timestamp written into the archive.
    pub deterministic: bool,
    /// Store an entry zstd-compressed only if that saves at least this fraction.
    pub min_gain: f32,
    /// Only keys under this prefix start a workflow.
    pub upload_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: 4,
            max_attempts: 3,
            retry_backoff_ms: 200,
            cleanup_chunk_data: false,
            deterministic: false,
            min_gain: 0.05,
            upload_prefix: "uploads/".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let cfg: Self = serde_json::from_slice(&raw)?;
        Ok(cfg)
    }

    /// Overlay `CHUNKPIPE_*` environment variables onto `self`.
    ///
    /// - `CHUNKPIPE_CHUNK_SIZE` (bytes)
    /// - `CHUNKPIPE_WORKERS`
    /// - `CHUNKPIPE_MAX_ATTEMPTS`
    /// - `CHUNKPIPE_RETRY_BACKOFF_MS`
    /// - `CHUNKPIPE_CLEANUP` (`1`/`true`)
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| env::var(name).ok())
    }

    /// Same as [`PipelineConfig::with_env`] with variables read through `lookup`.
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("CHUNKPIPE_CHUNK_SIZE") {
            self.chunk_size = parse_var("CHUNKPIPE_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNKPIPE_WORKERS") {
            self.workers = parse_var("CHUNKPIPE_WORKERS", &v)?;
        }
        if let Some(v) = lookup("CHUNKPIPE_MAX_ATTEMPTS") {
            self.max_attempts = parse_var("CHUNKPIPE_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("CHUNKPIPE_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_var("CHUNKPIPE_RETRY_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("CHUNKPIPE_CLEANUP") {
            self.cleanup_chunk_data = matches!(v.trim(), "1" | "true" | "yes");
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.workers == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "workers must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.min_gain) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "min_gain must be in [0, 1), got {}",
                self.min_gain
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::InvalidConfiguration(format!("{name}: cannot parse {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.chunk_size, 50 * 1024 * 1024);
        assert_eq!(cfg.upload_prefix, "uploads/");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"chunk_size": 1024}"#).unwrap();
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.max_attempts, 3);
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("CHUNKPIPE_CHUNK_SIZE", "4096"),
            ("CHUNKPIPE_WORKERS", "2"),
            ("CHUNKPIPE_CLEANUP", "true"),
        ]
        .into_iter()
        .collect();
        let cfg = PipelineConfig::default()
            .with_vars(|n| vars.get(n).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.chunk_size, 4096);
        assert_eq!(cfg.workers, 2);
        assert!(cfg.cleanup_chunk_data);
        assert_eq!(cfg.retry_backoff_ms, 200);
    }

    #[test]
    fn test_bad_env_value_is_invalid_configuration() {
        let err = PipelineConfig::default()
            .with_vars(|n| (n == "CHUNKPIPE_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let cfg = PipelineConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }
}
