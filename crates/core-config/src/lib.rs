//! Runtime configuration: optional `tagsaw.toml` defaults merged under
//! command-line overrides.
//!
//! Unknown fields are ignored (TOML deserialization tolerance) so the
//! file can grow without breaking older binaries. Every knob has a
//! built-in default; the file and each CLI flag override in that order.
//! Clamping to sane floors lives in `RuntimeConfig::effective` so bad
//! values degrade instead of failing a batch run.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "tagsaw.toml";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub runtime: RuntimeSection,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuntimeSection {
    /// Worker thread count (`-proc`).
    #[serde(default)]
    pub procs: Option<usize>,
    /// Channel depth between stages (`-chan`).
    #[serde(default)]
    pub chan: Option<usize>,
    /// Unshuffler reorder target (`-heap`).
    #[serde(default)]
    pub heap: Option<usize>,
    /// Node arena capacity hint per record (`-farm`).
    #[serde(default)]
    pub farm: Option<usize>,
    /// Stasher fan-out width (`-serv`).
    #[serde(default)]
    pub serv: Option<usize>,
}

/// Resolved runtime knobs after file + CLI merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub procs: usize,
    pub chan: usize,
    pub heap: usize,
    pub farm: usize,
    pub serv: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            procs: 4,
            chan: 0, // 0 = follow procs
            heap: 16,
            farm: 256,
            serv: 4,
        }
    }
}

impl RuntimeConfig {
    /// Layer file values over the built-in defaults.
    pub fn from_file(file: &ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            procs: file.runtime.procs.unwrap_or(defaults.procs),
            chan: file.runtime.chan.unwrap_or(defaults.chan),
            heap: file.runtime.heap.unwrap_or(defaults.heap),
            farm: file.runtime.farm.unwrap_or(defaults.farm),
            serv: file.runtime.serv.unwrap_or(defaults.serv),
        }
    }

    /// Final values with floors applied.
    pub fn effective(&self) -> Self {
        Self {
            procs: self.procs.max(1),
            chan: if self.chan == 0 {
                self.procs.max(1)
            } else {
                self.chan
            },
            heap: self.heap.max(1),
            farm: self.farm.max(16),
            serv: self.serv.max(1),
        }
    }
}

/// Load configuration from an explicit path, or discover `tagsaw.toml` in
/// the working directory. A missing file is the default configuration.
pub fn load_from(explicit: Option<&Path>) -> Result<ConfigFile> {
    let path: PathBuf = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let discovered = PathBuf::from(CONFIG_FILE);
            if !discovered.exists() {
                debug!(target: "config", "no tagsaw.toml; using defaults");
                return Ok(ConfigFile::default());
            }
            discovered
        }
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("parsing configuration file {}", path.display()))?;
    info!(target: "config", file = %path.display(), "configuration loaded");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_missing() {
        let file: ConfigFile = toml::from_str("").unwrap();
        let cfg = RuntimeConfig::from_file(&file).effective();
        assert_eq!(cfg.procs, 4);
        assert_eq!(cfg.chan, 4);
        assert_eq!(cfg.heap, 16);
    }

    #[test]
    fn file_values_override_defaults() {
        let file: ConfigFile =
            toml::from_str("[runtime]\nprocs = 8\nheap = 64\n").unwrap();
        let cfg = RuntimeConfig::from_file(&file).effective();
        assert_eq!(cfg.procs, 8);
        assert_eq!(cfg.heap, 64);
        assert_eq!(cfg.chan, 8);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let file: Result<ConfigFile, _> =
            toml::from_str("[runtime]\nprocs = 2\nfuture_knob = true\n[future]\nx = 1\n");
        assert!(file.is_ok());
    }

    #[test]
    fn floors_clamp_degenerate_values() {
        let file: ConfigFile = toml::from_str("[runtime]\nprocs = 0\nfarm = 1\n").unwrap();
        let cfg = RuntimeConfig::from_file(&file).effective();
        assert_eq!(cfg.procs, 1);
        assert_eq!(cfg.farm, 16);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_from(None).unwrap();
        assert!(cfg.runtime.procs.is_none());
    }

    #[test]
    fn explicit_path_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tagsaw.toml");
        std::fs::write(&path, "[runtime]\nserv = 2\n").unwrap();
        let cfg = load_from(Some(&path)).unwrap();
        assert_eq!(cfg.runtime.serv, Some(2));
    }
}
