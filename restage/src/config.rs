//! Stage configuration stored as TOML (`stage.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Configuration for one stage (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to the historical stage behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StageConfig {
    /// Repeat the transformation until the output stops changing.
    #[serde(rename = "loop")]
    pub loop_until_fixpoint: bool,

    /// Suppress per-iteration output while looping.
    pub iteration_silent: bool,

    /// Per-iteration writes end with a line terminator.
    pub iteration_trailing_newline: bool,

    /// Suppress final output.
    ///
    /// Historical quirk, preserved on purpose: an ABSENT value also
    /// suppresses final output. Only an explicit `silent = false` prints the
    /// final result.
    pub silent: Option<bool>,

    /// The final write ends with a line terminator.
    pub trailing_newline: bool,

    /// Fail the stage once this many loop applications have run without
    /// reaching a fixpoint. Unset means unbounded, matching the historical
    /// behavior; a non-converging transformation then never terminates.
    pub max_iterations: Option<u64>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            loop_until_fixpoint: false,
            iteration_silent: false,
            iteration_trailing_newline: true,
            silent: None,
            trailing_newline: true,
            max_iterations: None,
        }
    }
}

impl StageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == Some(0) {
            return Err(anyhow!("max_iterations must be > 0 when set"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StageConfig::default()`.
pub fn load_config(path: &Path) -> Result<StageConfig> {
    if !path.exists() {
        let cfg = StageConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StageConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StageConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
