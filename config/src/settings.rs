//! Typed `[sdna]` settings: block-report location and brain parameters.
//!
//! Resolution order per field: `SDNA_*` environment variable, then the `[sdna]` table in
//! `$XDG_CONFIG_HOME/sdna/config.toml`, then the built-in default.

use std::path::PathBuf;

use crate::LoadError;

pub const ENV_BLOCK_REPORTS_DIR: &str = "SDNA_BLOCK_REPORTS_DIR";
pub const ENV_BRAIN_MODEL: &str = "SDNA_BRAIN_MODEL";
pub const ENV_BRAIN_MAX_PARALLEL: &str = "SDNA_BRAIN_MAX_PARALLEL";
pub const ENV_BRAIN_CHUNK_SIZE: &str = "SDNA_BRAIN_CHUNK_SIZE";

pub const DEFAULT_BRAIN_MODEL: &str = "haiku";
pub const DEFAULT_BRAIN_MAX_PARALLEL: usize = 8;
pub const DEFAULT_BRAIN_CHUNK_SIZE: usize = 4000;

/// Raw `[sdna]` table; every field optional.
#[derive(serde::Deserialize, Default, Debug, Clone)]
pub(crate) struct SettingsFile {
    pub block_reports_dir: Option<PathBuf>,
    pub brain_model: Option<String>,
    pub brain_max_parallel: Option<usize>,
    pub brain_chunk_size: Option<usize>,
}

/// Resolved settings used to build an SDNA runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding one JSON file per blocked report.
    pub block_reports_dir: PathBuf,
    /// Model used by the brain for relevance scoring and instructions.
    pub brain_model: String,
    /// Upper bound on concurrent neuron scoring calls.
    pub brain_max_parallel: usize,
    /// Neurons longer than this many characters are split into chunks.
    pub brain_chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_reports_dir: default_block_reports_dir(),
            brain_model: DEFAULT_BRAIN_MODEL.to_string(),
            brain_max_parallel: DEFAULT_BRAIN_MAX_PARALLEL,
            brain_chunk_size: DEFAULT_BRAIN_CHUNK_SIZE,
        }
    }
}

/// `~/.hermes/block_reports`, or a relative `.hermes/block_reports` when no home is known.
pub fn default_block_reports_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".hermes")
        .join("block_reports")
}

impl Settings {
    /// Loads settings for `app_name` (usually `"sdna"`): env overrides the XDG file.
    pub fn load(app_name: &str) -> Result<Self, LoadError> {
        let file = crate::xdg::load(app_name)?;
        Self::resolve(file.sdna)
    }

    pub(crate) fn resolve(file: SettingsFile) -> Result<Self, LoadError> {
        let defaults = Settings::default();
        let block_reports_dir = std::env::var_os(ENV_BLOCK_REPORTS_DIR)
            .map(PathBuf::from)
            .or(file.block_reports_dir)
            .unwrap_or(defaults.block_reports_dir);
        let brain_model = std::env::var(ENV_BRAIN_MODEL)
            .ok()
            .or(file.brain_model)
            .unwrap_or(defaults.brain_model);
        let brain_max_parallel = env_usize(ENV_BRAIN_MAX_PARALLEL)?
            .or(file.brain_max_parallel)
            .unwrap_or(defaults.brain_max_parallel)
            .max(1);
        let brain_chunk_size = env_usize(ENV_BRAIN_CHUNK_SIZE)?
            .or(file.brain_chunk_size)
            .unwrap_or(defaults.brain_chunk_size)
            .max(1);
        Ok(Self {
            block_reports_dir,
            brain_model,
            brain_max_parallel,
            brain_chunk_size,
        })
    }
}

fn env_usize(key: &str) -> Result<Option<usize>, LoadError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| LoadError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
