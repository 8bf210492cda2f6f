//! Configuration for SDNA workflows.
//!
//! Two layers:
//! - [`load_and_apply`] fills the process environment from `$XDG_CONFIG_HOME/<app>/config.toml`
//!   `[env]` and a project `.env`, with priority **existing env > .env > XDG**.
//! - [`Settings`] resolves the typed `[sdna]` table (block report directory, brain model and
//!   limits) with `SDNA_*` environment overrides.

mod settings;
mod xdg;

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub use settings::{
    default_block_reports_dir, Settings, DEFAULT_BRAIN_CHUNK_SIZE, DEFAULT_BRAIN_MAX_PARALLEL,
    DEFAULT_BRAIN_MODEL, ENV_BLOCK_REPORTS_DIR, ENV_BRAIN_CHUNK_SIZE, ENV_BRAIN_MAX_PARALLEL,
    ENV_BRAIN_MODEL,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Reads `.env` from `override_dir` or the current directory. Missing file is an empty map.
fn load_dotenv_map(override_dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let dir = match override_dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().map_err(|e| LoadError::DotenvRead(e.to_string()))?,
    };
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let iter = dotenv::from_path_iter(&path).map_err(|e| LoadError::DotenvRead(e.to_string()))?;
    let mut map = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| LoadError::DotenvRead(e.to_string()))?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Sets environment variables from `.env` and the XDG `[env]` table, only for keys that are
/// not already set.
///
/// * `app_name`: e.g. `"sdna"`; selects `~/.config/<app_name>/config.toml`.
/// * `override_dir`: look for `.env` here instead of the current directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg::load(app_name)?.env;
    let dotenv_map = load_dotenv_map(override_dir)?;

    let mut keys: std::collections::HashSet<&String> = xdg_map.keys().collect();
    keys.extend(dotenv_map.keys());

    for key in keys {
        if std::env::var(key).is_ok() {
            continue;
        }
        if let Some(v) = dotenv_map.get(key).or_else(|| xdg_map.get(key)) {
            std::env::set_var(key, v);
        }
    }

    Ok(())
}
