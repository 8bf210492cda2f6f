//! Read `$XDG_CONFIG_HOME/<app>/config.toml`: the `[env]` table and the `[sdna]` settings table.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::settings::SettingsFile;
use crate::LoadError;

/// Path of the app's XDG config file, if it exists.
pub(crate) fn config_path(app_name: &str) -> Result<Option<PathBuf>, LoadError> {
    let base = dirs::config_dir()
        .ok_or_else(|| LoadError::XdgPath("no config directory for this platform".into()))?;
    let path = base.join(app_name).join("config.toml");
    Ok(path.is_file().then_some(path))
}

#[derive(serde::Deserialize, Default)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub sdna: SettingsFile,
}

/// Parses the whole config file. A missing file yields the empty default.
pub(crate) fn load(app_name: &str) -> Result<ConfigFile, LoadError> {
    let Some(path) = config_path(app_name)? else {
        return Ok(ConfigFile::default());
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    Ok(toml::from_str(&content)?)
}
