use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that receives rendered figures and cached downloads.
    pub out_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// Basemap tile URL with `{z}`, `{x}` and `{y}` placeholders.
    pub tile_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            http_timeout_secs: 30,
            user_agent: concat!("covmap/", env!("CARGO_PKG_VERSION")).to_string(),
            tile_url: "https://a.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png".to_string(),
        }
    }
}

/// Load configuration. Without an explicit path the default
/// `config.toml` is used when present, otherwise built-in defaults
/// apply; an explicitly named file must exist.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => read(path),
        None => {
            let path = Path::new("config.toml");
            if path.is_file() {
                read(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn read(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path).context("Failed to read config")?;
    let config = toml::from_str(&data).context("Failed to parse config")?;
    Ok(config)
}
