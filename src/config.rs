//! Plugin configuration (`config.yml`) and data directory layout.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{MapError, Result};
use crate::imaging::SizeLimits;
use crate::registry::QuotaLimits;

/// Configuration file name inside the data directory.
pub const CONFIG_FILENAME: &str = "config.yml";

/// Configuration options recognised by the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Locale for player-facing messages.
    pub lang: String,
    /// Maximum number of map IDs on the server (0 = unlimited).
    pub map_global_limit: u32,
    /// Maximum number of map IDs per player (0 = unlimited).
    pub map_player_limit: u32,
    /// Also save the unsplit image next to the tiles.
    pub save_full_image: bool,
    /// Maximum source image width in pixels (0 = unlimited).
    pub limit_map_size_x: u32,
    /// Maximum source image height in pixels (0 = unlimited).
    pub limit_map_size_y: u32,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            lang: "en_US".to_string(),
            map_global_limit: 0,
            map_player_limit: 0,
            save_full_image: false,
            limit_map_size_x: 0,
            limit_map_size_y: 0,
        }
    }
}

/// Raw file contents. Integer options are read as YAML values so that
/// non-integer entries can be ignored instead of rejecting the whole file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    lang: Option<String>,
    #[serde(rename = "map-global-limit")]
    map_global_limit: Option<Value>,
    #[serde(rename = "Limit-map-by-server")]
    legacy_global_limit: Option<Value>,
    #[serde(rename = "map-player-limit")]
    map_player_limit: Option<Value>,
    #[serde(rename = "Limit-map-by-player")]
    legacy_player_limit: Option<Value>,
    #[serde(rename = "save-full-image")]
    save_full_image: Option<bool>,
    #[serde(rename = "limit-map-size-x")]
    limit_map_size_x: Option<Value>,
    #[serde(rename = "limit-map-size-y")]
    limit_map_size_y: Option<Value>,
}

fn as_limit(value: &Option<Value>) -> Option<u32> {
    value
        .as_ref()
        .and_then(Value::as_i64)
        .map(|v| v.clamp(0, u32::MAX as i64) as u32)
}

impl PluginConfig {
    /// Load configuration from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| MapError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read configuration: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// `map-global-limit` and `map-player-limit` take precedence over their
    /// legacy spellings `Limit-map-by-server` and `Limit-map-by-player`.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| MapError::Parse {
            message: format!("Invalid configuration: {}", e),
            help: Some("Check config.yml syntax".to_string()),
        })?;
        let defaults = Self::default();

        Ok(Self {
            lang: raw.lang.unwrap_or(defaults.lang),
            map_global_limit: as_limit(&raw.map_global_limit)
                .or_else(|| as_limit(&raw.legacy_global_limit))
                .unwrap_or(0),
            map_player_limit: as_limit(&raw.map_player_limit)
                .or_else(|| as_limit(&raw.legacy_player_limit))
                .unwrap_or(0),
            save_full_image: raw.save_full_image.unwrap_or(false),
            limit_map_size_x: as_limit(&raw.limit_map_size_x).unwrap_or(0),
            limit_map_size_y: as_limit(&raw.limit_map_size_y).unwrap_or(0),
        })
    }

    pub fn quota_limits(&self) -> QuotaLimits {
        QuotaLimits::new(self.map_player_limit, self.map_global_limit)
    }

    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits::new(self.limit_map_size_x, self.limit_map_size_y)
    }
}

/// Layout of the plugin data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    /// Directory holding tile images.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Directory holding the registry store.
    pub fn maps_dir(&self) -> PathBuf {
        self.root.join("maps")
    }

    /// Legacy single maps file.
    pub fn legacy_maps_file(&self) -> PathBuf {
        self.root.join("map.yml")
    }

    /// Legacy posters file.
    pub fn legacy_posters_file(&self) -> PathBuf {
        self.root.join("poster.yml")
    }

    /// Backup of the legacy files taken before migrating.
    pub fn backups_pre_v3(&self) -> PathBuf {
        self.root.join("backups_pre-v3")
    }

    /// Backup of the current store taken before migrating.
    pub fn backups_post_v3(&self) -> PathBuf {
        self.root.join("backups_post-v3")
    }

    pub fn load_config(&self) -> Result<PluginConfig> {
        PluginConfig::load(&self.config_file())
    }
}
