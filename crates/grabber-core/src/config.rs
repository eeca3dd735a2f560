use anyhow::{Context, Result};
use grabber_platform::matching::DEFAULT_MATCH_THRESHOLD;
use grabber_platform::pixel::{ColorFormat, ResultShape};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabberConfig {
    /// Return empty values instead of errors from every operation
    #[serde(default = "default_prevent_exceptions")]
    pub prevent_exceptions: bool,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    /// X display name (e.g. ":1"); `$DISPLAY` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Score a window title must exceed to match a search
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    #[serde(default)]
    pub default_format: ColorFormat,

    #[serde(default)]
    pub default_shape: ResultShape,
}

fn default_prevent_exceptions() -> bool {
    true
}
fn default_match_threshold() -> f32 {
    DEFAULT_MATCH_THRESHOLD
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            prevent_exceptions: default_prevent_exceptions(),
            debug: false,
            display: None,
            match_threshold: default_match_threshold(),
            default_format: ColorFormat::default(),
            default_shape: ResultShape::default(),
        }
    }
}

impl GrabberConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "grabber", "grabber") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("grabber-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Load `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Default tracing filter directive
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
