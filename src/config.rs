//! Session defaults loaded from `~/.winconsole/config.toml`.
//!
//! Every key is optional; missing keys keep the built-in defaults. Without
//! a `[window]` section the console keeps its current window size.
//!
//! ```toml
//! caption = "My tool"
//!
//! [window]
//! width = 80
//! height = 25
//!
//! [buffer]
//! width = 80
//! height = 300
//!
//! [cursor]
//! visible = true
//! size = 25
//!
//! [colors]
//! background = "black"
//! input = "dark-white"
//! output = "dark-white"
//!
//! [input]
//! buffer_size = 1024
//! ```
//!
//! Color names: black, dark-blue, dark-green, dark-aqua, dark-red,
//! dark-purple, dark-yellow, dark-white, grey, blue, green, aqua, red,
//! purple, yellow, white.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::color::ConsoleColor;
use crate::geometry::Size;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Session defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Window title
    pub caption: String,
    /// Window size applied at create, resizing the buffer to match.
    /// The console keeps its own size when absent.
    pub window: Option<SizeConfig>,
    pub buffer: SizeConfig,
    pub cursor: CursorConfig,
    pub colors: ColorConfig,
    pub input: InputConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            caption: String::new(),
            window: None,
            buffer: SizeConfig { width: 80, height: 300 },
            cursor: CursorConfig::default(),
            colors: ColorConfig::default(),
            input: InputConfig::default(),
        }
    }
}

/// Width/height pair in character cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeConfig {
    pub width: u16,
    pub height: u16,
}

impl From<SizeConfig> for Size {
    fn from(size: SizeConfig) -> Self {
        Size::new(size.width, size.height)
    }
}

/// Cursor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub visible: bool,
    /// Percentage of the cell height, 0..=100
    pub size: u8,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            visible: true,
            size: 25,
        }
    }
}

/// Color configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub background: ConsoleColor,
    pub input: ConsoleColor,
    pub output: ConsoleColor,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: ConsoleColor::Black,
            input: ConsoleColor::DarkWhite,
            output: ConsoleColor::DarkWhite,
        }
    }
}

/// Line input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum characters per line read
    pub buffer_size: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { buffer_size: 1024 }
    }
}

impl SessionConfig {
    /// Load configuration from the default file, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_or_default(&path),
            _ => Self::default(),
        }
    }

    /// Load configuration from `path`, falling back to defaults on error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `~/.winconsole/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".winconsole").join("config.toml"))
    }
}

/// Home directory from USERPROFILE or HOME
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.window, None);
        assert_eq!(Size::from(config.buffer), Size::new(80, 300));
        assert_eq!(config.input.buffer_size, 1024);
        assert_eq!(config.cursor.size, 25);
        assert!(config.cursor.visible);
        assert_eq!(config.colors.background, ConsoleColor::Black);
        assert_eq!(config.colors.output, ConsoleColor::DarkWhite);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            caption = "demo"

            [colors]
            output = "yellow"

            [buffer]
            width = 120
            height = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.caption, "demo");
        assert_eq!(config.colors.output, ConsoleColor::Yellow);
        assert_eq!(config.colors.input, ConsoleColor::DarkWhite);
        assert_eq!(Size::from(config.buffer), Size::new(120, 500));
        assert_eq!(config.window, None);
    }

    #[test]
    fn test_window_section() {
        let config = SessionConfig::from_toml_str("[window]\nwidth = 100\nheight = 30\n").unwrap();
        assert_eq!(config.window.map(Size::from), Some(Size::new(100, 30)));
    }

    #[test]
    fn test_unknown_color_is_an_error() {
        let result = SessionConfig::from_toml_str("[colors]\nbackground = \"magenta\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_serialized_config_reloads() {
        let mut config = SessionConfig::default();
        config.caption = "round".to_string();
        config.colors.background = ConsoleColor::DarkBlue;
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("background = \"dark-blue\""));
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let path = Path::new("/nonexistent/winconsole/config.toml");
        assert!(matches!(SessionConfig::load_from(path), Err(ConfigError::Read { .. })));
        assert_eq!(SessionConfig::load_or_default(path), SessionConfig::default());
    }
}
