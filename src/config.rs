// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Settings loaded from a toml file. Every field has a default, so an empty
//! file or a file with only some sections is valid.
//!
//! ```toml
//! [display]
//! width = 800
//! height = 600
//!
//! [render]
//! target_width = 512
//! target_height = 240
//! clear_color = [0.4, 0.6, 1.0, 1.0]
//!
//! [log]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplaySettings,
    pub render: RenderSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "pixel compositor".to_string(),
        }
    }
}

/// Compositor settings. The target size is the internal rendering
/// resolution and never follows the display size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub target_width: u32,
    pub target_height: u32,
    pub virtual_height: f32,
    pub clear_color: [f32; 4],
    /// first line prepended to every shader stage
    pub glsl_version: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            target_width: 512,
            target_height: 240,
            virtual_height: crate::VIRTUAL_HEIGHT,
            clear_color: [0.4, 0.6, 1.0, 1.0],
            glsl_version: "#version 330 core".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub file: String,
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "log/pixel_compositor.log".to_string(),
            console: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.render.target_width, 512);
        assert_eq!(cfg.render.target_height, 240);
        assert_eq!(cfg.display.width, 800);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r##"
            [render]
            target_width = 320
            glsl_version = "#version 300 es"

            [log]
            level = "debug"
            "##,
        )
        .unwrap();
        assert_eq!(cfg.render.target_width, 320);
        assert_eq!(cfg.render.target_height, 240);
        assert_eq!(cfg.render.glsl_version, "#version 300 es");
        assert_eq!(cfg.render.clear_color, [0.4, 0.6, 1.0, 1.0]);
        assert_eq!(cfg.log.level, "debug");
        assert!(!cfg.log.console);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("[render]\ntarget_width = \"wide\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
