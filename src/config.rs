//! Runtime configuration: sampling grid and rendering options.
//!
//! Everything here is plain data passed by value into the field composer and the renderer.
//! `AppConfig::load` reads a JSON file in which every field is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, WavefunctionError};

/// Half-width of the plotted square, in the same units as the Bohr radius
pub const DEFAULT_EXTENT: f64 = 480.0;
/// Points per axis
pub const DEFAULT_SAMPLES: usize = 680;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Both axes span `[-extent, extent]`
    pub extent: f64,
    pub samples: usize,
    /// Evaluate grid cells on the rayon pool
    pub parallel: bool,
    /// Dedicated worker count; `None` uses the global rayon pool
    pub threads: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            extent: DEFAULT_EXTENT,
            samples: DEFAULT_SAMPLES,
            parallel: true,
            threads: None,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.extent.is_finite() || self.extent <= 0.0 {
            return Err(WavefunctionError::Config(format!(
                "grid extent must be a positive finite number, got {}",
                self.extent
            )));
        }
        if self.samples == 0 {
            return Err(WavefunctionError::Config(
                "grid needs at least one sample per axis".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(WavefunctionError::Config(
                "thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMap {
    #[default]
    Inferno,
    GistHeat,
    Afmhot,
    GistGray,
}

impl ColorMap {
    pub const ALL: [ColorMap; 4] = [
        ColorMap::Inferno,
        ColorMap::GistHeat,
        ColorMap::Afmhot,
        ColorMap::GistGray,
    ];

    /// Accepts the numeric selectors `1`..`4` or a colormap name.
    pub fn from_selector(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "1" | "inferno" => Ok(ColorMap::Inferno),
            "2" | "gist_heat" => Ok(ColorMap::GistHeat),
            "3" | "afmhot" => Ok(ColorMap::Afmhot),
            "4" | "gist_gray" => Ok(ColorMap::GistGray),
            other => Err(WavefunctionError::Config(format!(
                "unknown colormap selector `{other}` (expected 1, 2, 3 or 4)"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorMap::Inferno => "inferno",
            ColorMap::GistHeat => "gist_heat",
            ColorMap::Afmhot => "afmhot",
            ColorMap::GistGray => "gist_gray",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub colormap: ColorMap,
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            colormap: ColorMap::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(content)?;
        config.grid.validate()?;
        Ok(config)
    }
}
