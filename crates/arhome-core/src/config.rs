//! Configuration loading and the furniture catalog

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::session::SessionMode;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Duplicate model id in catalog: {0}")]
    DuplicateModel(String),
    #[error("Invalid indicator radii: inner {inner} must be below outer {outer}")]
    InvalidIndicator { inner: f32, outer: f32 },
    #[error("Indicator ring needs at least 3 segments, got {0}")]
    TooFewSegments(u32),
}

/// Fewest segments that still close the ring
pub const MIN_SEGMENTS: u32 = 3;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArHomeConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub ui: UiConfig,
    /// Furniture catalog
    #[serde(default = "default_models", rename = "model")]
    pub models: Vec<ModelEntry>,
}

impl Default for ArHomeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            indicator: IndicatorConfig::default(),
            ui: UiConfig::default(),
            models: default_models(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session mode requested from the AR subsystem
    #[serde(default)]
    pub mode: SessionMode,
    /// Features the session cannot run without
    #[serde(default)]
    pub required_features: Vec<String>,
    /// Features requested if available
    #[serde(default = "default_optional_features")]
    pub optional_features: Vec<String>,
    /// DOM overlay root element id (None = document body)
    #[serde(default)]
    pub dom_overlay_root: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            required_features: Vec::new(),
            optional_features: default_optional_features(),
            dom_overlay_root: None,
        }
    }
}

fn default_optional_features() -> Vec<String> {
    vec!["dom-overlay".to_string(), "hit-test".to_string()]
}

/// Tracking ring geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Inner radius in meters
    #[serde(default = "default_inner_radius")]
    pub inner_radius: f32,
    /// Outer radius in meters
    #[serde(default = "default_outer_radius")]
    pub outer_radius: f32,
    /// Segments around the ring
    #[serde(default = "default_segments")]
    pub segments: u32,
    /// RGB colour, 0xRRGGBB
    #[serde(default = "default_color")]
    pub color: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            inner_radius: default_inner_radius(),
            outer_radius: default_outer_radius(),
            segments: default_segments(),
            color: default_color(),
        }
    }
}

impl IndicatorConfig {
    /// Colour as linear-agnostic `[r, g, b]` in 0..=1
    pub fn rgb(&self) -> [f32; 3] {
        let channel = |shift: u32| ((self.color >> shift) & 0xff) as f32 / 255.0;
        [channel(16), channel(8), channel(0)]
    }
}

fn default_inner_radius() -> f32 {
    0.15
}

fn default_outer_radius() -> f32 {
    0.2
}

fn default_segments() -> u32 {
    32
}

fn default_color() -> u32 {
    0xffffff
}

/// Ids of the DOM elements toggled by session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_enter_button")]
    pub enter_button: String,
    #[serde(default = "default_menu")]
    pub menu: String,
    #[serde(default = "default_stabilization_hint")]
    pub stabilization_hint: String,
    /// Class used to hide elements
    #[serde(default = "default_hidden_class")]
    pub hidden_class: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enter_button: default_enter_button(),
            menu: default_menu(),
            stabilization_hint: default_stabilization_hint(),
            hidden_class: default_hidden_class(),
        }
    }
}

fn default_enter_button() -> String {
    "enter-ar".to_string()
}

fn default_menu() -> String {
    "furniture-menu".to_string()
}

fn default_stabilization_hint() -> String {
    "stabilization".to_string()
}

fn default_hidden_class() -> String {
    "hidden".to_string()
}

/// A furniture model in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Identifier used by the menu (e.g., "chair")
    pub id: String,
    /// glTF URL
    pub url: String,
    /// Uniform scale applied to the template
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Human-readable label
    #[serde(default)]
    pub label: Option<String>,
}

impl ModelEntry {
    pub fn new(id: &str, url: &str, scale: f32) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            scale,
            label: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

fn default_scale() -> f32 {
    1.0
}

const SAMPLE_MODELS: &str =
    "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Models/master/2.0";

fn default_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::new("chair", &format!("{}/SheenChair/glTF/SheenChair.gltf", SAMPLE_MODELS), 0.5),
        // Lantern is authored at building scale
        ModelEntry::new("lamp", &format!("{}/Lantern/glTF/Lantern.gltf", SAMPLE_MODELS), 0.01),
        ModelEntry::new(
            "table",
            &format!("{}/SimpleSparseAccessor/glTF/SimpleSparseAccessor.gltf", SAMPLE_MODELS),
            0.5,
        ),
    ]
}

impl ArHomeConfig {
    /// Parse and validate from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ArHomeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(ConfigError::DuplicateModel(model.id.clone()));
            }
        }

        if self.indicator.inner_radius >= self.indicator.outer_radius {
            return Err(ConfigError::InvalidIndicator {
                inner: self.indicator.inner_radius,
                outer: self.indicator.outer_radius,
            });
        }

        if self.indicator.segments < MIN_SEGMENTS {
            return Err(ConfigError::TooFewSegments(self.indicator.segments));
        }

        Ok(())
    }

    pub fn model(&self, id: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ArHomeConfig, ConfigError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config = ArHomeConfig::from_toml(&content)?;
        info!(path = %path.display(), models = config.models.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ArHomeConfig::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<(), ConfigError> {
    let content = ArHomeConfig::default().to_toml()?;
    std::fs::write(path, content)?;
    Ok(())
}
