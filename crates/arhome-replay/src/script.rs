//! Session scripts
//!
//! A script describes what the simulated AR device grants and the ordered
//! inputs of one run:
//!
//! ```json
//! {
//!   "device": { "features": ["hit-test"] },
//!   "steps": [
//!     { "action": "load", "model": "chair" },
//!     { "action": "select_asset", "model": "chair" },
//!     { "action": "frame", "hits": [[1.0, 0.0, 2.0]] },
//!     { "action": "select" },
//!     { "action": "end" }
//!   ]
//! }
//! ```

use std::{fs, path::Path};

use arhome_core::{FrameSample, RawMatrix};
use glam::{Mat4, Vec3};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub device: DeviceScript,
    pub steps: Vec<Step>,
}

/// Capabilities of the simulated device
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceScript {
    /// Device supports the requested session mode
    #[serde(default = "default_true")]
    pub supported: bool,
    /// User declines the permission prompt
    #[serde(default)]
    pub deny: bool,
    /// Features the device can grant
    #[serde(default = "default_features")]
    pub features: Vec<String>,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            supported: true,
            deny: false,
            features: default_features(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_features() -> Vec<String> {
    vec!["dom-overlay".to_string(), "hit-test".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Start (or restart) the session. Runs implicitly before the first step.
    Activate,
    /// Model picked from the menu
    SelectAsset { model: String },
    /// Pick dismissed
    ClearSelection,
    /// One animation frame
    Frame(FrameStep),
    /// Screen tap
    Select,
    /// Catalog model finished loading
    Load { model: String },
    /// Catalog model failed to load
    FailLoad {
        model: String,
        #[serde(default = "default_failure")]
        reason: String,
    },
    /// App ends the session
    End,
    /// User leaves AR from the browser
    HostEnd,
}

fn default_failure() -> String {
    "load failed".to_string()
}

/// A hit as a bare position or a full column-major matrix
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HitSpec {
    Position([f32; 3]),
    Matrix([f32; 16]),
}

impl HitSpec {
    pub fn to_matrix(&self) -> RawMatrix {
        match self {
            HitSpec::Position(p) => Mat4::from_translation(Vec3::from_array(*p)).to_cols_array(),
            HitSpec::Matrix(m) => *m,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameStep {
    /// Hit results, nearest first; `null` for a hit with no pose
    #[serde(default)]
    pub hits: Vec<Option<HitSpec>>,
    #[serde(default)]
    pub viewer: Option<HitSpec>,
}

impl FrameStep {
    pub fn to_sample(&self) -> FrameSample {
        FrameSample {
            hits: self
                .hits
                .iter()
                .map(|hit| hit.as_ref().map(HitSpec::to_matrix))
                .collect(),
            viewer: self.viewer.as_ref().map(HitSpec::to_matrix),
        }
    }
}

impl Script {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        let script: Script = serde_json::from_str(contents)?;
        if script.steps.is_empty() {
            anyhow::bail!("session script contains no steps");
        }
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let script = Script::from_json(
            r#"{
                "steps": [
                    { "action": "select_asset", "model": "chair" },
                    { "action": "frame", "hits": [[1.0, 0.0, 2.0], null] },
                    { "action": "fail_load", "model": "lamp" },
                    { "action": "host_end" }
                ]
            }"#,
        )
        .unwrap();

        assert!(script.device.supported);
        assert_eq!(script.device.features, vec!["dom-overlay", "hit-test"]);
        assert!(matches!(&script.steps[0], Step::SelectAsset { model } if model == "chair"));
        assert!(matches!(&script.steps[2], Step::FailLoad { reason, .. } if reason == "load failed"));
        assert!(matches!(script.steps[3], Step::HostEnd));

        let Step::Frame(frame) = &script.steps[1] else {
            panic!("expected a frame step");
        };
        let sample = frame.to_sample();
        assert_eq!(sample.hits.len(), 2);
        assert!(sample.hits[1].is_none());
        let hit = sample.hits[0].unwrap();
        assert_eq!(&hit[12..15], &[1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_matrix_hit() {
        let script = Script::from_json(
            r#"{ "steps": [ { "action": "frame", "hits": [
                [1,0,0,0, 0,1,0,0, 0,0,1,0, 3,0,-1,1]
            ] } ] }"#,
        )
        .unwrap();
        let Step::Frame(frame) = &script.steps[0] else {
            panic!("expected a frame step");
        };
        assert_eq!(frame.to_sample().hits[0].unwrap()[12], 3.0);
    }

    #[test]
    fn test_empty_script_rejected() {
        assert!(Script::from_json(r#"{ "steps": [] }"#).is_err());
    }
}
