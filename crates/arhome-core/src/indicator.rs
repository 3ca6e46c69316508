//! Tracking indicator - the ring that follows the detected surface

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// Pose and visibility of the tracking ring
///
/// Starts hidden. The placement state machine calls [`set_pose`] or [`hide`]
/// once per frame; renderers read both fields every pass.
///
/// [`set_pose`]: TrackingIndicator::set_pose
/// [`hide`]: TrackingIndicator::hide
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingIndicator {
    pose: Pose,
    visible: bool,
}

impl TrackingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the indicator and make it visible
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.visible = true;
    }

    /// Hide the indicator, keeping its last pose
    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Current world position
    pub fn position(&self) -> Vec3 {
        self.pose.position()
    }
}
