//! Placement state machine
//!
//! Consumes one [`FrameSample`] per rendered frame, keeps the tracking
//! indicator on the nearest detected surface, and turns select signals into
//! placed furniture.
//!
//! ```text
//!   Idle --begin_session--> Tracking --first hit--> Stabilized
//!     ^                        |                        |
//!     +-------end_session------+------------------------+
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::indicator::TrackingIndicator;
use crate::message::FrameSample;
use crate::pose::{Pose, PoseError};
use crate::registry::AssetRegistry;

/// Tracking state of the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// No active session
    #[default]
    Idle,
    /// Session active, no surface found yet
    Tracking,
    /// At least one surface hit this session
    Stabilized,
}

impl TrackingState {
    pub fn is_active(&self) -> bool {
        !matches!(self, TrackingState::Idle)
    }
}

/// Result of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    /// Number of hit-test results in the frame
    pub hits: usize,
    /// This frame moved the session from Tracking to Stabilized
    pub stabilized_now: bool,
    /// Indicator visibility after the frame
    pub indicator_visible: bool,
    /// Why the indicator was hidden despite hits
    pub pose_error: Option<PoseError>,
}

/// Why a select signal placed nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementSkip {
    /// No model picked from the menu
    NoSelection,
    /// No surface under the indicator
    IndicatorHidden,
    /// Picked model not (yet) loaded
    AssetUnavailable(String),
}

impl std::fmt::Display for PlacementSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementSkip::NoSelection => write!(f, "no model selected"),
            PlacementSkip::IndicatorHidden => write!(f, "indicator hidden"),
            PlacementSkip::AssetUnavailable(id) => write!(f, "asset {} unavailable", id),
        }
    }
}

/// A template clone ready to be added to the scene
#[derive(Debug, Clone, PartialEq)]
pub struct Placement<A> {
    pub asset_id: String,
    pub template: A,
    pub position: Vec3,
}

/// Per-session tracking and placement logic
#[derive(Debug, Clone, Default)]
pub struct PlacementStateMachine {
    state: TrackingState,
    indicator: TrackingIndicator,
    selected_asset: Option<String>,
}

impl PlacementStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_stabilized(&self) -> bool {
        self.state == TrackingState::Stabilized
    }

    pub fn indicator(&self) -> &TrackingIndicator {
        &self.indicator
    }

    pub fn selected_asset(&self) -> Option<&str> {
        self.selected_asset.as_deref()
    }

    /// Enter Tracking. Returns false if a session was already running.
    pub fn begin_session(&mut self) -> bool {
        if self.state.is_active() {
            return false;
        }
        info!("Tracking started");
        self.state = TrackingState::Tracking;
        self.indicator.hide();
        true
    }

    /// Return to Idle. Returns false if no session was running.
    pub fn end_session(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        info!(stabilized = self.is_stabilized(), "Tracking stopped");
        self.state = TrackingState::Idle;
        self.indicator.hide();
        true
    }

    /// Pick the model placed by subsequent select signals
    pub fn select_asset(&mut self, id: impl Into<String>) {
        let id = id.into();
        debug!(asset = %id, "Model selected");
        self.selected_asset = Some(id);
    }

    pub fn clear_selection(&mut self) {
        self.selected_asset = None;
    }

    /// Process one frame. Returns `None` while Idle.
    pub fn on_frame(&mut self, frame: &FrameSample) -> Option<FrameOutcome> {
        if !self.state.is_active() {
            return None;
        }

        let mut outcome = FrameOutcome {
            hits: frame.hits.len(),
            stabilized_now: false,
            indicator_visible: false,
            pose_error: None,
        };

        let Some(&first) = frame.hits.first() else {
            self.indicator.hide();
            return Some(outcome);
        };

        if self.state == TrackingState::Tracking {
            info!("Surface found, tracking stabilized");
            self.state = TrackingState::Stabilized;
            outcome.stabilized_now = true;
        }

        let pose = first
            .ok_or(PoseError::Unavailable)
            .and_then(|cols| Pose::from_cols_array(&cols));

        match pose {
            Ok(pose) => {
                self.indicator.set_pose(pose);
                outcome.indicator_visible = true;
            }
            Err(e) => {
                debug!(error = %e, "Skipping malformed hit pose");
                self.indicator.hide();
                outcome.pose_error = Some(e);
            }
        }

        Some(outcome)
    }

    /// Resolve a select signal against the registry
    ///
    /// Copies only the indicator position onto the clone; the surface
    /// orientation is not applied.
    pub fn commit<A: Clone>(
        &self,
        registry: &AssetRegistry<A>,
    ) -> Result<Placement<A>, PlacementSkip> {
        let asset_id = self
            .selected_asset
            .as_deref()
            .ok_or(PlacementSkip::NoSelection)?;

        if !self.indicator.is_visible() {
            return Err(PlacementSkip::IndicatorHidden);
        }

        let template = registry
            .clone_asset(asset_id)
            .map_err(|_| PlacementSkip::AssetUnavailable(asset_id.to_string()))?;

        Ok(Placement {
            asset_id: asset_id.to_string(),
            template,
            position: self.indicator.position(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Quat};

    fn at(x: f32, y: f32, z: f32) -> [f32; 16] {
        Mat4::from_translation(Vec3::new(x, y, z)).to_cols_array()
    }

    fn active() -> PlacementStateMachine {
        let mut machine = PlacementStateMachine::new();
        machine.begin_session();
        machine
    }

    #[test]
    fn test_frames_ignored_while_idle() {
        let mut machine = PlacementStateMachine::new();
        assert_eq!(machine.on_frame(&FrameSample::with_hits([at(0.0, 0.0, 0.0)])), None);
        assert_eq!(machine.state(), TrackingState::Idle);
        assert!(!machine.indicator().is_visible());
    }

    #[test]
    fn test_empty_frame_hides_indicator() {
        let mut machine = active();
        machine.on_frame(&FrameSample::with_hits([at(1.0, 0.0, 2.0)]));
        assert!(machine.indicator().is_visible());

        let outcome = machine.on_frame(&FrameSample::empty()).unwrap();
        assert_eq!(outcome.hits, 0);
        assert!(!outcome.indicator_visible);
        assert!(!machine.indicator().is_visible());
    }

    #[test]
    fn test_first_hit_drives_indicator() {
        let mut machine = active();
        let rotation = Quat::from_rotation_x(-0.3);
        let first = Mat4::from_rotation_translation(rotation, Vec3::new(0.2, -1.4, -0.8));

        machine.on_frame(&FrameSample::with_hits([
            first.to_cols_array(),
            at(5.0, 5.0, 5.0),
        ]));

        assert!(machine.indicator().is_visible());
        assert_eq!(machine.indicator().pose().matrix(), first);
    }

    #[test]
    fn test_stabilizes_once_per_session() {
        let mut machine = active();
        assert_eq!(machine.state(), TrackingState::Tracking);

        let first = machine.on_frame(&FrameSample::empty()).unwrap();
        assert!(!first.stabilized_now);

        let second = machine.on_frame(&FrameSample::with_hits([at(0.0, 0.0, -1.0)])).unwrap();
        assert!(second.stabilized_now);
        assert_eq!(machine.state(), TrackingState::Stabilized);

        // Losing the surface does not leave Stabilized
        machine.on_frame(&FrameSample::empty());
        let third = machine.on_frame(&FrameSample::with_hits([at(0.0, 0.0, -1.0)])).unwrap();
        assert!(!third.stabilized_now);
        assert_eq!(machine.state(), TrackingState::Stabilized);

        // A new session may stabilize again
        machine.end_session();
        machine.begin_session();
        let again = machine.on_frame(&FrameSample::with_hits([at(0.0, 0.0, -1.0)])).unwrap();
        assert!(again.stabilized_now);
    }

    #[test]
    fn test_malformed_pose_hides_indicator() {
        let mut machine = active();
        machine.on_frame(&FrameSample::with_hits([at(1.0, 0.0, 1.0)]));

        let mut broken = at(0.0, 0.0, 0.0);
        broken[12] = f32::INFINITY;
        let outcome = machine.on_frame(&FrameSample::with_hits([broken])).unwrap();

        assert!(!outcome.indicator_visible);
        assert_eq!(outcome.pose_error, Some(PoseError::NonFinite(12)));
        assert!(!machine.indicator().is_visible());
    }

    #[test]
    fn test_unavailable_pose_hides_indicator_but_stabilizes() {
        let mut machine = active();
        let outcome = machine
            .on_frame(&FrameSample {
                hits: vec![None],
                viewer: None,
            })
            .unwrap();

        assert!(outcome.stabilized_now);
        assert_eq!(outcome.pose_error, Some(PoseError::Unavailable));
        assert!(!machine.indicator().is_visible());
    }

    #[test]
    fn test_commit_requires_selection() {
        let mut registry = AssetRegistry::new();
        registry.register("chair", "SheenChair");

        let mut machine = active();
        machine.on_frame(&FrameSample::with_hits([at(1.0, 0.0, 2.0)]));

        assert_eq!(machine.commit(&registry), Err(PlacementSkip::NoSelection));
    }

    #[test]
    fn test_commit_after_clear_selection() {
        let mut registry = AssetRegistry::new();
        registry.register("chair", "SheenChair");

        let mut machine = active();
        machine.select_asset("chair");
        machine.on_frame(&FrameSample::with_hits([at(1.0, 0.0, 2.0)]));
        assert!(machine.commit(&registry).is_ok());

        machine.clear_selection();
        assert_eq!(machine.selected_asset(), None);
        assert!(machine.indicator().is_visible());
        assert_eq!(machine.commit(&registry), Err(PlacementSkip::NoSelection));
    }

    #[test]
    fn test_commit_requires_visible_indicator() {
        let mut registry = AssetRegistry::new();
        registry.register("chair", "SheenChair");

        let mut machine = active();
        machine.select_asset("chair");
        machine.on_frame(&FrameSample::empty());

        assert_eq!(machine.commit(&registry), Err(PlacementSkip::IndicatorHidden));
    }

    #[test]
    fn test_commit_copies_position_only() {
        let mut registry = AssetRegistry::new();
        registry.register("chair", "SheenChair");

        let mut machine = active();
        machine.select_asset("chair");
        let tilted = Mat4::from_rotation_translation(
            Quat::from_rotation_z(0.4),
            Vec3::new(1.0, 0.0, 2.0),
        );
        machine.on_frame(&FrameSample::with_hits([tilted.to_cols_array()]));

        let placement = machine.commit(&registry).unwrap();
        assert_eq!(placement.asset_id, "chair");
        assert_eq!(placement.template, "SheenChair");
        assert!(placement.position.abs_diff_eq(Vec3::new(1.0, 0.0, 2.0), 1e-6));
    }

    #[test]
    fn test_commit_before_asset_loads() {
        let mut registry: AssetRegistry<&str> = AssetRegistry::new();
        registry.mark_loading("lamp");

        let mut machine = active();
        machine.select_asset("lamp");
        machine.on_frame(&FrameSample::with_hits([at(0.0, 0.0, -1.0)]));

        assert_eq!(
            machine.commit(&registry),
            Err(PlacementSkip::AssetUnavailable("lamp".to_string()))
        );
    }

    #[test]
    fn test_end_session_hides_indicator() {
        let mut machine = active();
        machine.select_asset("table");
        machine.on_frame(&FrameSample::with_hits([at(0.0, 0.0, -1.0)]));

        assert!(machine.end_session());
        assert!(!machine.end_session());
        assert_eq!(machine.state(), TrackingState::Idle);
        assert!(!machine.indicator().is_visible());
        assert_eq!(machine.selected_asset(), Some("table"));
    }
}
