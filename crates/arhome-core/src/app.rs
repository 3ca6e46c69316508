//! Application state
//!
//! [`ArHome`] owns everything the AR callbacks touch: the placement state
//! machine, the asset registry, the placed furniture and the UI signals
//! waiting to be shown. Hosts construct it once and feed it messages.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::indicator::TrackingIndicator;
use crate::message::{FrameSample, UiSignal, XrInbox, XrMessage};
use crate::placement::{FrameOutcome, PlacementSkip, PlacementStateMachine, TrackingState};
use crate::registry::AssetRegistry;

/// A furniture clone in the scene. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedInstance<A> {
    pub id: Uuid,
    pub asset_id: String,
    pub template: A,
    pub position: Vec3,
}

/// Session, registry and scene state of the app
#[derive(Debug, Clone)]
pub struct ArHome<A> {
    placement: PlacementStateMachine,
    registry: AssetRegistry<A>,
    instances: Vec<PlacedInstance<A>>,
    signals: Vec<UiSignal>,
}

impl<A> Default for ArHome<A> {
    fn default() -> Self {
        Self {
            placement: PlacementStateMachine::new(),
            registry: AssetRegistry::new(),
            instances: Vec::new(),
            signals: Vec::new(),
        }
    }
}

impl<A: Clone> ArHome<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placement(&self) -> &PlacementStateMachine {
        &self.placement
    }

    pub fn state(&self) -> TrackingState {
        self.placement.state()
    }

    pub fn indicator(&self) -> &TrackingIndicator {
        self.placement.indicator()
    }

    pub fn registry(&self) -> &AssetRegistry<A> {
        &self.registry
    }

    /// Loads are registered directly by whoever owns the asset loader
    pub fn registry_mut(&mut self) -> &mut AssetRegistry<A> {
        &mut self.registry
    }

    /// Placed furniture in creation order
    pub fn instances(&self) -> &[PlacedInstance<A>] {
        &self.instances
    }

    /// Hand pending UI signals to the UI collaborator
    pub fn take_signals(&mut self) -> Vec<UiSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Process every queued message in arrival order
    pub fn drain(&mut self, inbox: &XrInbox) {
        for message in inbox.drain() {
            self.handle(message);
        }
    }

    /// Apply one message from the host
    pub fn handle(&mut self, message: XrMessage) {
        match message {
            XrMessage::SessionStarted => {
                if self.placement.begin_session() {
                    self.signals.push(UiSignal::SessionStarted);
                }
            }
            XrMessage::Frame(frame) => {
                self.on_frame(&frame);
            }
            XrMessage::Select => {
                let _ = self.on_select();
            }
            XrMessage::SelectAsset(id) => {
                self.placement.select_asset(id.clone());
                self.signals.push(UiSignal::AssetSelected(id));
            }
            XrMessage::ClearSelection => {
                self.placement.clear_selection();
            }
            XrMessage::SessionEnded => {
                if self.placement.end_session() {
                    self.signals.push(UiSignal::SessionEnded);
                }
            }
            XrMessage::ActivationFailed(reason) => {
                self.signals.push(UiSignal::ActivationFailed(reason));
            }
            XrMessage::AssetFailed { id, reason } => {
                self.registry.mark_failed(id, reason);
            }
        }
    }

    /// Run the per-frame step and surface the stabilization signal
    pub fn on_frame(&mut self, frame: &FrameSample) -> Option<FrameOutcome> {
        let outcome = self.placement.on_frame(frame)?;
        if outcome.stabilized_now {
            self.signals.push(UiSignal::Stabilized);
        }
        Some(outcome)
    }

    /// Commit the selected asset at the indicator position
    ///
    /// Every skip is silent apart from a debug log.
    pub fn on_select(&mut self) -> Result<&PlacedInstance<A>, PlacementSkip> {
        let placement = match self.placement.commit(&self.registry) {
            Ok(placement) => placement,
            Err(skip) => {
                debug!(reason = %skip, "Select ignored");
                return Err(skip);
            }
        };

        let instance = PlacedInstance {
            id: Uuid::new_v4(),
            asset_id: placement.asset_id,
            template: placement.template,
            position: placement.position,
        };
        info!(
            asset = %instance.asset_id,
            id = %instance.id,
            x = instance.position.x,
            y = instance.position.y,
            z = instance.position.z,
            "Placed furniture"
        );
        self.instances.push(instance);
        Ok(&self.instances[self.instances.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AssetStatus;
    use glam::Mat4;

    fn hit_at(x: f32, y: f32, z: f32) -> XrMessage {
        XrMessage::Frame(FrameSample::with_hits([
            Mat4::from_translation(Vec3::new(x, y, z)).to_cols_array()
        ]))
    }

    fn running() -> ArHome<&'static str> {
        let mut app = ArHome::new();
        app.registry_mut().register("chair", "SheenChair");
        app.handle(XrMessage::SessionStarted);
        app
    }

    #[test]
    fn test_chair_placed_at_indicator() {
        let mut app = running();
        app.handle(XrMessage::SelectAsset("chair".to_string()));
        app.handle(hit_at(1.0, 0.0, 2.0));
        app.handle(XrMessage::Select);

        assert_eq!(app.instances().len(), 1);
        let chair = &app.instances()[0];
        assert_eq!(chair.asset_id, "chair");
        assert_eq!(chair.template, "SheenChair");
        assert_eq!(chair.position, Vec3::new(1.0, 0.0, 2.0));
        assert!(app.registry().is_ready("chair"));
    }

    #[test]
    fn test_select_without_selection_is_noop() {
        let mut app = running();
        app.handle(hit_at(1.0, 0.0, 2.0));
        app.handle(XrMessage::Select);
        assert!(app.instances().is_empty());
    }

    #[test]
    fn test_select_with_hidden_indicator_is_noop() {
        let mut app = running();
        app.handle(XrMessage::SelectAsset("chair".to_string()));
        app.handle(hit_at(1.0, 0.0, 2.0));
        app.handle(XrMessage::Frame(FrameSample::empty()));
        app.handle(XrMessage::Select);
        assert!(app.instances().is_empty());
    }

    #[test]
    fn test_lamp_before_load_is_noop() {
        let mut app = running();
        app.registry_mut().mark_loading("lamp");
        app.handle(XrMessage::SelectAsset("lamp".to_string()));
        app.handle(hit_at(0.0, 0.0, -1.0));

        assert_eq!(
            app.on_select().err(),
            Some(PlacementSkip::AssetUnavailable("lamp".to_string()))
        );
        assert!(app.instances().is_empty());

        app.registry_mut().register("lamp", "Lantern");
        app.handle(XrMessage::Select);
        assert_eq!(app.instances().len(), 1);
    }

    #[test]
    fn test_each_select_adds_one_instance() {
        let mut app = running();
        app.handle(XrMessage::SelectAsset("chair".to_string()));
        app.handle(hit_at(1.0, 0.0, 2.0));
        app.handle(XrMessage::Select);
        app.handle(hit_at(-1.0, 0.0, 3.0));
        app.handle(XrMessage::Select);

        let positions: Vec<Vec3> = app.instances().iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![Vec3::new(1.0, 0.0, 2.0), Vec3::new(-1.0, 0.0, 3.0)]);
        assert_ne!(app.instances()[0].id, app.instances()[1].id);
    }

    #[test]
    fn test_signal_sequence() {
        let inbox = XrInbox::new();
        let mut app: ArHome<&str> = ArHome::new();

        inbox.push(XrMessage::ActivationFailed("not supported".to_string()));
        inbox.push(XrMessage::SessionStarted);
        inbox.push(XrMessage::Frame(FrameSample::empty()));
        inbox.push(hit_at(0.0, 0.0, -1.0));
        inbox.push(hit_at(0.0, 0.0, -1.5));
        inbox.push(XrMessage::SelectAsset("table".to_string()));
        inbox.push(XrMessage::SessionEnded);
        inbox.push(XrMessage::SessionEnded);
        app.drain(&inbox);

        assert_eq!(
            app.take_signals(),
            vec![
                UiSignal::ActivationFailed("not supported".to_string()),
                UiSignal::SessionStarted,
                UiSignal::Stabilized,
                UiSignal::AssetSelected("table".to_string()),
                UiSignal::SessionEnded,
            ]
        );
        assert!(app.take_signals().is_empty());
        assert_eq!(app.state(), TrackingState::Idle);
    }

    #[test]
    fn test_clear_selection_message() {
        let mut app = running();
        app.handle(XrMessage::SelectAsset("chair".to_string()));
        app.handle(hit_at(1.0, 0.0, 2.0));
        app.handle(XrMessage::ClearSelection);

        assert!(app.indicator().is_visible());
        assert_eq!(app.on_select().err(), Some(PlacementSkip::NoSelection));
        assert!(app.instances().is_empty());
    }

    #[test]
    fn test_load_outcomes() {
        let mut app: ArHome<&str> = ArHome::new();
        app.registry_mut().mark_loading("lamp");
        app.registry_mut().mark_loading("table");

        app.registry_mut().register("lamp", "Lantern");
        app.handle(XrMessage::AssetFailed {
            id: "table".to_string(),
            reason: "404".to_string(),
        });

        assert_eq!(app.registry().status("lamp"), AssetStatus::Ready);
        assert_eq!(app.registry().status("table"), AssetStatus::Failed);

        app.handle(XrMessage::SessionStarted);
        app.handle(XrMessage::SelectAsset("lamp".to_string()));
        app.handle(hit_at(0.0, 0.0, -1.0));
        assert!(app.on_select().is_ok());
    }

    #[test]
    fn test_failed_load_message() {
        let mut app: ArHome<&str> = ArHome::new();
        app.handle(XrMessage::AssetFailed {
            id: "table".to_string(),
            reason: "404".to_string(),
        });
        assert_eq!(app.registry().failure("table"), Some("404"));
    }
}
