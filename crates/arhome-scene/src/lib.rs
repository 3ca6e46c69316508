//! AR Home Designer Scene - Bevy rendering of the placement state
//!
//! This crate turns [`arhome_core::ArHome`] into a Bevy scene: it loads the
//! furniture catalog, draws the tracking ring, spawns a clone for every
//! placed instance and keeps the camera on the viewer pose. Hosts feed it
//! through the shared [`XrInbox`] and read [`UiSignalMessage`]s back.

pub mod indicator;
pub mod models;
pub mod placement;
pub mod scene;

use arhome_core::{ArHomeConfig, XrInbox};
use bevy::prelude::*;

/// Plugin that wires the AR scene around a catalog and a host inbox
pub struct ArHomeScenePlugin {
    pub config: ArHomeConfig,
    pub inbox: XrInbox,
}

impl ArHomeScenePlugin {
    pub fn new(config: ArHomeConfig, inbox: XrInbox) -> Self {
        Self { config, inbox }
    }
}

impl Plugin for ArHomeScenePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Catalog(self.config.clone()))
            .insert_resource(PendingXrMessages(self.inbox.clone()))
            .configure_sets(
                Update,
                (ArHomeSet::Load, ArHomeSet::Process, ArHomeSet::Sync).chain(),
            )
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(indicator::IndicatorPlugin)
            .add_plugins(models::ModelsPlugin)
            .add_plugins(placement::PlacementPlugin);
    }
}

/// Catalog and display settings the scene was built from
#[derive(Resource, Debug, Clone, Deref)]
pub struct Catalog(pub ArHomeConfig);

/// Messages pushed by the host callbacks, drained once per frame
#[derive(Resource, Clone, Default, Deref)]
pub struct PendingXrMessages(pub XrInbox);

/// UI signal forwarded to whatever presents the DOM
#[derive(Message, Debug, Clone, PartialEq)]
pub struct UiSignalMessage(pub arhome_core::UiSignal);

/// Schedule ordering for the AR systems
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArHomeSet {
    /// Asset loads resolve into the registry
    Load,
    /// Host messages are applied to the state machine
    Process,
    /// Entities follow the updated state
    Sync,
}

pub use models::ModelTemplate;
pub use placement::{ArHomeState, PlacedFurniture, ViewerPose};
pub use scene::MainCamera;
pub use indicator::TrackingRing;
