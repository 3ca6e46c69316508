//! Applying host messages and spawning placed furniture

use arhome_core::{ArHome, PlacedInstance, XrMessage};
use bevy::prelude::*;

use crate::models::ModelTemplate;
use crate::scene::transform_from_raw;
use crate::{ArHomeSet, PendingXrMessages, UiSignalMessage};

/// App state shared by every AR system
#[derive(Resource, Default, Deref, DerefMut)]
pub struct ArHomeState(pub ArHome<ModelTemplate>);

/// Last viewer pose reported by the AR runtime
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct ViewerPose(pub Option<Transform>);

/// A furniture clone spawned for a placed instance
#[derive(Component, Debug, Clone)]
pub struct PlacedFurniture {
    pub instance_id: String,
    pub asset_id: String,
}

pub struct PlacementPlugin;

impl Plugin for PlacementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ArHomeState>()
            .init_resource::<ViewerPose>()
            .add_message::<UiSignalMessage>()
            .add_systems(Update, process_xr_messages.in_set(ArHomeSet::Process))
            .add_systems(Update, spawn_placed_instances.in_set(ArHomeSet::Sync));
    }
}

/// Drain the host inbox into the state machine
pub fn process_xr_messages(
    pending: Res<PendingXrMessages>,
    mut state: ResMut<ArHomeState>,
    mut viewer: ResMut<ViewerPose>,
    mut signals: MessageWriter<UiSignalMessage>,
) {
    let messages = pending.drain();
    if messages.is_empty() {
        return;
    }

    for message in messages {
        if let XrMessage::Frame(frame) = &message {
            // Keep the previous view when tracking drops out
            if let Some(pose) = frame.viewer.as_ref().and_then(transform_from_raw) {
                viewer.0 = Some(pose);
            }
        }
        state.handle(message);
    }

    for signal in state.take_signals() {
        signals.write(UiSignalMessage(signal));
    }
}

/// Spawn a scene clone for every instance created since the last run
pub fn spawn_placed_instances(
    mut commands: Commands,
    state: Res<ArHomeState>,
    mut spawned: Local<usize>,
) {
    let instances = state.instances();
    if instances.len() <= *spawned {
        return;
    }

    for instance in &instances[*spawned..] {
        commands.spawn((
            SceneRoot(instance.template.scene.clone()),
            placed_transform(instance),
            PlacedFurniture {
                instance_id: instance.id.to_string(),
                asset_id: instance.asset_id.clone(),
            },
        ));
    }
    *spawned = instances.len();
}

/// Position from the indicator, scale from the template, no rotation
pub fn placed_transform(instance: &PlacedInstance<ModelTemplate>) -> Transform {
    Transform::from_translation(Vec3::from_array(instance.position.to_array()))
        .with_scale(Vec3::splat(instance.template.scale))
}
