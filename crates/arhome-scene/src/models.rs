//! Furniture catalog loading
//!
//! Each catalog entry is requested as a glTF at startup and marked loading
//! in the registry. Once the asset server resolves a file its scene becomes
//! the template clones are spawned from.

use std::collections::HashMap;

use arhome_core::ModelEntry;
use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::prelude::*;

use crate::placement::ArHomeState;
use crate::{ArHomeSet, Catalog};

/// A loaded furniture template
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTemplate {
    pub scene: Handle<Scene>,
    /// Uniform scale from the catalog, kept by every clone
    pub scale: f32,
}

/// glTF loads still in flight, by catalog id
#[derive(Resource, Default)]
pub struct ModelLoads {
    pub loading: HashMap<String, Handle<Gltf>>,
}

pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelLoads>()
            .add_systems(Startup, start_model_loads)
            .add_systems(Update, poll_model_loads.in_set(ArHomeSet::Load));
    }
}

fn start_model_loads(
    catalog: Res<Catalog>,
    asset_server: Res<AssetServer>,
    mut loads: ResMut<ModelLoads>,
    mut state: ResMut<ArHomeState>,
) {
    for entry in &catalog.models {
        let handle: Handle<Gltf> = asset_server.load(entry.url.clone());
        state.registry_mut().mark_loading(entry.id.clone());
        loads.loading.insert(entry.id.clone(), handle);
        tracing::info!(model = %entry.id, url = %entry.url, "Loading furniture model");
    }
}

fn poll_model_loads(
    catalog: Res<Catalog>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
    mut loads: ResMut<ModelLoads>,
    mut state: ResMut<ArHomeState>,
) {
    if loads.loading.is_empty() {
        return;
    }

    let ids: Vec<String> = loads.loading.keys().cloned().collect();
    for id in ids {
        let Some(handle) = loads.loading.get(&id) else {
            continue;
        };

        match asset_server.get_load_state(handle.id()) {
            Some(LoadState::Loaded) => {
                let scene = gltf_assets.get(handle).and_then(template_scene);
                match (scene, catalog.model(&id)) {
                    (Some(scene), Some(entry)) => {
                        state.registry_mut().register(id.clone(), template_for(entry, scene));
                    }
                    _ => {
                        state
                            .registry_mut()
                            .mark_failed(id.clone(), "glTF file contains no scene");
                    }
                }
                loads.loading.remove(&id);
            }
            Some(LoadState::Failed(err)) => {
                tracing::error!(model = %id, error = %err, "Failed to load furniture model");
                state.registry_mut().mark_failed(id.clone(), err.to_string());
                loads.loading.remove(&id);
            }
            _ => {
                // Still loading
            }
        }
    }
}

/// Default scene, or the first one when the file names none
fn template_scene(gltf: &Gltf) -> Option<Handle<Scene>> {
    gltf.default_scene
        .clone()
        .or_else(|| gltf.scenes.first().cloned())
}

fn template_for(entry: &ModelEntry, scene: Handle<Scene>) -> ModelTemplate {
    ModelTemplate {
        scene,
        scale: entry.scale,
    }
}
