//! Tracking ring that snaps to detected surfaces

use std::f32::consts::FRAC_PI_2;

use arhome_core::IndicatorConfig;
use bevy::prelude::*;

use crate::placement::ArHomeState;
use crate::scene::transform_from_pose;
use crate::{ArHomeSet, Catalog};

/// Marker component for the tracking ring
#[derive(Component)]
pub struct TrackingRing;

pub struct IndicatorPlugin;

impl Plugin for IndicatorPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_indicator)
            .add_systems(Update, sync_indicator.in_set(ArHomeSet::Sync));
    }
}

/// Flat annulus lying in the XZ plane, facing +Y
pub fn ring_mesh(config: &IndicatorConfig) -> Mesh {
    Annulus::new(config.inner_radius, config.outer_radius)
        .mesh()
        .resolution(config.segments)
        .build()
        .rotated_by(Quat::from_rotation_x(-FRAC_PI_2))
}

fn spawn_indicator(
    mut commands: Commands,
    catalog: Res<Catalog>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let [r, g, b] = catalog.indicator.rgb();
    commands.spawn((
        Mesh3d(meshes.add(ring_mesh(&catalog.indicator))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(r, g, b),
            unlit: true,
            ..default()
        })),
        Transform::IDENTITY,
        Visibility::Hidden, // Shown once a surface is hit
        TrackingRing,
    ));
}

fn sync_indicator(
    state: Res<ArHomeState>,
    mut rings: Query<(&mut Transform, &mut Visibility), With<TrackingRing>>,
) {
    if !state.is_changed() {
        return;
    }

    let indicator = state.indicator();
    for (mut transform, mut visibility) in &mut rings {
        if indicator.is_visible() {
            *transform = transform_from_pose(indicator.pose());
            *visibility = Visibility::Inherited;
        } else {
            *visibility = Visibility::Hidden;
        }
    }
}
