//! Scene setup - camera, lights and viewer tracking

use arhome_core::{Pose, RawMatrix};
use bevy::prelude::*;

use crate::placement::ViewerPose;
use crate::ArHomeSet;

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Marker component for the main directional light
#[derive(Component)]
pub struct MainDirectionalLight;

/// Plugin for scene setup
pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(Color::NONE))
            .add_systems(Startup, setup_scene)
            .add_systems(Update, follow_viewer.in_set(ArHomeSet::Sync));
    }
}

fn setup_scene(mut commands: Commands) {
    // Passthrough camera; the AR runtime supplies the view every frame
    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::NONE),
            ..default()
        },
        Projection::Perspective(PerspectiveProjection {
            fov: 70.0_f32.to_radians(),
            near: 0.01,
            far: 20.0,
            ..default()
        }),
        Transform::IDENTITY,
        MainCamera,
    ));

    // Half-strength ambient fill
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
        ..default()
    });

    // Key light from above and to the side, casting shadows on placed furniture
    commands.spawn((
        DirectionalLight {
            illuminance: 4000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 15.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainDirectionalLight,
    ));
}

/// Convert a column-major AR matrix into a Bevy transform
///
/// Returns `None` for matrices [`Pose`] rejects.
pub fn transform_from_raw(raw: &RawMatrix) -> Option<Transform> {
    let pose = Pose::from_cols_array(raw).ok()?;
    Some(transform_from_pose(&pose))
}

pub fn transform_from_pose(pose: &Pose) -> Transform {
    Transform::from_matrix(Mat4::from_cols_array(&pose.to_cols_array()))
}

fn follow_viewer(viewer: Res<ViewerPose>, mut cameras: Query<&mut Transform, With<MainCamera>>) {
    if !viewer.is_changed() {
        return;
    }
    let Some(pose) = viewer.0 else {
        return;
    };
    for mut transform in &mut cameras {
        *transform = pose;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_from_raw() {
        let raw = Mat4::from_translation(Vec3::new(1.0, 0.5, -2.0)).to_cols_array();
        let transform = transform_from_raw(&raw).unwrap();
        assert!(transform.translation.abs_diff_eq(Vec3::new(1.0, 0.5, -2.0), 1e-6));
        assert!(transform.scale.abs_diff_eq(Vec3::ONE, 1e-6));
    }

    #[test]
    fn test_transform_from_raw_rejects_garbage() {
        let mut raw = Mat4::IDENTITY.to_cols_array();
        raw[5] = f32::NAN;
        assert!(transform_from_raw(&raw).is_none());
        assert!(transform_from_raw(&[0.0; 16]).is_none());
    }
}
