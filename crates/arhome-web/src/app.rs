//! Bevy application setup

use std::cell::RefCell;
use std::rc::Rc;

use arhome_core::{SessionManager, XrInbox};
use arhome_scene::{ArHomeScenePlugin, ArHomeSet, Catalog, UiSignalMessage};
use bevy::prelude::*;

use crate::dom;
use crate::xr::WebXrBackend;

pub fn run() {
    let config = dom::page_config();
    let inbox = XrInbox::new();

    // The manager lives outside Bevy: its futures and browser handles are
    // not Send, and only DOM handlers drive it
    let manager = Rc::new(RefCell::new(SessionManager::new(
        WebXrBackend,
        &config.session,
        inbox.clone(),
    )));
    if let Err(e) = dom::bind(&config.ui, manager, inbox.clone()) {
        tracing::error!(error = ?e, "Failed to bind page controls");
    }

    App::new()
        .add_plugins(DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "AR Home Designer".to_string(),
                    canvas: Some("#arhome-canvas".to_string()),
                    fit_canvas_to_parent: true,
                    // Camera passthrough shows through the overlay
                    transparent: true,
                    prevent_default_event_handling: false,
                    ..default()
                }),
                ..default()
            })
            .set(AssetPlugin {
                // Catalog URLs are absolute
                meta_check: bevy::asset::AssetMetaCheck::Never,
                ..default()
            })
        )
        .add_plugins(ArHomeScenePlugin::new(config, inbox))
        .add_systems(Update, present_ui_signals.after(ArHomeSet::Process))
        .run();
}

fn present_ui_signals(catalog: Res<Catalog>, mut signals: MessageReader<UiSignalMessage>) {
    for UiSignalMessage(signal) in signals.read() {
        dom::apply_signal(&catalog, signal);
    }
}
