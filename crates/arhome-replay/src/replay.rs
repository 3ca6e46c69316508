//! Runs a script through the session manager and application state

use std::collections::BTreeMap;
use std::fmt;

use arhome_core::{
    ArHome, ArHomeConfig, AssetStatus, ModelEntry, PlacedInstance, SessionError, SessionManager,
    UiSignal, XrInbox, XrMessage,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::ScriptedBackend;
use crate::script::{Script, Step};

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Session still running when the script ran out
    pub active: bool,
    /// UI signals in emission order
    pub signals: Vec<UiSignal>,
    pub instances: Vec<PlacedInstance<ModelEntry>>,
    /// Final load status per catalog model
    pub assets: BTreeMap<String, AssetStatus>,
}

pub async fn run(script: &Script, config: &ArHomeConfig) -> anyhow::Result<Report> {
    let inbox = XrInbox::new();
    let mut manager = SessionManager::new(
        ScriptedBackend::new(script.device.clone()),
        &config.session,
        inbox.clone(),
    );
    let mut app: ArHome<ModelEntry> = ArHome::new();
    let mut signals = Vec::new();

    for model in &config.models {
        app.registry_mut().mark_loading(model.id.clone());
    }

    activate(&mut manager).await;
    app.drain(&inbox);
    signals.extend(app.take_signals());

    for (index, step) in script.steps.iter().enumerate() {
        debug!(step = index, ?step, "Replaying step");
        match step {
            Step::Activate => activate(&mut manager).await,
            Step::SelectAsset { model } => inbox.push(XrMessage::SelectAsset(model.clone())),
            Step::ClearSelection => inbox.push(XrMessage::ClearSelection),
            Step::Frame(frame) => {
                if manager.is_active() {
                    if let Some(sample) = manager.sample(&frame.to_sample()) {
                        inbox.push(XrMessage::Frame(sample));
                    }
                } else {
                    debug!(step = index, "Frame dropped, no session running");
                }
            }
            Step::Select => {
                if manager.is_active() {
                    inbox.push(XrMessage::Select);
                } else {
                    debug!(step = index, "Tap outside AR ignored");
                }
            }
            Step::Load { model } => {
                let Some(entry) = config.model(model) else {
                    anyhow::bail!("step {}: model '{}' is not in the catalog", index, model);
                };
                app.registry_mut().register(model.clone(), entry.clone());
            }
            Step::FailLoad { model, reason } => inbox.push(XrMessage::AssetFailed {
                id: model.clone(),
                reason: reason.clone(),
            }),
            Step::End => {
                if !manager.deactivate() {
                    debug!(step = index, "End requested with no session");
                }
            }
            Step::HostEnd => match manager.session() {
                Some(session) => session.host_end(),
                None => debug!(step = index, "Host end with no session"),
            },
        }

        app.drain(&inbox);
        signals.extend(app.take_signals());
    }

    let assets = config
        .models
        .iter()
        .map(|m| (m.id.clone(), app.registry().status(&m.id)))
        .collect();

    Ok(Report {
        active: manager.is_active(),
        signals,
        instances: app.instances().to_vec(),
        assets,
    })
}

async fn activate(manager: &mut SessionManager<ScriptedBackend>) {
    match manager.activate().await {
        Ok(()) => {
            if let Some(session) = manager.session() {
                info!(features = ?session.granted(), "Session granted");
            }
        }
        Err(SessionError::AlreadyActive) => debug!("Session already active"),
        Err(e) => warn!(error = %e, "Activation failed"),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Signals:")?;
        for signal in &self.signals {
            writeln!(f, "  - {:?}", signal)?;
        }

        writeln!(f, "Placed {} instance(s):", self.instances.len())?;
        for instance in &self.instances {
            writeln!(
                f,
                "  - {} at ({:.3}, {:.3}, {:.3}) scale {} [{}]",
                instance.template.display_name(),
                instance.position.x,
                instance.position.y,
                instance.position.z,
                instance.template.scale,
                instance.id
            )?;
        }

        writeln!(f, "Assets:")?;
        for (id, status) in &self.assets {
            writeln!(f, "  - {}: {}", id, status)?;
        }

        write!(f, "Session: {}", if self.active { "active" } else { "ended" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use tempfile::TempDir;

    async fn replay(json: &str) -> Report {
        let script = Script::from_json(json).unwrap();
        run(&script, &ArHomeConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_place_chair() {
        let report = replay(
            r#"{ "steps": [
                { "action": "load", "model": "chair" },
                { "action": "select_asset", "model": "chair" },
                { "action": "frame", "hits": [[1.0, 0.0, 2.0]] },
                { "action": "select" }
            ] }"#,
        )
        .await;

        assert!(report.active);
        assert_eq!(report.instances.len(), 1);
        assert_eq!(report.instances[0].asset_id, "chair");
        assert_eq!(report.instances[0].template.scale, 0.5);
        assert_eq!(report.instances[0].position, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(
            report.signals,
            vec![
                UiSignal::SessionStarted,
                UiSignal::AssetSelected("chair".to_string()),
                UiSignal::Stabilized,
            ]
        );
        assert_eq!(report.assets["chair"], AssetStatus::Ready);
        assert_eq!(report.assets["lamp"], AssetStatus::Loading);
    }

    #[tokio::test]
    async fn test_unsupported_device() {
        let report = replay(
            r#"{ "device": { "supported": false }, "steps": [
                { "action": "select_asset", "model": "chair" },
                { "action": "frame", "hits": [[1.0, 0.0, 2.0]] },
                { "action": "select" }
            ] }"#,
        )
        .await;

        assert!(!report.active);
        assert!(report.instances.is_empty());
        assert!(matches!(report.signals[0], UiSignal::ActivationFailed(_)));
        assert_eq!(
            report
                .signals
                .iter()
                .filter(|s| matches!(s, UiSignal::ActivationFailed(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_missing_hit_test_fails_activation() {
        let report = replay(
            r#"{ "device": { "features": ["dom-overlay"] }, "steps": [
                { "action": "frame", "hits": [[0.0, 0.0, -1.0]] }
            ] }"#,
        )
        .await;

        assert!(!report.active);
        assert!(matches!(&report.signals[..], [UiSignal::ActivationFailed(reason)] if reason.contains("hit-test")));
    }

    #[tokio::test]
    async fn test_lamp_unavailable_until_loaded() {
        let report = replay(
            r#"{ "steps": [
                { "action": "select_asset", "model": "lamp" },
                { "action": "frame", "hits": [[0.0, 0.0, -1.0]] },
                { "action": "select" },
                { "action": "load", "model": "lamp" },
                { "action": "select" }
            ] }"#,
        )
        .await;

        assert_eq!(report.instances.len(), 1);
        assert_eq!(report.instances[0].template.scale, 0.01);
    }

    #[tokio::test]
    async fn test_failed_load_reported() {
        let report = replay(
            r#"{ "steps": [
                { "action": "fail_load", "model": "table", "reason": "404" },
                { "action": "select_asset", "model": "table" },
                { "action": "frame", "hits": [[0.0, 0.0, -1.0]] },
                { "action": "select" }
            ] }"#,
        )
        .await;

        assert!(report.instances.is_empty());
        assert_eq!(report.assets["table"], AssetStatus::Failed);
    }

    #[tokio::test]
    async fn test_host_end_then_reenter() {
        let report = replay(
            r#"{ "steps": [
                { "action": "load", "model": "chair" },
                { "action": "select_asset", "model": "chair" },
                { "action": "frame", "hits": [[0.0, 0.0, -1.0]] },
                { "action": "host_end" },
                { "action": "select" },
                { "action": "activate" },
                { "action": "frame", "hits": [[0.5, 0.0, -1.0]] },
                { "action": "select" }
            ] }"#,
        )
        .await;

        assert!(report.active);
        assert_eq!(report.instances.len(), 1);
        assert_eq!(report.instances[0].position, Vec3::new(0.5, 0.0, -1.0));
        assert_eq!(
            report.signals,
            vec![
                UiSignal::SessionStarted,
                UiSignal::AssetSelected("chair".to_string()),
                UiSignal::Stabilized,
                UiSignal::SessionEnded,
                UiSignal::SessionStarted,
                UiSignal::Stabilized,
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_selection_step() {
        let report = replay(
            r#"{ "steps": [
                { "action": "load", "model": "chair" },
                { "action": "select_asset", "model": "chair" },
                { "action": "frame", "hits": [[1.0, 0.0, 2.0]] },
                { "action": "clear_selection" },
                { "action": "select" }
            ] }"#,
        )
        .await;

        assert!(report.active);
        assert!(report.instances.is_empty());
    }

    #[tokio::test]
    async fn test_replay_from_files() {
        let temp_dir = TempDir::new().unwrap();
        let script_path = temp_dir.path().join("session.json");
        let config_path = temp_dir.path().join("arhome.toml");

        std::fs::write(
            &script_path,
            r#"{ "steps": [
                { "action": "load", "model": "sofa" },
                { "action": "select_asset", "model": "sofa" },
                { "action": "frame", "hits": [[0.0, 0.0, -2.0]] },
                { "action": "select" }
            ] }"#,
        )
        .unwrap();
        std::fs::write(
            &config_path,
            r#"
[[model]]
id = "sofa"
url = "models/sofa.glb"
scale = 2.0
"#,
        )
        .unwrap();

        let script = Script::from_path(&script_path).unwrap();
        let config = arhome_core::config::load_config(&config_path).unwrap();
        let report = run(&script, &config).await.unwrap();

        assert_eq!(report.instances.len(), 1);
        assert_eq!(report.instances[0].template.scale, 2.0);
        assert_eq!(report.instances[0].position, Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(report.assets.len(), 1);
    }

    #[test]
    fn test_missing_script_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Script::from_path(&temp_dir.path().join("missing.json")).is_err());
    }

    #[tokio::test]
    async fn test_unknown_model_load_is_error() {
        let script = Script::from_json(r#"{ "steps": [ { "action": "load", "model": "sofa" } ] }"#)
            .unwrap();
        assert!(run(&script, &ArHomeConfig::default()).await.is_err());
    }

    #[test]
    fn test_report_text() {
        let report = Report {
            active: false,
            signals: vec![UiSignal::SessionEnded],
            instances: Vec::new(),
            assets: BTreeMap::from([("chair".to_string(), AssetStatus::Ready)]),
        };
        let text = report.to_string();
        assert!(text.contains("Placed 0 instance(s)"));
        assert!(text.contains("chair: ready"));
        assert!(text.ends_with("Session: ended"));
    }
}
