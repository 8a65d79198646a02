use log::{info, warn};
use serde::{Deserialize, Serialize};
use sightcore::{EngineListener, StatusUpdate};
use std::sync::{Arc, RwLock};

/// Latest engine signals as served to HTTP clients.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusModel {
    pub status: StatusUpdate,
    pub alerts: Vec<String>,
    pub notifications: usize,
}

pub type SharedModel = Arc<RwLock<StatusModel>>;

/// Feeds orchestrator signals into a [`SharedModel`].
pub struct ModelListener {
    model: SharedModel,
}

impl ModelListener {
    pub fn new(model: SharedModel) -> Self {
        Self { model }
    }

    fn update(&self, change: impl FnOnce(&mut StatusModel)) {
        match self.model.write() {
            Ok(mut guard) => change(&mut guard),
            Err(_) => warn!("status model lock poisoned; dropping update"),
        }
    }
}

impl EngineListener for ModelListener {
    fn on_status(&mut self, status: &StatusUpdate) {
        let status = status.clone();
        self.update(|model| model.status = status);
    }

    fn on_alert(&mut self, message: &str) {
        warn!("[ALERT] {}", message);
        let message = message.to_string();
        self.update(|model| model.alerts.push(message));
    }

    fn on_notification(&mut self, status: &StatusUpdate) {
        info!(
            "Scanning: wifi {} bt {} ble {} cell {} at {}",
            status.wifi, status.bt, status.ble, status.cell, status.grid_reference
        );
        self.update(|model| model.notifications += 1);
    }
}
