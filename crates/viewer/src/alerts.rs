use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::MapState;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum Severity {
    Info = 1,
    Notice = 2,
    Warning = 3,
    Error = 4,
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> Self {
        s as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub time: DateTime<Utc>,
}

impl Alert {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity,
            time: Utc::now(),
        }
    }
}

/// Named alert text with `{NAME}` placeholders in the body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AlertTemplate {
    pub key: &'static str,
    pub title: &'static str,
    pub format: &'static str,
    pub severity: Severity,
}

impl AlertTemplate {
    pub fn render(&self, replacements: &[(&str, &str)]) -> Alert {
        let body = replacements
            .iter()
            .fold(self.format.to_string(), |body, (name, value)| {
                body.replace(&format!("{{{name}}}"), value)
            });
        Alert::new(self.title, body, self.severity)
    }
}

pub const ZOOM_TO_LAYER_FAILED: AlertTemplate = AlertTemplate {
    key: "ZOOM_TO_LAYER_FAILED",
    title: "Zoom to Layer Failed",
    format: "Unable to find layer {LAYER}.",
    severity: Severity::Warning,
};

pub fn add_alert(mut state: MapState, alert: Alert) -> MapState {
    tracing::info!(title = %alert.title, body = %alert.body, "alert raised");
    state.alerts.push(alert);
    state
}

/// Removes every alert equal to `alert`.
pub fn dismiss_alert(mut state: MapState, alert: &Alert) -> MapState {
    state.alerts.retain(|a| a != alert);
    state
}

pub fn dismiss_all_alerts(mut state: MapState) -> MapState {
    state.alerts.clear();
    state
}
