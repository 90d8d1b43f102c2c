//! Inbound event handling.
//!
//! The trigger delivers a JSON document with a `notification` object. Every
//! key of that object is exposed as an env-style variable named
//! `NOTIFICATION_<KEY>` (uppercased), which is how the rest of the tool
//! reads inbound values such as the resource name and the callback URL.

use crate::error::{Result, SyncError};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const NOTIFICATION_PREFIX: &str = "NOTIFICATION_";
pub const NRN_VAR: &str = "NOTIFICATION_NRN";
pub const CALLBACK_URL_VAR: &str = "NOTIFICATION_CALLBACK_URL";
pub const ENTITY_VAR: &str = "NOTIFICATION_ENTITY";

pub const APPLICATION_ENTITY: &str = "application";

const STEP: &str = "parse event";

static APP_ID_RE: OnceLock<Regex> = OnceLock::new();

fn app_id_re() -> &'static Regex {
    APP_ID_RE.get_or_init(|| Regex::new(r"(?:^|:)application=([^:]+)").unwrap())
}

/// Extract the application id from a resource name such as
/// `organization=1:account=2:namespace=3:application=app-123`.
pub fn app_id_from_nrn(nrn: Option<&str>) -> Result<String> {
    let nrn = nrn
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SyncError::missing(STEP, NRN_VAR))?;
    app_id_re()
        .captures(nrn)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SyncError::invalid(STEP, format!("no application id in '{nrn}'")))
}

/// Entity named by the last `key=value` segment of a resource name.
pub fn entity_from_nrn(nrn: &str) -> Option<&str> {
    nrn.rsplit(':')
        .next()
        .and_then(|segment| segment.split_once('='))
        .map(|(key, _)| key.trim())
        .filter(|key| !key.is_empty())
}

// ---------------------------------------------------------------------------
// InboundEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    notification: Option<serde_json::Map<String, serde_json::Value>>,
}

impl InboundEvent {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The `notification` object flattened into env-style variables.
    pub fn vars(&self) -> Result<NotificationVars> {
        let notification = self
            .notification
            .as_ref()
            .ok_or_else(|| SyncError::missing(STEP, "notification"))?;
        Ok(NotificationVars::from_notification(notification))
    }
}

// ---------------------------------------------------------------------------
// NotificationVars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationVars {
    vars: BTreeMap<String, String>,
}

/// `callback-url` -> `NOTIFICATION_CALLBACK_URL`
pub fn var_name(key: &str) -> String {
    let normalized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{NOTIFICATION_PREFIX}{normalized}")
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl NotificationVars {
    pub fn from_notification(notification: &serde_json::Map<String, serde_json::Value>) -> Self {
        let vars = notification
            .iter()
            .map(|(k, v)| (var_name(k), render_value(v)))
            .collect();
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn nrn(&self) -> Option<&str> {
        self.get(NRN_VAR)
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.get(CALLBACK_URL_VAR)
    }

    /// Explicit `entity` key when present, otherwise derived from the NRN.
    pub fn entity(&self) -> Option<&str> {
        self.get(ENTITY_VAR)
            .or_else(|| self.nrn().and_then(entity_from_nrn))
    }

    pub fn is_application_event(&self) -> bool {
        self.entity()
            .is_some_and(|e| e.eq_ignore_ascii_case(APPLICATION_ENTITY))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `export NAME='value'` lines for a POSIX shell.
    pub fn to_exports(&self) -> String {
        self.vars
            .iter()
            .map(|(k, v)| format!("export {k}='{}'\n", v.replace('\'', r"'\''")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_app_id_from_middle_segment() {
        let id = app_id_from_nrn(Some("organization=1:application=app-123:scope=9")).unwrap();
        assert_eq!(id, "app-123");
    }

    #[test]
    fn extracts_app_id_from_last_segment() {
        let id = app_id_from_nrn(Some(
            "organization=1:account=2:namespace=3:application=app-42",
        ))
        .unwrap();
        assert_eq!(id, "app-42");
    }

    #[test]
    fn absent_nrn_is_missing_field() {
        assert!(matches!(
            app_id_from_nrn(None).unwrap_err(),
            SyncError::MissingField { .. }
        ));
        assert!(matches!(
            app_id_from_nrn(Some("   ")).unwrap_err(),
            SyncError::MissingField { .. }
        ));
    }

    #[test]
    fn nrn_without_application_segment_fails() {
        let err = app_id_from_nrn(Some("organization=1:account=2")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse { .. }));
        // `subapplication=` must not match
        assert!(app_id_from_nrn(Some("organization=1:subapplication=7")).is_err());
        assert!(app_id_from_nrn(Some("organization=1:application=")).is_err());
    }

    #[test]
    fn notification_keys_become_prefixed_vars() {
        let event = InboundEvent::from_json(
            r#"{"notification":{"nrn":"organization=1:application=7","callback-url":"http://cb","attempt":3,"extra":null}}"#,
        )
        .unwrap();
        let vars = event.vars().unwrap();
        assert_eq!(vars.nrn(), Some("organization=1:application=7"));
        assert_eq!(vars.callback_url(), Some("http://cb"));
        assert_eq!(vars.get("NOTIFICATION_ATTEMPT"), Some("3"));
        assert_eq!(vars.get("NOTIFICATION_EXTRA"), None);
    }

    #[test]
    fn event_without_notification_is_rejected() {
        let event = InboundEvent::from_json(r#"{"other":{}}"#).unwrap();
        assert!(event.vars().is_err());
    }

    #[test]
    fn entity_prefers_explicit_key() {
        let event = InboundEvent::from_json(
            r#"{"notification":{"entity":"scope","nrn":"organization=1:application=7"}}"#,
        )
        .unwrap();
        let vars = event.vars().unwrap();
        assert_eq!(vars.entity(), Some("scope"));
        assert!(!vars.is_application_event());
    }

    #[test]
    fn entity_falls_back_to_nrn() {
        let event =
            InboundEvent::from_json(r#"{"notification":{"nrn":"organization=1:application=7"}}"#)
                .unwrap();
        assert!(event.vars().unwrap().is_application_event());

        let event = InboundEvent::from_json(
            r#"{"notification":{"nrn":"organization=1:application=7:scope=3"}}"#,
        )
        .unwrap();
        assert!(!event.vars().unwrap().is_application_event());
    }

    #[test]
    fn exports_quote_values() {
        let event =
            InboundEvent::from_json(r#"{"notification":{"message":"it's done"}}"#).unwrap();
        let exports = event.vars().unwrap().to_exports();
        assert_eq!(exports, "export NOTIFICATION_MESSAGE='it'\\''s done'\n");
    }
}
