//! Per-organization hosting app credentials.
//!
//! The store is keyed by organization name and returns the bundle needed to
//! mint an installation token: app id, installation id and the app's RSA
//! private key in PEM form.

use crate::config::SecretStoreConfig;
use crate::error::{Result, SyncError};
use crate::tool_runner;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

const STEP: &str = "resolve app secret";

#[derive(Clone, Deserialize)]
pub struct AppSecret {
    #[serde(deserialize_with = "string_or_number")]
    pub app_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub installation_id: String,
    pub private_key: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSecret")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl AppSecret {
    /// Reject bundles with blank fields.
    pub fn validate(self) -> Result<Self> {
        for (field, value) in [
            ("app_id", &self.app_id),
            ("installation_id", &self.installation_id),
            ("private_key", &self.private_key),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::missing(STEP, field));
            }
        }
        Ok(self)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let secret: AppSecret =
            serde_json::from_str(raw.trim()).map_err(|e| SyncError::invalid(STEP, e.to_string()))?;
        secret.validate()
    }
}

pub trait SecretStore {
    fn lookup(&self, org: &str) -> Result<AppSecret>;
}

// ---------------------------------------------------------------------------
// CommandSecretStore
// ---------------------------------------------------------------------------

/// Looks secrets up by running an external command (the AWS Secrets Manager
/// CLI by default) that prints the bundle as JSON.
pub struct CommandSecretStore {
    config: SecretStoreConfig,
}

impl CommandSecretStore {
    pub fn new(config: SecretStoreConfig) -> Self {
        Self { config }
    }

    fn argv(&self, org: &str) -> Vec<String> {
        let secret_id = self.config.secret_id(org);
        self.config
            .command
            .iter()
            .map(|arg| arg.replace("{secret_id}", &secret_id))
            .collect()
    }
}

impl SecretStore for CommandSecretStore {
    fn lookup(&self, org: &str) -> Result<AppSecret> {
        if org.trim().is_empty() {
            return Err(SyncError::missing(STEP, "org"));
        }
        let argv = self.argv(org);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SyncError::missing(STEP, "secret_store.command"))?;
        let output = tool_runner::run_tool(program, args, &[])?;
        AppSecret::from_json(&output)
    }
}

// ---------------------------------------------------------------------------
// StaticSecretStore
// ---------------------------------------------------------------------------

/// In-memory store, for local runs and tests.
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, AppSecret>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, org: impl Into<String>, secret: AppSecret) -> Self {
        self.secrets.insert(org.into(), secret);
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn lookup(&self, org: &str) -> Result<AppSecret> {
        self.secrets
            .get(org)
            .cloned()
            .ok_or_else(|| SyncError::invalid(STEP, format!("no secret for organization '{org}'")))?
            .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("lookup");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let secret = AppSecret::from_json(
            r#"{"app_id": 123, "installation_id": "456", "private_key": "pem"}"#,
        )
        .unwrap();
        assert_eq!(secret.app_id, "123");
        assert_eq!(secret.installation_id, "456");
    }

    #[test]
    fn blank_fields_are_rejected() {
        let err = AppSecret::from_json(
            r#"{"app_id": "1", "installation_id": "2", "private_key": " "}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::MissingField { field, .. } if field == "private_key"));
        assert!(AppSecret::from_json(r#"{"app_id": "1"}"#).is_err());
    }

    #[test]
    fn debug_hides_private_key() {
        let secret = AppSecret::from_json(
            r#"{"app_id": "1", "installation_id": "2", "private_key": "-----BEGIN"}"#,
        )
        .unwrap();
        assert!(!format!("{secret:?}").contains("BEGIN"));
    }

    #[test]
    fn command_store_substitutes_secret_id() {
        let dir = TempDir::new().unwrap();
        let program = script(
            &dir,
            r#"[ "$1" = "--id" ] && [ "$2" = "github-app/acme" ] || exit 4
echo '{"app_id":"11","installation_id":"22","private_key":"pem"}'"#,
        );
        let store = CommandSecretStore::new(SecretStoreConfig {
            command: vec![program, "--id".into(), "{secret_id}".into()],
            secret_id_template: "github-app/{org}".into(),
        });
        let secret = store.lookup("acme").unwrap();
        assert_eq!(secret.installation_id, "22");
    }

    #[test]
    fn command_store_propagates_lookup_failure() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "echo 'ResourceNotFoundException' >&2; exit 254");
        let store = CommandSecretStore::new(SecretStoreConfig {
            command: vec![program],
            secret_id_template: "{org}".into(),
        });
        assert!(matches!(
            store.lookup("acme").unwrap_err(),
            SyncError::ToolFailed { .. }
        ));
    }

    #[test]
    fn command_store_requires_org() {
        let store = CommandSecretStore::new(SecretStoreConfig::default());
        assert!(matches!(
            store.lookup("").unwrap_err(),
            SyncError::MissingField { .. }
        ));
    }

    #[test]
    fn static_store_misses_unknown_org() {
        let store = StaticSecretStore::new();
        assert!(store.lookup("acme").is_err());
    }
}
