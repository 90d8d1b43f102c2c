use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// SecretStoreConfig
// ---------------------------------------------------------------------------

/// How the per-organization app credentials are looked up.
///
/// `command` is an argv template; every `{secret_id}` in it is replaced with
/// `secret_id_template` after `{org}` has been substituted. The command must
/// print a JSON object with `app_id`, `installation_id` and `private_key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretStoreConfig {
    #[serde(default = "default_secret_command")]
    pub command: Vec<String>,
    #[serde(default = "default_secret_id_template")]
    pub secret_id_template: String,
}

fn default_secret_command() -> Vec<String> {
    [
        "aws",
        "secretsmanager",
        "get-secret-value",
        "--secret-id",
        "{secret_id}",
        "--query",
        "SecretString",
        "--output",
        "text",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_secret_id_template() -> String {
    "github-app/{org}".to_string()
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            command: default_secret_command(),
            secret_id_template: default_secret_id_template(),
        }
    }
}

impl SecretStoreConfig {
    pub fn secret_id(&self, org: &str) -> String {
        self.secret_id_template.replace("{org}", org)
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_platform_api_url")]
    pub platform_api_url: String,
    /// Platform CLI used for application reads.
    #[serde(default = "default_platform_cli")]
    pub platform_cli: String,
    #[serde(default = "default_hosting_api_url")]
    pub hosting_api_url: String,
    #[serde(default)]
    pub secret_store: SecretStoreConfig,
    #[serde(default = "default_author_name")]
    pub commit_author_name: String,
    #[serde(default = "default_author_email")]
    pub commit_author_email: String,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    /// Directory the working copy is cloned into.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
}

fn default_platform_api_url() -> String {
    "https://api.nullplatform.com".to_string()
}

fn default_platform_cli() -> String {
    "np".to_string()
}

fn default_hosting_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_author_name() -> String {
    "golden-sync[bot]".to_string()
}

fn default_author_email() -> String {
    "golden-sync[bot]@users.noreply.github.com".to_string()
}

fn default_metadata_file() -> String {
    "metadata.json".to_string()
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform_api_url: default_platform_api_url(),
            platform_cli: default_platform_cli(),
            hosting_api_url: default_hosting_api_url(),
            secret_store: SecretStoreConfig::default(),
            commit_author_name: default_author_name(),
            commit_author_email: default_author_email(),
            metadata_file: default_metadata_file(),
            workspace_dir: default_workspace_dir(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or defaults when no file is given.
    /// Keys missing from the file keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_without_path_uses_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.metadata_file, "metadata.json");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("golden-sync.yaml");
        std::fs::write(
            &path,
            "hosting_api_url: http://localhost:9999\nsecret_store:\n  secret_id_template: apps/{org}/github\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.hosting_api_url, "http://localhost:9999");
        assert_eq!(settings.secret_store.secret_id("acme"), "apps/acme/github");
        assert_eq!(settings.secret_store.command[0], "aws");
        assert_eq!(settings.platform_cli, "np");
    }

    #[test]
    fn empty_file_is_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("golden-sync.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(Settings::load(Some(&path)).unwrap(), Settings::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }
}
