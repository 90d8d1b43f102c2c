//! Platform collaborator: API-key exchange over HTTP, application reads
//! through the platform CLI.

use crate::context::AppAttributes;
use crate::error::{Result, SyncError};
use crate::tool_runner;
use serde_json::{Map, Value};
use tracing::debug;

const AUTH_STEP: &str = "authenticate platform";
const LOAD_STEP: &str = "load application";
const METADATA_STEP: &str = "update metadata";

/// Environment variable the platform CLI reads its bearer token from.
pub const CLI_TOKEN_ENV: &str = "NP_TOKEN";

pub trait Platform {
    /// Exchange the long-lived API key for a bearer token.
    fn exchange_api_key(&self, api_key: &str) -> Result<String>;

    /// Read the application as flattened key/value attributes.
    fn read_application(&self, token: &str, app_id: &str) -> Result<AppAttributes>;

    /// Fresh read of the application's metadata object.
    fn read_metadata(&self, token: &str, app_id: &str) -> Result<Map<String, Value>>;
}

/// Pull a non-empty string token out of a JSON response.
/// Absent, null, empty and the literal string `"null"` are all rejected.
pub(crate) fn token_field(body: &Value, field: &str, step: &'static str) -> Result<String> {
    match body.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() && s.trim() != "null" => {
            Ok(s.trim().to_string())
        }
        _ => Err(SyncError::invalid(
            step,
            format!("response has no usable '{field}'"),
        )),
    }
}

/// Send a prepared request and decode a JSON body, mapping each failure
/// class onto the error taxonomy.
pub(crate) fn send_json(
    request: reqwest::blocking::RequestBuilder,
    step: &'static str,
) -> Result<Value> {
    let response = request.send().map_err(|e| SyncError::http(step, e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "unable to read response body".to_string());
        return Err(SyncError::UnexpectedStatus {
            step,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .map_err(|e| SyncError::invalid(step, e.to_string()))
}

// ---------------------------------------------------------------------------
// Flattened output
// ---------------------------------------------------------------------------

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse `KEY=VALUE` lines (optionally prefixed with `export`, values
/// optionally quoted). Blank lines and `#` comments are skipped.
pub fn parse_flattened(output: &str) -> Result<AppAttributes> {
    let mut attrs = AppAttributes::new();
    for (n, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(SyncError::invalid(
                LOAD_STEP,
                format!("line {}: expected KEY=VALUE", n + 1),
            ));
        };
        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(SyncError::invalid(
                LOAD_STEP,
                format!("line {}: invalid key '{key}'", n + 1),
            ));
        }
        attrs.insert(key, unquote(value));
    }
    if attrs.is_empty() {
        return Err(SyncError::invalid(LOAD_STEP, "platform returned no attributes"));
    }
    Ok(attrs)
}

// ---------------------------------------------------------------------------
// PlatformClient
// ---------------------------------------------------------------------------

pub struct PlatformClient {
    api_url: String,
    cli: String,
    http: reqwest::blocking::Client,
}

impl PlatformClient {
    pub fn new(api_url: impl Into<String>, cli: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            cli: cli.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn read_args(app_id: &str, format: &str) -> Vec<String> {
        ["application", "read", "--id", app_id, "--format", format]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

impl Platform for PlatformClient {
    fn exchange_api_key(&self, api_key: &str) -> Result<String> {
        if api_key.trim().is_empty() {
            return Err(SyncError::missing(AUTH_STEP, "api_key"));
        }
        let url = format!("{}/token", self.api_url.trim_end_matches('/'));
        debug!(%url, "exchanging platform api key");
        let body = send_json(
            self.http
                .post(url)
                .json(&serde_json::json!({ "api_key": api_key })),
            AUTH_STEP,
        )?;
        token_field(&body, "access_token", AUTH_STEP)
    }

    fn read_application(&self, token: &str, app_id: &str) -> Result<AppAttributes> {
        let output = tool_runner::run_tool(
            &self.cli,
            &Self::read_args(app_id, "bash"),
            &[(CLI_TOKEN_ENV, token)],
        )?;
        parse_flattened(&output)
    }

    fn read_metadata(&self, token: &str, app_id: &str) -> Result<Map<String, Value>> {
        let output = tool_runner::run_tool(
            &self.cli,
            &Self::read_args(app_id, "json"),
            &[(CLI_TOKEN_ENV, token)],
        )?;
        let app: Value = serde_json::from_str(&output)
            .map_err(|e| SyncError::invalid(METADATA_STEP, e.to_string()))?;
        match app.get("metadata") {
            Some(Value::Object(map)) => Ok(map.clone()),
            _ => Err(SyncError::invalid(
                METADATA_STEP,
                "application has no metadata object",
            )),
        }
    }
}
