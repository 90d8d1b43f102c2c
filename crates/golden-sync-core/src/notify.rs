//! Callback notifications.
//!
//! Two tiers share one sender:
//!
//! - [`Notifier::try_notify`]: progress pings. Skipped when the callback URL
//!   or the platform token is unset, and never returns an error.
//! - [`Notifier::must_notify`] / [`Notifier::report_status`]: mandatory
//!   reports. Both values are required; a non-2xx answer is logged and
//!   tolerated, a transport failure is returned to the caller.

use crate::error::{Result, SyncError};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    level: Level,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: RunStatus,
    execution_status: RunStatus,
}

pub struct Notifier {
    callback_url: Option<String>,
    http: reqwest::blocking::Client,
}

impl Notifier {
    pub fn new(callback_url: Option<String>) -> Self {
        Self {
            callback_url: callback_url.filter(|u| !u.trim().is_empty()),
            http: reqwest::blocking::Client::new(),
        }
    }

    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    /// True when both the callback URL and `token` are usable.
    pub fn can_send(&self, token: Option<&str>) -> bool {
        self.callback_url.is_some() && token.is_some_and(|t| !t.trim().is_empty())
    }

    fn credentials<'a>(&'a self, token: Option<&'a str>) -> Result<(&'a str, &'a str)> {
        let url = self
            .callback_url
            .as_deref()
            .ok_or_else(|| SyncError::missing("notify", "callback_url"))?;
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::missing("notify", "platform_token"))?;
        Ok((url.trim_end_matches('/'), token))
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, token: &str) -> Result<()> {
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|e| SyncError::Notify(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                status = status.as_u16(),
                %body,
                "notification callback returned an error status"
            );
        }
        Ok(())
    }

    /// Best-effort progress message.
    pub fn try_notify(&self, token: Option<&str>, level: Level, message: &str) {
        if !self.can_send(token) {
            debug!(message, "progress notification skipped: no callback credentials");
            return;
        }
        if let Err(e) = self.must_notify(token, level, message) {
            debug!("progress notification failed: {e}");
        }
    }

    /// `POST {url}/message` with `{level, message}`.
    pub fn must_notify(&self, token: Option<&str>, level: Level, message: &str) -> Result<()> {
        let (url, token) = self.credentials(token)?;
        self.send(
            self.http
                .post(format!("{url}/message"))
                .json(&MessageBody { level, message }),
            token,
        )
    }

    /// `PATCH {url}` with `{status, execution_status}`.
    pub fn report_status(&self, token: Option<&str>, status: RunStatus) -> Result<()> {
        let (url, token) = self.credentials(token)?;
        self.send(
            self.http.patch(url).json(&StatusBody {
                status,
                execution_status: status,
            }),
            token,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn try_notify_without_credentials_makes_no_request() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/message").expect(0).create();

        Notifier::new(Some(server.url())).try_notify(None, Level::Info, "hello");
        Notifier::new(None).try_notify(Some("tok"), Level::Info, "hello");
        Notifier::new(Some(String::new())).try_notify(Some("tok"), Level::Info, "hello");
        mock.assert();
    }

    #[test]
    fn try_notify_swallows_transport_errors() {
        Notifier::new(Some("http://127.0.0.1:1".into())).try_notify(
            Some("tok"),
            Level::Info,
            "hello",
        );
    }

    #[test]
    fn must_notify_posts_message() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/message")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(json!({"level": "error", "message": "boom"})))
            .with_status(200)
            .create();

        Notifier::new(Some(server.url()))
            .must_notify(Some("tok"), Level::Error, "boom")
            .unwrap();
        mock.assert();
    }

    #[test]
    fn report_status_patches_callback() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PATCH", "/")
            .match_body(Matcher::Json(
                json!({"status": "success", "execution_status": "success"}),
            ))
            .with_status(204)
            .create();

        Notifier::new(Some(server.url()))
            .report_status(Some("tok"), RunStatus::Success)
            .unwrap();
        mock.assert();
    }

    #[test]
    fn non_success_status_is_tolerated() {
        let mut server = mockito::Server::new();
        let _m = server.mock("PATCH", "/").with_status(500).create();
        assert!(Notifier::new(Some(server.url()))
            .report_status(Some("tok"), RunStatus::Failed)
            .is_ok());
    }

    #[test]
    fn transport_failure_is_an_error() {
        let err = Notifier::new(Some("http://127.0.0.1:1".into()))
            .report_status(Some("tok"), RunStatus::Success)
            .unwrap_err();
        assert!(matches!(err, SyncError::Notify(_)));
    }

    #[test]
    fn mandatory_report_requires_credentials() {
        assert!(matches!(
            Notifier::new(None)
                .report_status(Some("tok"), RunStatus::Success)
                .unwrap_err(),
            SyncError::MissingField { .. }
        ));
        assert!(Notifier::new(Some("http://cb".into()))
            .must_notify(None, Level::Info, "x")
            .is_err());
    }
}
