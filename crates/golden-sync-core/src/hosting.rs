//! Hosting provider credentials.
//!
//! Minting an installation token takes three hops: derive the organization
//! from the repository URL, resolve that organization's app secret, then
//! exchange a short-lived RS256 assertion signed with the app key for an
//! installation-scoped access token.

use crate::error::{Result, SyncError};
use crate::platform::{send_json, token_field};
use crate::secrets::AppSecret;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tracing::debug;

const ORG_STEP: &str = "extract organization";
const SIGN_STEP: &str = "sign app assertion";
const EXCHANGE_STEP: &str = "exchange installation token";

/// Lifetime of the signed app assertion. The provider caps it at ten minutes.
pub const ASSERTION_TTL_SECS: i64 = 540;

const USER_AGENT: &str = "golden-sync";

/// Organization named by `https://<host>/<org>/...`.
pub fn org_from_repository_url(url: &str) -> Result<String> {
    let org = url.trim().split('/').nth(3).unwrap_or("").trim();
    if org.is_empty() {
        return Err(SyncError::invalid(
            ORG_STEP,
            format!("no organization in repository url '{url}'"),
        ));
    }
    Ok(org.to_string())
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
}

/// Build the signed app assertion: `{"typ":"JWT","alg":"RS256"}` header,
/// `iat`/`exp`/`iss` claims, base64url segments without padding.
///
/// The key is parsed in memory and never written to disk.
pub fn mint_assertion(app_id: &str, private_key_pem: &str, now: i64) -> Result<String> {
    if app_id.trim().is_empty() {
        return Err(SyncError::missing(SIGN_STEP, "app_id"));
    }
    let claims = Claims {
        iat: now,
        exp: now + ASSERTION_TTL_SECS,
        iss: app_id.trim(),
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| SyncError::Signing(e.to_string()))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| SyncError::Signing(e.to_string()))
}

pub struct HostingClient {
    api_url: String,
    http: reqwest::blocking::Client,
}

impl HostingClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// POST the assertion to the installation-token endpoint.
    pub fn exchange_installation_token(
        &self,
        installation_id: &str,
        assertion: &str,
    ) -> Result<String> {
        if installation_id.trim().is_empty() {
            return Err(SyncError::missing(EXCHANGE_STEP, "installation_id"));
        }
        let endpoint = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url.trim_end_matches('/'),
            installation_id.trim()
        );
        debug!(%endpoint, "requesting installation token");
        let body = send_json(
            self.http
                .post(endpoint)
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", USER_AGENT)
                .header("X-GitHub-Api-Version", "2022-11-28")
                .bearer_auth(assertion),
            EXCHANGE_STEP,
        )?;
        token_field(&body, "token", EXCHANGE_STEP)
    }

    /// Sign an assertion for `secret` and trade it for an installation token.
    pub fn installation_token(&self, secret: &AppSecret, now: i64) -> Result<String> {
        let assertion = mint_assertion(&secret.app_id, &secret.private_key, now)?;
        self.exchange_installation_token(&secret.installation_id, &assertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde::Deserialize;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/app_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/app_key.pub.pem");

    #[derive(Debug, Deserialize)]
    struct DecodedClaims {
        iat: i64,
        exp: i64,
        iss: String,
    }

    fn secret() -> AppSecret {
        AppSecret {
            app_id: "1234".into(),
            installation_id: "5678".into(),
            private_key: PRIVATE_KEY.into(),
        }
    }

    #[test]
    fn org_is_fourth_segment() {
        assert_eq!(
            org_from_repository_url("https://github.com/acme/widget").unwrap(),
            "acme"
        );
        assert_eq!(
            org_from_repository_url("https://github.com/acme/widget.git").unwrap(),
            "acme"
        );
    }

    #[test]
    fn url_without_org_fails() {
        assert!(org_from_repository_url("https://github.com").is_err());
        assert!(org_from_repository_url("https://github.com/").is_err());
        assert!(org_from_repository_url("").is_err());
    }

    #[test]
    fn assertion_verifies_with_public_key() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_assertion("1234", PRIVATE_KEY, now).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
        let data =
            jsonwebtoken::decode::<DecodedClaims>(&token, &key, &Validation::new(Algorithm::RS256))
                .unwrap();
        assert_eq!(data.claims.iss, "1234");
        assert_eq!(data.claims.iat, now);
        assert_eq!(data.claims.exp, now + 540);
    }

    #[test]
    fn bad_key_is_a_signing_error() {
        let err = mint_assertion("1234", "not a pem", 0).unwrap_err();
        assert!(matches!(err, SyncError::Signing(_)));
    }

    #[test]
    fn exchange_posts_assertion_as_bearer() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/app/installations/5678/access_tokens")
            .match_header("authorization", mockito::Matcher::Regex("^Bearer .+\\..+\\..+$".into()))
            .match_header("accept", "application/vnd.github+json")
            .with_status(201)
            .with_body(r#"{"token":"ghs_abc","expires_at":"2030-01-01T00:00:00Z"}"#)
            .create();

        let client = HostingClient::new(server.url());
        let token = client
            .installation_token(&secret(), chrono::Utc::now().timestamp())
            .unwrap();
        assert_eq!(token, "ghs_abc");
        mock.assert();
    }

    #[test]
    fn exchange_rejects_missing_token() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/app/installations/5678/access_tokens")
            .with_status(201)
            .with_body(r#"{"token":null}"#)
            .create();
        let client = HostingClient::new(server.url());
        let err = client
            .installation_token(&secret(), chrono::Utc::now().timestamp())
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse { .. }));
    }

    #[test]
    fn signing_failure_makes_no_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/app/installations/5678/access_tokens")
            .expect(0)
            .create();
        let client = HostingClient::new(server.url());
        let mut bad = secret();
        bad.private_key = "garbage".into();
        assert!(client.installation_token(&bad, 0).is_err());
        mock.assert();
    }
}
