//! Google OAuth2 authorization
//!
//! Authorization is delegated to an [`AuthorizationBroker`]. On mobile the
//! broker wraps the platform authorization client; on desktop
//! [`StoredTokenBroker`] keeps tokens in the settings store and runs the
//! loopback authorization code flow when the user asks to log in.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use crate::config::GoogleCredentials;
use crate::storage::SettingsStore;

/// Scope for files the user opened with (or created through) this app
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
/// Scope for reading the signed-in user's email address
pub const USERINFO_EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// Scopes every Sheets/Drive call needs
pub const REQUIRED_SCOPES: &[&str] = &[DRIVE_FILE_SCOPE, USERINFO_EMAIL_SCOPE];

/// Tokens within this many seconds of expiry are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 300;

/// A UI step the user must complete before API calls can proceed
///
/// `resolution` is whatever the host needs to resume: a consent URL on
/// desktop, an opaque intent handle on mobile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub resolution: String,
}

impl PendingAuthorization {
    pub fn new(resolution: impl Into<String>) -> Self {
        Self {
            resolution: resolution.into(),
        }
    }
}

/// Result of asking a broker for credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Granted { access_token: String },
    ResolutionRequired(PendingAuthorization),
}

/// Error signalling that user authorization UI needs to be shown
#[derive(Debug, Clone, thiserror::Error)]
#[error("User authorization required")]
pub struct AuthorizationRequired(pub PendingAuthorization);

impl AuthorizationRequired {
    /// Find an authorization-required cause anywhere in an error chain
    pub fn find(err: &anyhow::Error) -> Option<&AuthorizationRequired> {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<AuthorizationRequired>())
    }

    pub fn pending(&self) -> &PendingAuthorization {
        &self.0
    }
}

/// Source of OAuth access tokens
pub trait AuthorizationBroker: Send + Sync {
    /// Obtain an access token for `scopes`, or the UI step needed to get one
    fn authorize(&self, scopes: &[&str]) -> Result<Authorization>;
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

/// Desktop broker backed by tokens in the settings store
pub struct StoredTokenBroker {
    credentials: GoogleCredentials,
    settings: SettingsStore,
}

impl StoredTokenBroker {
    /// Google OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    pub fn new(credentials: GoogleCredentials, settings: SettingsStore) -> Self {
        Self {
            credentials,
            settings,
        }
    }

    /// Consent page URL for the given redirect target
    pub fn consent_url(&self, redirect_uri: &str, scopes: &[&str]) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
        )
    }

    /// Run the loopback authorization code flow and store the tokens
    ///
    /// Opens the consent page in the browser and blocks until Google
    /// redirects back to the local listener.
    pub fn complete_authorization(&self, scopes: &[&str]) -> Result<()> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.consent_url(&redirect_uri, scopes);

        println!("\n=== Google Authorization Required ===");
        println!("Opening browser for authorization...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        println!("Waiting for authorization...");
        let code = self.wait_for_callback(listener)?;

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        self.save_token_response(&token)?;
        info!("Authorization complete");
        Ok(())
    }

    /// Forget stored tokens (logout)
    pub fn sign_out(&self) -> Result<()> {
        self.settings.clear_tokens()
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        let result = parse_callback_request(&request_line);

        let (status, body) = if result.is_ok() {
            ("200 OK", "Lumen is authorized. You can close this window.")
        } else {
            ("400 Bad Request", "Authorization failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        result
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        let expires_at = token
            .expires_in
            .map(|d| chrono::Utc::now().timestamp() + d as i64);
        self.settings
            .save_access_token(&token.access_token, expires_at)?;
        if let Some(refresh_token) = &token.refresh_token {
            self.settings.save_refresh_token(refresh_token)?;
        }
        Ok(())
    }
}

impl AuthorizationBroker for StoredTokenBroker {
    fn authorize(&self, scopes: &[&str]) -> Result<Authorization> {
        if let Some(token) = self.settings.access_token()?
            && token_is_fresh(token.expires_at, chrono::Utc::now().timestamp())
        {
            return Ok(Authorization::Granted {
                access_token: token.token,
            });
        }

        if let Some(refresh_token) = self.settings.refresh_token()? {
            match self.refresh_access_token(&refresh_token) {
                Ok(token) => {
                    self.save_token_response(&token)?;
                    debug!("Refreshed access token");
                    return Ok(Authorization::Granted {
                        access_token: token.access_token,
                    });
                }
                Err(e) => warn!("Token refresh failed: {:#}", e),
            }
        }

        let redirect_uri = format!("http://localhost:{}", Self::PORT_RANGE_START);
        Ok(Authorization::ResolutionRequired(PendingAuthorization::new(
            self.consent_url(&redirect_uri, scopes),
        )))
    }
}

/// Whether a token with the given expiry can still be used at `now`
///
/// Tokens without a known expiry are not trusted.
fn token_is_fresh(expires_at: Option<i64>, now: i64) -> bool {
    expires_at.is_some_and(|expires_at| expires_at > now + EXPIRY_MARGIN_SECS)
}

/// Extract the authorization code from the callback request line
///
/// Format: `GET /?code=AUTH_CODE&scope=... HTTP/1.1`
fn parse_callback_request(request_line: &str) -> Result<String> {
    let path = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;
    let url = url::Url::parse(&format!("http://localhost{}", path))
        .context("Malformed callback URL")?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => anyhow::bail!("OAuth error: {}", value),
            _ => {}
        }
    }

    code.context("No authorization code received")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKeyValueStore;
    use std::sync::Arc;

    fn broker() -> (StoredTokenBroker, SettingsStore) {
        let settings = SettingsStore::new(Arc::new(InMemoryKeyValueStore::new()));
        let creds = GoogleCredentials {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
        };
        (StoredTokenBroker::new(creds, settings.clone()), settings)
    }

    #[test]
    fn test_token_freshness() {
        let now = 1_000_000;
        assert!(token_is_fresh(Some(now + 3600), now));
        assert!(!token_is_fresh(Some(now + 60), now));
        assert!(!token_is_fresh(Some(now - 1), now));
        assert!(!token_is_fresh(None, now));
    }

    #[test]
    fn test_parse_callback_code() {
        let code =
            parse_callback_request("GET /?code=4%2F0Abc&scope=email HTTP/1.1\r\n").unwrap();
        assert_eq!(code, "4/0Abc");
    }

    #[test]
    fn test_parse_callback_error() {
        let err = parse_callback_request("GET /?error=access_denied HTTP/1.1").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_parse_callback_without_code() {
        assert!(parse_callback_request("GET /favicon.ico HTTP/1.1").is_err());
        assert!(parse_callback_request("").is_err());
    }

    #[test]
    fn test_consent_url_encodes_scopes() {
        let (broker, _) = broker();
        let url = broker.consent_url("http://localhost:8080", REQUIRED_SCOPES);
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080"));
        assert!(url.contains(&urlencoding::encode(DRIVE_FILE_SCOPE).into_owned()));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_fresh_stored_token_is_granted() {
        let (broker, settings) = broker();
        let expires_at = chrono::Utc::now().timestamp() + 3600;
        settings.save_access_token("live-token", Some(expires_at)).unwrap();

        let auth = broker.authorize(REQUIRED_SCOPES).unwrap();
        assert_eq!(
            auth,
            Authorization::Granted {
                access_token: "live-token".to_string()
            }
        );
    }

    #[test]
    fn test_no_tokens_requires_resolution() {
        let (broker, _) = broker();
        match broker.authorize(REQUIRED_SCOPES).unwrap() {
            Authorization::ResolutionRequired(pending) => {
                assert!(pending.resolution.contains("accounts.google.com"));
            }
            other => panic!("expected resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_sign_out_clears_tokens() {
        let (broker, settings) = broker();
        settings.save_access_token("t", Some(i64::MAX / 2)).unwrap();
        settings.save_refresh_token("r").unwrap();

        broker.sign_out().unwrap();
        assert!(settings.access_token().unwrap().is_none());
        assert!(settings.refresh_token().unwrap().is_none());
    }

    #[test]
    fn test_find_authorization_required_in_chain() {
        let err = anyhow::Error::new(AuthorizationRequired(PendingAuthorization::new("x")))
            .context("Failed to append row");
        let found = AuthorizationRequired::find(&err).unwrap();
        assert_eq!(found.pending().resolution, "x");

        let other = anyhow::anyhow!("network down");
        assert!(AuthorizationRequired::find(&other).is_none());
    }
}
