//! Installed-app OAuth credentials for the Google APIs
//!
//! The authorized user token is cached in a JSON file between runs. A cached token that
//! is still valid is used as is, an expired one is refreshed, and when neither works the
//! user is asked to authorize the app in a browser. The redirect lands on a loopback
//! listener that captures the authorization code. Each attempt carries a random `state`
//! and a PKCE challenge; callbacks with any other `state` are refused.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::core::config::GoogleConfig;

/// Scopes requested from the operator account
pub const SCOPES: [&str; 6] = [
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/forms.body",
    "https://www.googleapis.com/auth/forms.responses.readonly",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.send",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const AUTHORIZED_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\nAuthorization complete. You may close this window.";
const DENIED_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\nAuthorization was denied. Run the command again to retry.";
const REJECTED_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\nUnexpected authorization state.";
const NOT_FOUND_PAGE: &str = "HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n";

/// Length of the random `state` and of the PKCE verifier (RFC 7636 allows 43..=128)
const STATE_LEN: usize = 32;
const VERIFIER_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Client secrets file not found: {0}")]
    MissingClientSecrets(String),

    #[error("Invalid credentials file {0}: {1}")]
    InvalidFile(String, String),

    #[error("Credential I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch token: {0}")]
    FetchError(String),

    #[error("Failed to parse token response: {0}")]
    ParseError(String),

    #[error("Authorization was not granted: {0}")]
    AuthorizationDenied(String),

    #[error("Invalid authorization URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

/// OAuth client registered in the Cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Cached authorized user, in the same layout other Google client libraries write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    /// A token without expiry never expires
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        !self.token.is_empty() && self.expiry.map_or(true, |expiry| now + margin < expiry)
    }

    /// Whether the token was granted every scope the jobs need
    pub fn covers_scopes(&self) -> bool {
        SCOPES
            .iter()
            .all(|required| self.scopes.iter().any(|granted| granted == required))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    /// Space-separated scopes actually granted
    scope: Option<String>,
}

impl TokenResponse {
    fn granted_scopes(&self) -> Option<Vec<String>> {
        self.scope
            .as_deref()
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
    }
}

/// One interactive authorization attempt
struct AuthorizationRequest {
    url: String,
    state: String,
    verifier: String,
}

/// Outcome of a request hitting the loopback listener
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    /// Carries a code or error but not our `state`
    Rejected,
    /// Favicon requests and the like
    Ignored,
}

/// Loads, refreshes and, when needed, interactively obtains the operator token
pub struct CredentialManager {
    config: GoogleConfig,
    client: reqwest::Client,
    /// Refresh a token this long before it expires
    refresh_margin: Duration,
}

impl CredentialManager {
    pub fn new(config: GoogleConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            refresh_margin: Duration::seconds(60),
        }
    }

    /// Get a valid access token, refreshing or re-authorizing as necessary
    pub async fn access_token(&self) -> Result<String, CredentialError> {
        let user = match self.load_authorized_user().await? {
            Some(user) if !user.covers_scopes() => {
                tracing::warn!(
                    "Cached Google token in {} lacks required scopes, re-authorizing",
                    self.config.token_path
                );
                self.authorize().await?
            }
            Some(user) if user.is_valid_at(Utc::now(), self.refresh_margin) => {
                tracing::debug!("Using cached Google token from {}", self.config.token_path);
                return Ok(user.token);
            }
            Some(user) if user.refresh_token.is_some() => match self.refresh(&user).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    tracing::warn!("Token refresh failed, re-authorizing: {}", e);
                    self.authorize().await?
                }
            },
            _ => self.authorize().await?,
        };

        self.save_authorized_user(&user).await?;
        Ok(user.token)
    }

    async fn load_authorized_user(&self) -> Result<Option<AuthorizedUser>, CredentialError> {
        let path = &self.config.token_path;
        if !Path::new(path).exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(path).await?;
        match serde_json::from_str::<AuthorizedUser>(&content) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token file {}: {}", path, e);
                Ok(None)
            }
        }
    }

    async fn save_authorized_user(&self, user: &AuthorizedUser) -> Result<(), CredentialError> {
        let content = serde_json::to_string_pretty(user).map_err(|e| {
            CredentialError::InvalidFile(self.config.token_path.clone(), e.to_string())
        })?;
        tokio::fs::write(&self.config.token_path, content).await?;
        Ok(())
    }

    async fn load_client_secrets(&self) -> Result<ClientSecrets, CredentialError> {
        let path = &self.config.client_secrets_path;
        if !Path::new(path).exists() {
            return Err(CredentialError::MissingClientSecrets(path.clone()));
        }

        let content = tokio::fs::read_to_string(path).await?;
        parse_client_secrets(&content)
            .map_err(|e| CredentialError::InvalidFile(path.clone(), e))
    }

    async fn refresh(&self, user: &AuthorizedUser) -> Result<AuthorizedUser, CredentialError> {
        let refresh_token = user
            .refresh_token
            .as_deref()
            .ok_or_else(|| CredentialError::FetchError("No refresh token".to_string()))?;

        tracing::debug!("Refreshing Google token via {}", user.token_uri);

        let token = self
            .request_token(
                &user.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", user.client_id.as_str()),
                    ("client_secret", user.client_secret.as_str()),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;

        tracing::info!("Refreshed Google token");

        let scopes = token.granted_scopes().unwrap_or_else(|| user.scopes.clone());

        Ok(AuthorizedUser {
            token: token.access_token,
            refresh_token: token.refresh_token.or_else(|| user.refresh_token.clone()),
            scopes,
            expiry: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            ..user.clone()
        })
    }

    async fn authorize(&self) -> Result<AuthorizedUser, CredentialError> {
        let secrets = self.load_client_secrets().await?;
        let redirect_uri = format!("http://localhost:{}/", self.config.redirect_port);
        let request = authorization_request(&secrets, &redirect_uri)?;

        // Loopback only: the redirect never leaves this machine
        let listener = TcpListener::bind(("127.0.0.1", self.config.redirect_port)).await?;

        tracing::warn!(
            "Authorization required. Visit this URL to continue: {}",
            request.url
        );

        let code = wait_for_code(listener, &request.state).await?;

        let token = self
            .request_token(
                &secrets.token_uri,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("client_id", secrets.client_id.as_str()),
                    ("client_secret", secrets.client_secret.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("code_verifier", request.verifier.as_str()),
                ],
            )
            .await?;

        tracing::info!("Authorization complete, token stored in {}", self.config.token_path);

        let scopes = token
            .granted_scopes()
            .unwrap_or_else(|| SCOPES.iter().map(|s| s.to_string()).collect());

        Ok(AuthorizedUser {
            token: token.access_token,
            refresh_token: token.refresh_token,
            token_uri: secrets.token_uri,
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            scopes,
            expiry: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }

    async fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, CredentialError> {
        let response = self
            .client
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| CredentialError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::FetchError(format!(
                "Token request failed: HTTP {} - {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialError::ParseError(e.to_string()))
    }
}

fn parse_client_secrets(content: &str) -> Result<ClientSecrets, String> {
    let file: ClientSecretsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
    file.installed
        .or(file.web)
        .ok_or_else(|| "expected an \"installed\" or \"web\" client".to_string())
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// S256 code challenge for a PKCE verifier
fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn authorization_request(
    secrets: &ClientSecrets,
    redirect_uri: &str,
) -> Result<AuthorizationRequest, CredentialError> {
    let state = random_token(STATE_LEN);
    let verifier = random_token(VERIFIER_LEN);

    let mut url = url::Url::parse(&secrets.auth_uri)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", &state)
        .append_pair("code_challenge", &pkce_challenge(&verifier))
        .append_pair("code_challenge_method", "S256")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");

    Ok(AuthorizationRequest {
        url: url.to_string(),
        state,
        verifier,
    })
}

/// Query parameters of an HTTP request line such as `GET /?code=x HTTP/1.1`
fn query_params(request_line: &str) -> Vec<(String, String)> {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Vec::new();
    };

    url::Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

fn parse_callback(request_line: &str, expected_state: &str) -> Callback {
    let params = query_params(request_line);
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    let state_matches = param("state").as_deref() == Some(expected_state);

    match (param("code"), param("error")) {
        (Some(code), _) if state_matches => Callback::Code(code),
        (None, Some(error)) if state_matches => Callback::Denied(error),
        (None, None) => Callback::Ignored,
        _ => Callback::Rejected,
    }
}

/// Accept browser redirects until one carries our `state` with a code or an error
async fn wait_for_code(
    listener: TcpListener,
    expected_state: &str,
) -> Result<String, CredentialError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let mut buf = vec![0u8; 8192];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);
        let request_line = request.lines().next().unwrap_or_default();

        match parse_callback(request_line, expected_state) {
            Callback::Code(code) => {
                stream.write_all(AUTHORIZED_PAGE.as_bytes()).await?;
                stream.shutdown().await?;
                return Ok(code);
            }
            Callback::Denied(error) => {
                stream.write_all(DENIED_PAGE.as_bytes()).await?;
                stream.shutdown().await?;
                return Err(CredentialError::AuthorizationDenied(error));
            }
            Callback::Rejected => {
                tracing::warn!(
                    "Refusing authorization callback from {} with unexpected state",
                    peer
                );
                stream.write_all(REJECTED_PAGE.as_bytes()).await?;
            }
            Callback::Ignored => {
                tracing::debug!("Ignoring request from {}: {}", peer, request_line);
                stream.write_all(NOT_FOUND_PAGE.as_bytes()).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpStream;

    const STATE: &str = "expected-state";

    fn user(expiry: Option<DateTime<Utc>>) -> AuthorizedUser {
        AuthorizedUser {
            token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry,
        }
    }

    fn secrets() -> ClientSecrets {
        parse_client_secrets(r#"{"installed": {"client_id": "abc", "client_secret": "x"}}"#)
            .unwrap()
    }

    /// Send one request line to the listener and return the raw response
    async fn send_request(addr: SocketAddr, request_line: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("{}\r\nHost: localhost\r\n\r\n", request_line).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_query_params_are_decoded() {
        let params = query_params("GET /?state=s&code=4%2F0Adeu5B&scope=a+b HTTP/1.1");
        assert!(params.contains(&("code".to_string(), "4/0Adeu5B".to_string())));
        assert!(params.contains(&("scope".to_string(), "a b".to_string())));

        assert!(query_params("GET /favicon.ico HTTP/1.1").is_empty());
        assert!(query_params("").is_empty());
    }

    #[test]
    fn test_callback_requires_matching_state() {
        assert_eq!(
            parse_callback("GET /?code=c1&state=expected-state HTTP/1.1", STATE),
            Callback::Code("c1".to_string())
        );
        assert_eq!(
            parse_callback("GET /?code=c1 HTTP/1.1", STATE),
            Callback::Rejected
        );
        assert_eq!(
            parse_callback("GET /?code=c1&state=other HTTP/1.1", STATE),
            Callback::Rejected
        );
        assert_eq!(
            parse_callback("GET /?error=access_denied HTTP/1.1", STATE),
            Callback::Rejected
        );
        assert_eq!(
            parse_callback("GET /?error=access_denied&state=expected-state HTTP/1.1", STATE),
            Callback::Denied("access_denied".to_string())
        );
        assert_eq!(
            parse_callback("GET /favicon.ico HTTP/1.1", STATE),
            Callback::Ignored
        );
    }

    #[tokio::test]
    async fn test_loopback_refuses_codes_without_our_state() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter = tokio::spawn(async move { wait_for_code(listener, STATE).await });

        let missing = send_request(addr, "GET /?code=forged HTTP/1.1").await;
        assert!(missing.starts_with("HTTP/1.1 400"));

        let wrong = send_request(addr, "GET /?code=forged&state=guess HTTP/1.1").await;
        assert!(wrong.starts_with("HTTP/1.1 400"));

        assert!(!waiter.is_finished());

        let accepted = send_request(addr, "GET /?code=real&state=expected-state HTTP/1.1").await;
        assert!(accepted.contains("Authorization complete"));
        assert_eq!(waiter.await.unwrap().unwrap(), "real");
    }

    #[tokio::test]
    async fn test_denied_authorization_shows_denial_page() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter = tokio::spawn(async move { wait_for_code(listener, STATE).await });

        let response =
            send_request(addr, "GET /?error=access_denied&state=expected-state HTTP/1.1").await;

        assert!(response.contains("Authorization was denied"));
        assert!(!response.contains("Authorization complete"));
        assert!(matches!(
            waiter.await.unwrap(),
            Err(CredentialError::AuthorizationDenied(error)) if error == "access_denied"
        ));
    }

    #[test]
    fn test_token_validity() {
        let now = Utc::now();
        let margin = Duration::seconds(60);

        assert!(user(Some(now + Duration::hours(1))).is_valid_at(now, margin));
        assert!(!user(Some(now + Duration::seconds(30))).is_valid_at(now, margin));
        assert!(!user(Some(now - Duration::hours(1))).is_valid_at(now, margin));
        assert!(user(None).is_valid_at(now, margin));
    }

    #[test]
    fn test_token_missing_a_scope_does_not_cover() {
        assert!(user(None).covers_scopes());

        let mut readonly = user(None);
        readonly
            .scopes
            .retain(|s| s != "https://www.googleapis.com/auth/drive");
        assert!(!readonly.covers_scopes());

        let mut unknown = user(None);
        unknown.scopes.clear();
        assert!(!unknown.covers_scopes());
    }

    #[test]
    fn test_granted_scopes_from_token_response() {
        let json = r#"{"access_token": "a", "expires_in": 3599, "scope": "s1 s2"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            token.granted_scopes(),
            Some(vec!["s1".to_string(), "s2".to_string()])
        );

        let token: TokenResponse = serde_json::from_str(r#"{"access_token": "a"}"#).unwrap();
        assert_eq!(token.granted_scopes(), None);
    }

    #[test]
    fn test_parse_authorized_user_file() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://www.googleapis.com/auth/drive"],
            "expiry": "2024-05-01T10:00:00.123456Z"
        }"#;
        let user: AuthorizedUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.refresh_token.as_deref(), Some("1//0g"));
        assert!(user.expiry.is_some());
        assert!(!user.is_valid_at(Utc::now(), Duration::zero()));
        assert!(!user.covers_scopes());
    }

    #[test]
    fn test_parse_client_secrets_installed_and_web() {
        let installed = r#"{"installed": {"client_id": "a", "client_secret": "b"}}"#;
        let secrets = parse_client_secrets(installed).unwrap();
        assert_eq!(secrets.client_id, "a");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);

        let web = r#"{"web": {"client_id": "c", "client_secret": "d", "token_uri": "https://t"}}"#;
        assert_eq!(parse_client_secrets(web).unwrap().token_uri, "https://t");

        assert!(parse_client_secrets("{}").is_err());
    }

    #[test]
    fn test_authorization_url_carries_state_and_pkce() {
        let request = authorization_request(&secrets(), "http://localhost:8081/").unwrap();
        let url = url::Url::parse(&request.url).unwrap();
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        assert!(request.url.starts_with(DEFAULT_AUTH_URI));
        assert_eq!(param("client_id").as_deref(), Some("abc"));
        assert_eq!(param("redirect_uri").as_deref(), Some("http://localhost:8081/"));
        assert_eq!(param("access_type").as_deref(), Some("offline"));
        assert!(param("scope").unwrap().contains("forms.body"));

        assert_eq!(param("state").as_deref(), Some(request.state.as_str()));
        assert_eq!(request.state.len(), STATE_LEN);
        assert_eq!(param("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(param("code_challenge"), Some(pkce_challenge(&request.verifier)));
    }

    #[test]
    fn test_each_attempt_uses_fresh_state() {
        let first = authorization_request(&secrets(), "http://localhost:8081/").unwrap();
        let second = authorization_request(&secrets(), "http://localhost:8081/").unwrap();
        assert_ne!(first.state, second.state);
        assert_ne!(first.verifier, second.verifier);
    }

    #[test]
    fn test_pkce_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-1B0ZdPxnNM5bU8i2A4nRMRQWkq7Jb4"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }
}
