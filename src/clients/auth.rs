use std::future::Future;
use std::io;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use reqwest::Url;
use rspotify::{Credentials, OAuth};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::clients::{
    errors::{Error, Result, api_error_message},
    http::{RequestBody, Transport},
};

/// Spotify accounts service, hosts the authorize page and the token endpoint
pub const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

// One retry after a failed exchange, then give up
const MAX_EXCHANGE_RETRIES: usize = 1;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"code=([^&#\s]+)").expect("valid code pattern"));
static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"state=([^&#\s]+)").expect("valid state pattern"));

/// Supplies the value the user lands on after approving access, usually the
/// full redirect URL with `code=` in its query.
pub trait RedirectSource {
    /// Shows `authorize_url` to the user and returns what they land on
    fn obtain_redirect_value(&self, authorize_url: &str) -> impl Future<Output = Result<String>>;
}

/// Opens the authorize URL in a browser, prints it as well and waits for
/// the redirect URL to be pasted
#[derive(Debug, Default)]
pub struct StdinRedirect;

/// Tries `open` on the URL and builds the prompt. The URL is always part of
/// the prompt, so a machine without a browser can still finish the flow.
fn browser_prompt(authorize_url: &str, open: impl FnOnce(&str) -> io::Result<()>) -> String {
    if let Err(e) = open(authorize_url) {
        warn!("Could not open a browser, open the URL manually: {e}");
    }
    format!("Please authorize: {authorize_url}\n\nPaste redirect URI here: ")
}

impl RedirectSource for StdinRedirect {
    async fn obtain_redirect_value(&self, authorize_url: &str) -> Result<String> {
        let prompt = browser_prompt(authorize_url, webbrowser::open);
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line.trim().to_string())
    }
}

/// Access token plus the refresh token that can renew it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Bearer token for Web API calls
    pub access_token: String,
    /// Absent when the accounts service did not hand one out
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Pulls the authorization code out of a pasted redirect value.
///
/// When the value carries a `state` parameter it has to match the one sent
/// with the authorize request.
pub fn extract_code(redirect_value: &str, expected_state: &str) -> Result<String> {
    if let Some(state) = STATE_RE.captures(redirect_value).and_then(|c| c.get(1))
        && state.as_str() != expected_state
    {
        return Err(Error::AuthError(
            "state in redirect does not match the authorize request".into(),
        ));
    }

    CODE_RE
        .captures(redirect_value)
        .and_then(|c| c.get(1))
        .map(|code| code.as_str().to_string())
        .ok_or_else(|| Error::AuthError("no authorization code found in redirect value".into()))
}

// Shown after a browser login so the next run can go unattended
fn refresh_token_hint(tokens: &TokenPair) -> Option<String> {
    tokens
        .refresh_token
        .as_ref()
        .map(|t| format!("Set RSPOTIFY_REFRESH_TOKEN={t} to skip the browser next time"))
}

/// Authorization code flow against the accounts service.
///
/// Borrows the transport so the same connection pool serves the API calls
/// made with the resulting token.
pub struct Authorizer<'a, T, R> {
    transport: &'a T,
    credentials: &'a Credentials,
    oauth: &'a OAuth,
    redirect: R,
    refresh_token: Option<String>,
    accounts_base: String,
}

impl<'a, T: Transport, R: RedirectSource> Authorizer<'a, T, R> {
    /// Flow against the public accounts service, without a stored refresh token
    pub fn new(transport: &'a T, credentials: &'a Credentials, oauth: &'a OAuth, redirect: R) -> Self {
        Authorizer {
            transport,
            credentials,
            oauth,
            redirect,
            refresh_token: None,
            accounts_base: ACCOUNTS_BASE.to_string(),
        }
    }

    /// Refresh token from a previous run, lets the flow skip the prompt
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Overrides the accounts service host
    #[must_use]
    pub fn with_accounts_base(mut self, base: impl Into<String>) -> Self {
        self.accounts_base = base.into();
        self
    }

    /// URL of the consent page for the configured client, scopes and state
    pub fn authorize_url(&self) -> Result<String> {
        let mut scopes: Vec<&str> = self.oauth.scopes.iter().map(String::as_str).collect();
        scopes.sort_unstable();
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("response_type", "code"),
                ("client_id", self.credentials.id.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("scope", scopes.join(" ").as_str()),
                ("state", self.oauth.state.as_str()),
            ],
        )
        .map_err(|e| Error::ConfigurationError(format!("invalid accounts URL: {e}")))?;
        Ok(url.into())
    }

    /// Interactive half of the flow: show the URL, read back the code
    pub async fn authorize(&self) -> Result<String> {
        let url = self.authorize_url()?;
        let value = self.redirect.obtain_redirect_value(&url).await?;
        extract_code(&value, &self.oauth.state)
    }

    /// Trades an authorization code for a token pair
    pub async fn exchange(&self, code: &str) -> Result<TokenPair> {
        let form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.oauth.redirect_uri.clone()),
        ];
        let token = self.request_token(form).await?;
        Ok(TokenPair {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        })
    }

    /// Returns a fresh access token. The accounts service may rotate the
    /// refresh token; when it doesn't, the old one stays valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];
        let token = self.request_token(form).await?;
        Ok(TokenPair {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
        })
    }

    /// Full flow. A known refresh token is tried first, once, so repeated
    /// runs do not need the browser. Otherwise the code is exchanged, with a
    /// single retry.
    pub async fn obtain_tokens(&self) -> Result<TokenPair> {
        if let Some(refresh_token) = &self.refresh_token {
            match self.refresh(refresh_token).await {
                Ok(tokens) => {
                    info!("Authorized with stored refresh token");
                    return Ok(tokens);
                }
                Err(e) => warn!("Stored refresh token rejected, falling back to browser flow: {e}"),
            }
        }

        let code = self.authorize().await?;
        let mut attempt = 0;
        loop {
            match self.exchange(&code).await {
                Ok(tokens) => {
                    info!("Authorized with authorization code");
                    if let Some(hint) = refresh_token_hint(&tokens) {
                        debug!("{hint}");
                    }
                    return Ok(tokens);
                }
                Err(e) if attempt < MAX_EXCHANGE_RETRIES => {
                    attempt += 1;
                    warn!("Token exchange failed: {e}. Retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_token(&self, form: Vec<(String, String)>) -> Result<TokenResponse> {
        let headers = self.credentials.auth_headers().ok_or_else(|| {
            Error::ConfigurationError("client secret is required for the authorization code flow".into())
        })?;
        let url = format!("{}/api/token", self.accounts_base);
        let response = self
            .transport
            .post(&url, &headers, &RequestBody::Form(form))
            .await?;

        if !response.is_success() {
            return Err(Error::AuthError(format!(
                "token endpoint returned status {}: {}",
                response.status,
                api_error_message(&response.body)
            )));
        }

        let token: TokenResponse = serde_json::from_value(response.body)?;
        debug!("Received access token, expires in {:?}s", token.expires_in);
        Ok(token)
    }
}
