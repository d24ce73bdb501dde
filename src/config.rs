use std::collections::HashSet;

use rspotify::{Credentials, OAuth, scopes};

use crate::clients::{
    entities::PlaylistSettings,
    errors::{Error, Result},
    spotify::{MAX_INSERT_BATCH, MAX_PAGE_SIZE},
};

/// Destination playlist name when none is given
pub const DEFAULT_PLAYLIST_NAME: &str = "Liked Songs but public";
/// Description set on a newly created playlist
pub const DEFAULT_PLAYLIST_DESCRIPTION: &str =
    "Yes, this took me more time to automate than it would if I had done it manually";

// Optional, lets unattended runs skip the browser step
const REFRESH_TOKEN_VAR: &str = "RSPOTIFY_REFRESH_TOKEN";

/// Configuration for the Syncer struct
#[derive(Debug, Clone)]
pub struct Config {
    /// App client id and secret
    pub credentials: Credentials,
    /// Redirect URI and scopes
    pub oauth: OAuth,
    /// Stored refresh token, tried before asking for a code
    pub refresh_token: Option<String>,
    /// Destination playlist
    pub playlist: PlaylistSettings,
    /// Listing page size, 1..=50
    pub page_size: u32,
    /// URIs per add-tracks request, 1..=100
    pub batch_size: usize,
    /// Compute the diff without writing anything
    pub dry_run: bool,
}

/// Scopes the sync needs: read the library and playlists, write the
/// destination with the visibility it will have.
pub fn required_scopes(public: bool) -> HashSet<String> {
    let mut scopes = scopes!("user-library-read", "playlist-read-private");
    scopes.insert(if public {
        "playlist-modify-public".to_string()
    } else {
        "playlist-modify-private".to_string()
    });
    scopes
}

/// Builds a [`Config`] from flags with environment fallbacks
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    credentials: Option<Credentials>,
    redirect_uri: Option<String>,
    refresh_token: Option<String>,
    name: Option<String>,
    description: Option<String>,
    public: Option<bool>,
    page_size: Option<u32>,
    batch_size: Option<usize>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Nothing set, everything falls back to the environment or defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips `RSPOTIFY_CLIENT_ID` and `RSPOTIFY_CLIENT_SECRET`
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Skips `RSPOTIFY_REDIRECT_URI`
    #[must_use]
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Skips `RSPOTIFY_REFRESH_TOKEN`
    #[must_use]
    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Destination playlist name
    #[must_use]
    pub fn playlist_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Description used when the playlist is created
    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Visibility, also decides which modify scope is requested
    #[must_use]
    pub fn public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    /// Listing page size
    #[must_use]
    pub fn page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// URIs per add-tracks request
    #[must_use]
    pub fn batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Report without writing
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fills whatever was not set explicitly from the environment
    /// (`RSPOTIFY_CLIENT_ID`, `RSPOTIFY_CLIENT_SECRET`, `RSPOTIFY_REDIRECT_URI`,
    /// `RSPOTIFY_REFRESH_TOKEN`) and validates the limits.
    pub fn build(self) -> Result<Config> {
        let public = self.public.unwrap_or(true);
        let scopes = required_scopes(public);

        let credentials = match self.credentials {
            Some(c) => c,
            None => Credentials::from_env()
                .ok_or_else(|| Error::ConfigurationError("Missing Spotify credentials in environment variables. Check README.md for details.".into()))?,
        };
        if credentials.secret.is_none() {
            return Err(Error::ConfigurationError(
                "RSPOTIFY_CLIENT_SECRET is required for the authorization code flow".into(),
            ));
        }

        let oauth = match self.redirect_uri {
            Some(redirect_uri) => OAuth {
                redirect_uri,
                scopes,
                ..Default::default()
            },
            None => OAuth::from_env(scopes)
                .ok_or_else(|| Error::ConfigurationError("Missing Spotify OAuth configuration in environment variables. Check README.md for details.".into()))?,
        };

        let refresh_token = self
            .refresh_token
            .or_else(|| std::env::var(REFRESH_TOKEN_VAR).ok())
            .filter(|t| !t.trim().is_empty());

        let page_size = self.page_size.unwrap_or(MAX_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(Error::ConfigurationError(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        let batch_size = self.batch_size.unwrap_or(MAX_INSERT_BATCH);
        if !(1..=MAX_INSERT_BATCH).contains(&batch_size) {
            return Err(Error::ConfigurationError(format!(
                "batch size must be between 1 and {MAX_INSERT_BATCH}, got {batch_size}"
            )));
        }

        Ok(Config {
            credentials,
            oauth,
            refresh_token,
            playlist: PlaylistSettings {
                name: self.name.unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string()),
                description: self
                    .description
                    .unwrap_or_else(|| DEFAULT_PLAYLIST_DESCRIPTION.to_string()),
                public,
            },
            page_size,
            batch_size,
            dry_run: self.dry_run,
        })
    }
}
