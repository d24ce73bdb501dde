use std::fmt;

use log::{debug, info};

use crate::clients::{
    auth::{Authorizer, RedirectSource},
    entities::{Playlist, TrackSet},
    errors::Result,
    http::Transport,
    spotify::SpotifyClient,
};
use crate::config::Config;
use crate::reconcile::{ReconcileReport, Reconciler, missing_uris};

/// Summary of one run
#[derive(Debug)]
pub struct SyncReport {
    /// `None` only on a dry run that would have created the playlist
    pub playlist: Option<Playlist>,
    /// The playlist was created by this run
    pub playlist_created: bool,
    /// Distinct liked tracks
    pub liked: usize,
    /// Liked tracks the playlist already held
    pub already_present: usize,
    /// Nothing was written
    pub dry_run: bool,
    /// Insertion outcome, only `missing` is filled on a dry run
    pub reconcile: ReconcileReport,
}

impl SyncReport {
    /// No chunk failed
    pub fn is_success(&self) -> bool {
        self.reconcile.is_success()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Sync Summary ===")?;
        match (&self.playlist, self.playlist_created) {
            (Some(p), true) => writeln!(f, "Playlist:  {} ({}, created)", p.name, p.id)?,
            (Some(p), false) => writeln!(f, "Playlist:  {} ({})", p.name, p.id)?,
            (None, _) => writeln!(f, "Playlist:  would be created")?,
        }
        writeln!(f, "Liked:     {}", self.liked)?;
        writeln!(f, "Present:   {}", self.already_present)?;
        writeln!(f, "Missing:   {}", self.reconcile.missing)?;
        if self.dry_run {
            return writeln!(f, "Status: dry run, nothing changed");
        }
        writeln!(f, "Added:     {}", self.reconcile.added)?;

        if !self.reconcile.failures.is_empty() {
            writeln!(f, "\nErrors ({}):", self.reconcile.failures.len())?;
            for error in &self.reconcile.failures {
                writeln!(f, "  - {error}")?;
            }
        }

        if self.is_success() {
            writeln!(f, "Status: ✓ Success")
        } else {
            writeln!(f, "Status: ✗ Completed with errors, re-run to retry")
        }
    }
}

/// The main Syncer struct that performs the synchronization
pub struct Syncer<'a, T> {
    config: Config,
    transport: &'a T,
    api_base: Option<String>,
    accounts_base: Option<String>,
}

impl<'a, T: Transport> Syncer<'a, T> {
    /// Run against the public Spotify hosts
    pub fn new(config: Config, transport: &'a T) -> Self {
        Syncer {
            config,
            transport,
            api_base: None,
            accounts_base: None,
        }
    }

    /// Points the run at other hosts than the public Spotify ones
    #[must_use]
    pub fn with_hosts(mut self, api_base: impl Into<String>, accounts_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self.accounts_base = Some(accounts_base.into());
        self
    }

    /// Authorize, resolve the destination, fetch both collections, reconcile.
    ///
    /// Authorization, fetch and playlist-creation failures abort the run.
    /// Failed chunks end up in the report instead.
    pub async fn sync<R: RedirectSource>(&self, redirect: R) -> Result<SyncReport> {
        info!("Starting sync process ...");
        let mut authorizer = Authorizer::new(
            self.transport,
            &self.config.credentials,
            &self.config.oauth,
            redirect,
        )
        .with_refresh_token(self.config.refresh_token.clone());
        if let Some(base) = &self.accounts_base {
            authorizer = authorizer.with_accounts_base(base.clone());
        }
        let tokens = authorizer.obtain_tokens().await?;

        let mut client = SpotifyClient::new(self.transport, &tokens.access_token)
            .with_page_size(self.config.page_size);
        if let Some(base) = &self.api_base {
            client = client.with_api_base(base.clone());
        }

        let user_id = client.current_user_id().await?;
        let settings = &self.config.playlist;

        let (playlist, playlist_created) = if self.config.dry_run {
            match client.find_playlist(&user_id, &settings.name).await? {
                Some(p) => (Some(p), false),
                None => {
                    info!("Dry run: playlist {} would be created", settings.name);
                    (None, false)
                }
            }
        } else {
            let resolved = client.resolve_playlist(&user_id, settings).await?;
            (Some(resolved.playlist), resolved.created)
        };

        debug!("Fetching liked tracks from Spotify ...");
        let liked = client.get_liked_tracks().await?;
        let source: TrackSet = liked.iter().collect();
        debug!("Fetched {} liked tracks ({} unique)", liked.len(), source.len());

        let destination: TrackSet = match &playlist {
            Some(p) => client.get_playlist_tracks(&p.id).await?.iter().collect(),
            None => TrackSet::new(),
        };

        let reconcile = match (&playlist, self.config.dry_run) {
            (Some(p), false) => {
                Reconciler::new(&client, self.config.batch_size)
                    .reconcile(&p.id, &source, &destination)
                    .await
            }
            _ => {
                let missing = missing_uris(&source, &destination);
                debug!("Dry run: would add {missing:?}");
                ReconcileReport {
                    missing: missing.len(),
                    ..Default::default()
                }
            }
        };

        let report = SyncReport {
            already_present: source.len() - reconcile.missing,
            liked: source.len(),
            playlist,
            playlist_created,
            dry_run: self.config.dry_run,
            reconcile,
        };
        info!(
            "Sync process completed. Added {} of {} missing tracks",
            report.reconcile.added, report.reconcile.missing
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::Error;
    use crate::clients::http::mock::MockTransport;
    use crate::config::ConfigBuilder;
    use rspotify::Credentials;
    use serde_json::json;

    struct Pasted;

    impl RedirectSource for Pasted {
        async fn obtain_redirect_value(&self, _authorize_url: &str) -> Result<String> {
            Ok("http://localhost:8888/callback?code=C0DE".to_string())
        }
    }

    fn config(dry_run: bool) -> Config {
        ConfigBuilder::new()
            .credentials(Credentials::new("id", "secret"))
            .redirect_uri("http://localhost:8888/callback")
            .refresh_token("stored")
            .playlist_name(Some("Mirror".into()))
            .dry_run(dry_run)
            .build()
            .unwrap()
    }

    fn liked_page() -> serde_json::Value {
        json!({"items": [
            {"track": {"uri": "spotify:track:a", "name": "A"}},
            {"track": {"uri": "spotify:track:b", "name": "B"}},
            {"track": {"uri": "spotify:track:c", "name": "C"}}
        ]})
    }

    #[tokio::test]
    async fn end_to_end_creates_playlist_and_adds_missing() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"access_token": "acc"}))
            .respond(200, json!({"id": "user-1"}))
            .respond(200, json!({"items": []}))
            .respond(201, json!({"id": "pl-1", "name": "Mirror"}))
            .respond(200, liked_page())
            .respond(200, json!({"items": [{"track": {"uri": "spotify:track:b", "name": "B"}}]}))
            .respond(201, json!({"snapshot_id": "s"}));

        let report = Syncer::new(config(false), &transport)
            .sync(Pasted)
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(report.playlist_created);
        assert_eq!(report.liked, 3);
        assert_eq!(report.already_present, 1);
        assert_eq!(report.reconcile.added, 2);

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://accounts.spotify.com/api/token",
                "https://api.spotify.com/v1/me",
                "https://api.spotify.com/v1/users/user-1/playlists",
                "https://api.spotify.com/v1/users/user-1/playlists",
                "https://api.spotify.com/v1/me/tracks",
                "https://api.spotify.com/v1/playlists/pl-1/tracks",
                "https://api.spotify.com/v1/playlists/pl-1/tracks",
            ]
        );
    }

    #[tokio::test]
    async fn up_to_date_playlist_gets_no_mutation() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"access_token": "acc"}))
            .respond(200, json!({"id": "user-1"}))
            .respond(200, json!({"items": [{"id": "pl-1", "name": "Mirror"}]}))
            .respond(200, liked_page())
            .respond(200, liked_page());

        let report = Syncer::new(config(false), &transport)
            .sync(Pasted)
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(!report.playlist_created);
        assert_eq!(report.reconcile.missing, 0);
        // only the token refresh is a POST
        assert_eq!(transport.posts().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_never_mutates() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"access_token": "acc"}))
            .respond(200, json!({"id": "user-1"}))
            .respond(200, json!({"items": []}))
            .respond(200, liked_page());

        let report = Syncer::new(config(true), &transport)
            .sync(Pasted)
            .await
            .unwrap();

        assert!(report.playlist.is_none());
        assert_eq!(report.reconcile.missing, 3);
        assert_eq!(report.reconcile.chunks_attempted, 0);
        assert_eq!(transport.posts().len(), 1);
        assert!(report.to_string().contains("would be created"));
    }

    #[tokio::test]
    async fn overridden_hosts_receive_every_request() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"access_token": "acc"}))
            .respond(200, json!({"id": "user-1"}))
            .respond(200, json!({"items": [{"id": "pl-1", "name": "Mirror"}]}))
            .respond(200, liked_page())
            .respond(200, json!({"items": []}))
            .respond(201, json!({"snapshot_id": "s"}));

        let report = Syncer::new(config(false), &transport)
            .with_hosts("https://api.test/v1", "https://accounts.test")
            .sync(Pasted)
            .await
            .unwrap();
        assert_eq!(report.reconcile.added, 3);

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls[0], "https://accounts.test/api/token");
        assert_eq!(urls.len(), 6);
        assert!(urls[1..].iter().all(|u| u.starts_with("https://api.test/v1/")));
        assert!(!urls.iter().any(|u| u.contains("spotify.com")));
    }

    #[tokio::test]
    async fn failed_fetch_aborts_run() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"access_token": "acc"}))
            .respond(401, json!({"error": {"status": 401, "message": "The access token expired"}}));

        let err = Syncer::new(config(false), &transport)
            .sync(Pasted)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchError { status: 401, .. }));
    }

    #[tokio::test]
    async fn failed_chunk_is_reported_not_fatal() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"access_token": "acc"}))
            .respond(200, json!({"id": "user-1"}))
            .respond(200, json!({"items": [{"id": "pl-1", "name": "Mirror"}]}))
            .respond(200, liked_page())
            .respond(200, json!({"items": []}))
            .respond(502, serde_json::Value::Null);

        let report = Syncer::new(config(false), &transport)
            .sync(Pasted)
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.reconcile.failures.len(), 1);
        let summary = report.to_string();
        assert!(summary.contains("spotify:track:a"));
        assert!(summary.contains("Completed with errors"));
    }
}
