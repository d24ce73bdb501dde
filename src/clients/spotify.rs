use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::clients::{
    entities::{Playlist, PlaylistObject, PlaylistSettings, Track, TrackItem, UserObject},
    errors::{Error, Result, api_error_message},
    http::{Headers, RequestBody, Transport},
    pagination::fetch_all,
};

/// Web API root
pub const API_BASE: &str = "https://api.spotify.com/v1";

/// Largest page the listing endpoints serve
pub const MAX_PAGE_SIZE: u32 = 50;

/// Largest number of URIs one add-tracks request may carry
pub const MAX_INSERT_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Outcome of resolving the destination playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlaylist {
    /// Destination playlist
    pub playlist: Playlist,
    /// `true` when this run had to create it
    pub created: bool,
}

/// Web API calls the sync needs, authenticated with one access token
pub struct SpotifyClient<'a, T> {
    transport: &'a T,
    headers: Headers,
    api_base: String,
    page_size: u32,
}

impl<'a, T: Transport> SpotifyClient<'a, T> {
    /// Client talking to the public Web API with pages of 50
    pub fn new(transport: &'a T, access_token: &str) -> Self {
        let mut headers = Headers::new();
        headers.insert("authorization".to_string(), format!("Bearer {access_token}"));
        SpotifyClient {
            transport,
            headers,
            api_base: API_BASE.to_string(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Overrides the Web API root
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Page size for listings, clamped to 1..=50
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Id of the user owning the token
    pub async fn current_user_id(&self) -> Result<String> {
        let url = format!("{}/me", self.api_base);
        let response = self.transport.get(&url, &self.headers, &[]).await?;
        if !response.is_success() {
            return Err(Error::FetchError {
                endpoint: url,
                status: response.status,
            });
        }
        let user: UserObject = serde_json::from_value(response.body)?;
        debug!("Authenticated as user: {:?}", user.display_name);
        Ok(user.id)
    }

    /// Every playlist of `user_id`, in listing order
    pub async fn get_user_playlists(&self, user_id: &str) -> Result<Vec<Playlist>> {
        let url = format!("{}/users/{user_id}/playlists", self.api_base);
        fetch_all(
            self.transport,
            &self.headers,
            &url,
            self.page_size,
            "playlists",
            |p: PlaylistObject| Some(Playlist::from(p)),
        )
        .await
    }

    /// Fetch tracks from the Liked Songs collection
    pub async fn get_liked_tracks(&self) -> Result<Vec<Track>> {
        let url = format!("{}/me/tracks", self.api_base);
        self.get_tracks(&url).await
    }

    /// Current contents of a playlist. Removed tracks are skipped.
    pub async fn get_playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let url = format!("{}/playlists/{playlist_id}/tracks", self.api_base);
        self.get_tracks(&url).await
    }

    async fn get_tracks(&self, url: &str) -> Result<Vec<Track>> {
        fetch_all(
            self.transport,
            &self.headers,
            url,
            self.page_size,
            "tracks",
            |item: TrackItem| match item.track {
                Some(track) => Some(Track::from(track)),
                None => {
                    debug!("Skipping item without track in {url}");
                    None
                }
            },
        )
        .await
    }

    /// First playlist, in listing order, whose name matches exactly
    pub async fn find_playlist(&self, user_id: &str, name: &str) -> Result<Option<Playlist>> {
        let playlists = self.get_user_playlists(user_id).await?;
        Ok(playlists.into_iter().find(|p| p.name == name))
    }

    /// Creates a playlist unconditionally
    pub async fn create_playlist(&self, user_id: &str, settings: &PlaylistSettings) -> Result<Playlist> {
        let url = format!("{}/users/{user_id}/playlists", self.api_base);
        let body = RequestBody::Json(json!({
            "name": settings.name,
            "description": settings.description,
            "public": settings.public,
        }));

        let response = self.transport.post(&url, &self.headers, &body).await?;
        if !response.is_success() {
            return Err(Error::PlaylistCreateError {
                name: settings.name.clone(),
                status: response.status,
                reason: api_error_message(&response.body),
            });
        }

        let created: CreatedPlaylist = serde_json::from_value(response.body)?;
        info!("Playlist {} successfully created", settings.name);
        Ok(Playlist {
            id: created.id,
            name: created.name.unwrap_or_else(|| settings.name.clone()),
        })
    }

    /// Returns the playlist named `settings.name`, creating it only when the user
    /// has none, so repeated runs keep writing to the same one.
    pub async fn resolve_playlist(&self, user_id: &str, settings: &PlaylistSettings) -> Result<ResolvedPlaylist> {
        if let Some(playlist) = self.find_playlist(user_id, &settings.name).await? {
            info!("Playlist {} already exists ({}), skipping creation", playlist.name, playlist.id);
            return Ok(ResolvedPlaylist {
                playlist,
                created: false,
            });
        }

        let playlist = self.create_playlist(user_id, settings).await?;
        Ok(ResolvedPlaylist {
            playlist,
            created: true,
        })
    }

    /// Appends `uris` to the playlist with a single request. Any failure,
    /// including a transport one, comes back as `TrackInsertError` carrying
    /// the URIs so the caller can report exactly what is missing.
    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{playlist_id}/tracks", self.api_base);
        let body = RequestBody::Json(json!({ "uris": uris }));

        let insert_error = |status: Option<u16>, reason: String| Error::TrackInsertError {
            playlist_id: playlist_id.to_string(),
            uris: uris.to_vec(),
            status,
            reason,
        };

        match self.transport.post(&url, &self.headers, &body).await {
            Ok(response) if response.is_success() => {
                info!("Added {} tracks to playlist", uris.len());
                Ok(())
            }
            Ok(response) => {
                warn!("Adding {} tracks failed with status {}", uris.len(), response.status);
                Err(insert_error(
                    Some(response.status),
                    api_error_message(&response.body),
                ))
            }
            Err(e) => Err(insert_error(None, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http::mock::{Method, MockTransport};

    fn settings(name: &str) -> PlaylistSettings {
        PlaylistSettings {
            name: name.into(),
            description: "copied".into(),
            public: true,
        }
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let transport = MockTransport::new();
        transport.respond(200, json!({"id": "user-1", "display_name": "Nick"}));
        let client = SpotifyClient::new(&transport, "tok");

        assert_eq!(client.current_user_id().await.unwrap(), "user-1");
        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://api.spotify.com/v1/me");
        assert_eq!(request.headers["authorization"], "Bearer tok");
    }

    #[tokio::test]
    async fn liked_tracks_skip_null_entries() {
        let transport = MockTransport::new();
        transport.respond(
            200,
            json!({"items": [
                {"track": {"uri": "spotify:track:a", "name": "A"}},
                {"track": null},
                {"track": {"uri": "spotify:track:b", "name": "B"}}
            ]}),
        );
        let client = SpotifyClient::new(&transport, "tok");

        let tracks = client.get_liked_tracks().await.unwrap();
        let uris: Vec<_> = tracks.iter().map(|t| t.uri.as_str()).collect();
        assert_eq!(uris, vec!["spotify:track:a", "spotify:track:b"]);
        assert_eq!(transport.requests()[0].url, "https://api.spotify.com/v1/me/tracks");
    }

    #[tokio::test]
    async fn resolves_existing_playlist_without_creating() {
        let transport = MockTransport::new();
        transport.respond(
            200,
            json!({"items": [
                {"id": "p1", "name": "liked songs but public"},
                {"id": "p2", "name": "Liked Songs but public"},
                {"id": "p3", "name": "Liked Songs but public"}
            ]}),
        );
        let client = SpotifyClient::new(&transport, "tok");

        let resolved = client
            .resolve_playlist("user-1", &settings("Liked Songs but public"))
            .await
            .unwrap();
        // exact, case-sensitive match; first one in listing order wins
        assert_eq!(resolved.playlist.id, "p2");
        assert!(!resolved.created);
        assert!(transport.posts().is_empty());
    }

    #[tokio::test]
    async fn resolving_twice_creates_once() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"items": [{"id": "other", "name": "Road trip"}]}))
            .respond(201, json!({"id": "new-1", "name": "Mirror"}))
            .respond(
                200,
                json!({"items": [{"id": "other", "name": "Road trip"}, {"id": "new-1", "name": "Mirror"}]}),
            );
        let client = SpotifyClient::new(&transport, "tok");

        let first = client.resolve_playlist("user-1", &settings("Mirror")).await.unwrap();
        let second = client.resolve_playlist("user-1", &settings("Mirror")).await.unwrap();

        assert_eq!(first.playlist.id, "new-1");
        assert_eq!(second.playlist.id, "new-1");
        assert!(first.created);
        assert!(!second.created);

        let posts = transport.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://api.spotify.com/v1/users/user-1/playlists");
        assert_eq!(
            posts[0].body,
            Some(RequestBody::Json(json!({"name": "Mirror", "description": "copied", "public": true})))
        );
    }

    #[tokio::test]
    async fn create_failure_is_reported() {
        let transport = MockTransport::new();
        transport
            .respond(200, json!({"items": []}))
            .respond(403, json!({"error": {"status": 403, "message": "Insufficient client scope"}}));
        let client = SpotifyClient::new(&transport, "tok");

        let err = client.resolve_playlist("user-1", &settings("Mirror")).await.unwrap_err();
        match err {
            Error::PlaylistCreateError { name, status, reason } => {
                assert_eq!(name, "Mirror");
                assert_eq!(status, 403);
                assert_eq!(reason, "Insufficient client scope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_tracks_posts_uris() {
        let transport = MockTransport::new();
        transport.respond(201, json!({"snapshot_id": "s1"}));
        let client = SpotifyClient::new(&transport, "tok");

        let uris = vec!["spotify:track:a".to_string(), "spotify:track:b".to_string()];
        client.add_tracks("pl", &uris).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://api.spotify.com/v1/playlists/pl/tracks");
        assert_eq!(
            request.body,
            Some(RequestBody::Json(json!({"uris": ["spotify:track:a", "spotify:track:b"]})))
        );
    }

    #[tokio::test]
    async fn add_tracks_failure_carries_uris() {
        let transport = MockTransport::new();
        transport.respond(400, json!({"error": {"status": 400, "message": "Invalid track uri"}}));
        let client = SpotifyClient::new(&transport, "tok");

        let uris = vec!["spotify:local:x".to_string()];
        let err = client.add_tracks("pl", &uris).await.unwrap_err();
        match err {
            Error::TrackInsertError { playlist_id, uris: failed, status, reason } => {
                assert_eq!(playlist_id, "pl");
                assert_eq!(failed, uris);
                assert_eq!(status, Some(400));
                assert_eq!(reason, "Invalid track uri");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn page_size_is_clamped_to_api_limit() {
        let transport = MockTransport::new();
        let client = SpotifyClient::new(&transport, "tok").with_page_size(500);
        assert_eq!(client.page_size, MAX_PAGE_SIZE);
    }
}
