use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop or degrade a sync
#[derive(Error, Debug)]
pub enum Error {
    /// Token exchange or refresh was rejected
    #[error("Authorization failed: {0}")]
    AuthError(String),

    /// A listing page came back with a non-2xx status
    #[error("Failed to fetch {endpoint}: status {status}")]
    FetchError {
        /// URL of the failing page
        endpoint: String,
        /// HTTP status
        status: u16,
    },

    /// Creating the destination playlist failed
    #[error("Failed to create playlist {name:?}: status {status}, {reason}")]
    PlaylistCreateError {
        /// Requested playlist name
        name: String,
        /// HTTP status
        status: u16,
        /// Message from the error body
        reason: String,
    },

    /// One add-tracks request failed
    #[error("Failed to add {} tracks to playlist {playlist_id}: status {}, {reason}. Tracks: {uris:?}", .uris.len(), fmt_status(.status))]
    TrackInsertError {
        /// Destination playlist
        playlist_id: String,
        /// URIs of the chunk that was not added
        uris: Vec<String>,
        /// `None` when the request never got a response
        status: Option<u16>,
        /// Message from the error body or the transport
        reason: String,
    },

    /// The request never got a response
    #[error("HTTP transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    /// A body did not have the expected shape
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// A response that parsed but made no sense
    #[error("Spotify API unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The run finished but some chunks were not added
    #[error("Sync finished with {failed_chunks} failed chunk(s), {added} tracks added. Re-run to retry")]
    IncompleteSync {
        /// Chunks that failed
        failed_chunks: usize,
        /// Tracks added by the successful chunks
        added: usize,
    },
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

#[allow(clippy::ref_option)]
fn fmt_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

/// Pulls a human readable message out of a Web API error body.
///
/// The API answers `{"error": {"status": 400, "message": "..."}}` for most
/// endpoints and `{"error": "...", "error_description": "..."}` for the
/// accounts service.
pub(crate) fn api_error_message(body: &serde_json::Value) -> String {
    let error = &body["error"];
    if let Some(message) = error["message"].as_str() {
        return message.to_string();
    }
    if let Some(description) = body["error_description"].as_str() {
        return description.to_string();
    }
    if let Some(code) = error.as_str() {
        return code.to_string();
    }
    "no error message".to_string()
}
