/// OAuth authorization code flow
pub mod auth;
/// Data entities for tracks and playlists
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// HTTP transport abstraction
pub mod http;
/// Paged listing retrieval
pub mod pagination;
/// Spotify Web API client
pub mod spotify;

pub use auth::Authorizer;
pub use http::ReqwestTransport;
pub use spotify::SpotifyClient;
