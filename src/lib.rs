//! Likedsync - Copy Spotify liked tracks into a playlist
//!
//! This library provides functionality to mirror your Spotify Liked Songs
//! into a regular (by default public) playlist, adding only what is missing
//! so that repeated runs are safe.

/// Client modules for interacting with the Spotify Web API
pub mod clients;
/// Run configuration
pub mod config;
/// Set difference and chunked insertion of missing tracks
pub mod reconcile;
/// End-to-end orchestration of a single run
pub mod syncer;
