//! Grows a destination playlist until it holds every source track.

use log::{debug, info, warn};

use crate::clients::{
    entities::TrackSet,
    errors::Error,
    http::Transport,
    spotify::{MAX_INSERT_BATCH, SpotifyClient},
};

/// URIs present in `source` but absent from `destination`, in source order
pub fn missing_uris(source: &TrackSet, destination: &TrackSet) -> Vec<String> {
    source.difference(destination).map(str::to_string).collect()
}

/// What a reconcile pass did
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Tracks the destination lacked at the start
    pub missing: usize,
    /// Tracks inserted by successful chunks
    pub added: usize,
    /// Add-tracks requests sent
    pub chunks_attempted: usize,
    /// One `TrackInsertError` per failed chunk, in chunk order
    pub failures: Vec<Error>,
}

impl ReconcileReport {
    /// Every chunk went in
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Adds missing tracks through a client, `batch_size` URIs per request
pub struct Reconciler<'c, 'a, T> {
    client: &'c SpotifyClient<'a, T>,
    batch_size: usize,
}

impl<'c, 'a, T: Transport> Reconciler<'c, 'a, T> {
    /// `batch_size` is clamped to 1..=100
    pub fn new(client: &'c SpotifyClient<'a, T>, batch_size: usize) -> Self {
        Reconciler {
            client,
            batch_size: batch_size.clamp(1, MAX_INSERT_BATCH),
        }
    }

    /// Inserts the missing tracks chunk by chunk, strictly one request at a
    /// time. A failed chunk is recorded and the next one still goes out;
    /// nothing already inserted is undone. Re-running is safe: tracks that
    /// made it in are no longer missing.
    pub async fn reconcile(
        &self,
        playlist_id: &str,
        source: &TrackSet,
        destination: &TrackSet,
    ) -> ReconcileReport {
        let missing = missing_uris(source, destination);
        let mut report = ReconcileReport {
            missing: missing.len(),
            ..Default::default()
        };

        if missing.is_empty() {
            info!("Playlist {playlist_id} already holds all {} tracks", source.len());
            return report;
        }
        info!(
            "{} tracks missing from playlist {playlist_id}, adding in chunks of {}",
            missing.len(),
            self.batch_size
        );

        for (index, chunk) in missing.chunks(self.batch_size).enumerate() {
            report.chunks_attempted += 1;
            debug!("Sending chunk {} with {} tracks", index + 1, chunk.len());
            match self.client.add_tracks(playlist_id, chunk).await {
                Ok(()) => report.added += chunk.len(),
                Err(e) => {
                    warn!("Chunk {} failed: {e}", index + 1);
                    report.failures.push(e);
                }
            }
        }

        report
    }
}
