use std::collections::HashSet;

use serde::Deserialize;

/// A track as seen by the sync. Identity is the URI, the name is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// `spotify:track:...`
    pub uri: String,
    /// Display name
    pub name: String,
}

/// A playlist owned by or visible to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    /// Web API playlist id
    pub id: String,
    /// Name as shown in the client, matched exactly when resolving
    pub name: String,
}

/// What the destination playlist should look like when it has to be created
#[derive(Debug, Clone)]
pub struct PlaylistSettings {
    /// Name to look for and to create with
    pub name: String,
    /// Description set on creation
    pub description: String,
    /// Visibility set on creation
    pub public: bool,
}

/// One window of a paged Web API listing
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Items of this window, in listing order
    pub items: Vec<T>,
    /// URL of the following page, `None` on the last one
    #[serde(default)]
    pub next: Option<String>,
}

// Wire shapes, only the fields the sync reads

#[derive(Debug, Deserialize)]
pub(crate) struct TrackObject {
    pub uri: String,
    #[serde(default)]
    pub name: String,
}

// Saved tracks and playlist items share this wrapper. Playlist items may carry
// a null track when the content was removed from the catalogue.
#[derive(Debug, Deserialize)]
pub(crate) struct TrackItem {
    pub track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistObject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserObject {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<TrackObject> for Track {
    fn from(t: TrackObject) -> Track {
        Track {
            uri: t.uri,
            name: t.name,
        }
    }
}

impl From<PlaylistObject> for Playlist {
    fn from(p: PlaylistObject) -> Playlist {
        Playlist {
            id: p.id,
            name: p.name,
        }
    }
}

/// Set of track URIs used for membership checks.
///
/// Iteration follows first-insertion order so that diffs are reproducible,
/// but equality of two tracks is decided by URI alone.
#[derive(Debug, Default, Clone)]
pub struct TrackSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl TrackSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the URI was already present
    pub fn insert(&mut self, uri: impl Into<String>) -> bool {
        let uri = uri.into();
        if self.members.contains(&uri) {
            return false;
        }
        self.members.insert(uri.clone());
        self.order.push(uri);
        true
    }

    /// Membership by URI
    pub fn contains(&self, uri: &str) -> bool {
        self.members.contains(uri)
    }

    /// Number of distinct URIs
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` when no URI was inserted
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// URIs in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// URIs in `self` that `other` lacks
    pub fn difference<'a>(&'a self, other: &'a TrackSet) -> impl Iterator<Item = &'a str> {
        self.iter().filter(move |uri| !other.contains(uri))
    }
}

impl<'t> FromIterator<&'t Track> for TrackSet {
    fn from_iter<I: IntoIterator<Item = &'t Track>>(iter: I) -> Self {
        let mut set = TrackSet::new();
        for track in iter {
            set.insert(track.uri.as_str());
        }
        set
    }
}

impl FromIterator<String> for TrackSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = TrackSet::new();
        for uri in iter {
            set.insert(uri);
        }
        set
    }
}
