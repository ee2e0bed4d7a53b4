use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::matcher::resolve_tracks;
use super::parser::{SongCandidate, SongList};
use super::registry::PlaylistRegistry;
use crate::client::MusicCatalog;
use crate::error::GenerateError;
use crate::gemini::SongOracle;

/// Fewer parsed songs or catalog matches than this fails the request
pub const MIN_SONGS: usize = 15;

/// What the caller gets back for a generated playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPlaylist {
    pub playlist_name: String,
    pub playlist_url: String,
}

pub fn song_list_prompt(mood: &str) -> String {
    format!(
        "You are a music recommendation expert. Based on the user's mood: \"{mood}\", \
         generate **at least 15-20 song recommendations**.\n\
         Respond **only** in this format:\n\
         1. Song Name - Artist Name\n\
         2. Song Name - Artist Name\n\
         3. Song Name - Artist Name\n\
         ...\n\
         Up to 20 songs in total. No extra text."
    )
}

pub fn playlist_name_prompt(mood: &str) -> String {
    format!(
        "Based on this mood or theme: \"{mood}\", suggest a **creative and engaging playlist name**.\n\
         Respond **only** with the playlist name, no extra text."
    )
}

/// Builds a playlist for a mood: AI suggestions, catalog lookup, playlist creation
pub struct PlaylistGenerator {
    oracle: Arc<dyn SongOracle>,
    catalog: Arc<dyn MusicCatalog>,
    registry: Arc<PlaylistRegistry>,
}

impl PlaylistGenerator {
    pub fn new(
        oracle: Arc<dyn SongOracle>,
        catalog: Arc<dyn MusicCatalog>,
        registry: Arc<PlaylistRegistry>,
    ) -> Self {
        Self {
            oracle,
            catalog,
            registry,
        }
    }

    /// Generate, create and register a playlist for `mood`. Blocks on the network.
    ///
    /// A failure after the playlist was created leaves it on the catalog as is.
    pub fn generate(&self, mood: &str) -> Result<GeneratedPlaylist, GenerateError> {
        // Ask for songs
        let raw_songs = self.oracle.generate(&song_list_prompt(mood))?;
        let songs: Vec<SongCandidate> = SongList::new(raw_songs.trim()).candidates().collect();
        info!(parsed = songs.len(), "Parsed song suggestions");
        if songs.len() < MIN_SONGS {
            return Err(GenerateError::InsufficientSongs);
        }

        // Name the playlist
        let playlist_name = self
            .oracle
            .generate(&playlist_name_prompt(mood))?
            .trim()
            .to_string();

        // Find the songs in the catalog
        let uris = resolve_tracks(self.catalog.as_ref(), &songs);
        if uris.len() < MIN_SONGS {
            return Err(GenerateError::InsufficientMatches);
        }

        let user = self.catalog.current_user()?;
        let playlist = self.catalog.create_playlist(&user.id, &playlist_name, true)?;
        self.catalog.add_items(&playlist.id, &uris)?;

        self.registry.insert(&playlist.id, Utc::now().timestamp());
        info!(
            playlist_id = %playlist.id,
            name = %playlist_name,
            tracks = uris.len(),
            "Playlist ready"
        );

        Ok(GeneratedPlaylist {
            playlist_name,
            playlist_url: playlist.external_urls.spotify,
        })
    }
}
