use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tracing::{debug, info, warn};
use ureq::{Agent, Request};
use urlencoding::encode;

use crate::auth::SpotifyAuth;
use crate::models::{ApiErrorResponse, CatalogUser, CreatedPlaylist, SearchResponse, Track};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// The Web API refuses more than 100 items per add request
const MAX_ITEMS_PER_REQUEST: usize = 100;

/// The music catalog playlists are built in
#[cfg_attr(test, mockall::automock)]
pub trait MusicCatalog: Send + Sync {
    /// Search tracks, best match first
    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>>;

    /// The user the catalog acts on behalf of
    fn current_user(&self) -> Result<CatalogUser>;

    fn create_playlist(&self, user_id: &str, name: &str, public: bool)
    -> Result<CreatedPlaylist>;

    /// Append track URIs to a playlist, keeping their order
    fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Unfollow (which for the owner means delete) a playlist.
    /// A playlist that no longer exists counts as deleted.
    fn unfollow_playlist(&self, user_id: &str, playlist_id: &str) -> Result<()>;
}

/// Turn a ureq error into a readable error, extracting the API message if any
pub(crate) fn api_error(err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            anyhow!("HTTP {code}: {message}")
        }
        ureq::Error::Transport(transport) => anyhow!("HTTP request failed: {transport}"),
    }
}

/// Request bodies for appending `uris`, at most [`MAX_ITEMS_PER_REQUEST`] each
fn add_items_bodies(uris: &[String]) -> Vec<serde_json::Value> {
    uris.chunks(MAX_ITEMS_PER_REQUEST)
        .map(|chunk| json!({ "uris": chunk }))
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum Unfollowed {
    Deleted,
    AlreadyGone,
}

/// A 404 on unfollow means the playlist no longer exists, which is what we wanted
fn unfollow_outcome(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<Unfollowed, ureq::Error> {
    match result {
        Ok(_) => Ok(Unfollowed::Deleted),
        Err(ureq::Error::Status(404, _)) => Ok(Unfollowed::AlreadyGone),
        Err(e) => Err(e),
    }
}

/// A small Spotify Web API client authenticated with a user token
pub struct SpotifyClient {
    agent: Agent,
    base_url: String,
    auth: Arc<SpotifyAuth>,
}

impl SpotifyClient {
    pub fn new(agent: Agent, auth: Arc<SpotifyAuth>) -> Self {
        SpotifyClient {
            agent,
            base_url: API_BASE_URL.to_string(),
            auth,
        }
    }

    fn authorized(&self, request: Request) -> Result<Request> {
        let token = self.auth.access_token()?;
        Ok(request.set("Authorization", &format!("Bearer {token}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl MusicCatalog for SpotifyClient {
    fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
        debug!(query, limit, "Searching tracks");

        let request = self
            .authorized(self.agent.get(&self.url("/search")))?
            .query("q", query)
            .query("type", "track")
            .query("limit", &limit.to_string());

        let response: SearchResponse = request
            .call()
            .map_err(api_error)
            .with_context(|| format!("Search failed for '{query}'"))?
            .into_json()
            .context("Failed to parse search response")?;

        Ok(response.tracks.map(|page| page.items).unwrap_or_default())
    }

    fn current_user(&self) -> Result<CatalogUser> {
        let user: CatalogUser = self
            .authorized(self.agent.get(&self.url("/me")))?
            .call()
            .map_err(api_error)
            .context("Failed to fetch current user")?
            .into_json()
            .context("Failed to parse current user")?;
        Ok(user)
    }

    fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        public: bool,
    ) -> Result<CreatedPlaylist> {
        let url = self.url(&format!("/users/{}/playlists", encode(user_id)));

        let playlist: CreatedPlaylist = self
            .authorized(self.agent.post(&url))?
            .send_json(json!({ "name": name, "public": public }))
            .map_err(api_error)
            .with_context(|| format!("Failed to create playlist '{name}'"))?
            .into_json()
            .context("Failed to parse created playlist")?;

        info!(playlist_id = %playlist.id, name, "Created playlist");
        Ok(playlist)
    }

    fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/tracks", encode(playlist_id)));

        for body in add_items_bodies(uris) {
            self.authorized(self.agent.post(&url))?
                .send_json(body)
                .map_err(api_error)
                .with_context(|| format!("Failed to add tracks to playlist {playlist_id}"))?;
        }

        debug!(playlist_id, count = uris.len(), "Added tracks to playlist");
        Ok(())
    }

    fn unfollow_playlist(&self, user_id: &str, playlist_id: &str) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/followers", encode(playlist_id)));

        let outcome = unfollow_outcome(self.authorized(self.agent.delete(&url))?.call())
            .map_err(api_error)
            .with_context(|| format!("Failed to unfollow playlist {playlist_id}"))?;

        if outcome == Unfollowed::AlreadyGone {
            warn!(user_id, playlist_id, "Playlist already gone");
        }
        Ok(())
    }
}
