use tracing::{debug, info, warn};

use super::parser::SongCandidate;
use crate::client::MusicCatalog;

/// How strictly a candidate is looked up in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Title and artist filters
    Exact,
    /// Title filter only, for when the suggested artist credit is off
    TitleOnly,
}

impl SearchStrategy {
    pub fn query(self, candidate: &SongCandidate) -> String {
        match self {
            SearchStrategy::Exact => {
                format!("track:{} artist:{}", candidate.title, candidate.artist)
            }
            SearchStrategy::TitleOnly => format!("track:{}", candidate.title),
        }
    }
}

/// Look up one candidate, returning the URI of the top result.
///
/// Search errors are logged and reported as no match.
pub fn match_track(
    catalog: &dyn MusicCatalog,
    candidate: &SongCandidate,
    strategy: SearchStrategy,
) -> Option<String> {
    let query = strategy.query(candidate);
    match catalog.search_tracks(&query, 1) {
        Ok(tracks) => match tracks.into_iter().next() {
            Some(track) => {
                debug!(
                    song = %candidate,
                    matched = %track.name,
                    artists = %track.artist_names(),
                    ?strategy,
                    "Matched song"
                );
                Some(track.uri)
            }
            None => {
                debug!(song = %candidate, ?strategy, "No result found");
                None
            }
        },
        Err(e) => {
            warn!(song = %candidate, ?strategy, "Error searching for song: {e:#}");
            None
        }
    }
}

/// Resolve candidates to track URIs, best effort.
///
/// Candidates missed by the exact search are retried by title only. Results
/// keep the order of `candidates`; candidates missed twice are dropped and
/// duplicates are kept.
pub fn resolve_tracks(catalog: &dyn MusicCatalog, candidates: &[SongCandidate]) -> Vec<String> {
    let mut slots: Vec<Option<String>> = candidates
        .iter()
        .map(|candidate| match_track(catalog, candidate, SearchStrategy::Exact))
        .collect();

    let missing = slots.iter().filter(|slot| slot.is_none()).count();
    if missing > 0 {
        info!(missing, "Retrying search with song titles only");
        for (slot, candidate) in slots.iter_mut().zip(candidates) {
            if slot.is_none() {
                *slot = match_track(catalog, candidate, SearchStrategy::TitleOnly);
            }
        }
    }

    let uris: Vec<String> = slots.into_iter().flatten().collect();
    info!(
        requested = candidates.len(),
        resolved = uris.len(),
        "Resolved songs in catalog"
    );
    uris
}
