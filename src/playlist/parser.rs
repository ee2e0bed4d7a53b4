use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "<n>. <title> - <artist>", title stops at the first " - "
    static ref SONG_LINE: Regex = Regex::new(r"^\d+\.\s(.+?)\s-\s(.+)$").unwrap();
}

/// A song suggested by the AI model, not yet looked up in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongCandidate {
    pub title: String,
    pub artist: String,
}

impl SongCandidate {
    /// Parse a single numbered line, `None` if it does not have the expected shape
    pub fn from_line(line: &str) -> Option<Self> {
        let captures = SONG_LINE.captures(line.trim())?;
        let title = captures[1].trim();
        let artist = captures[2].trim();
        if title.is_empty() || artist.is_empty() {
            return None;
        }
        Some(SongCandidate {
            title: title.to_string(),
            artist: artist.to_string(),
        })
    }
}

impl fmt::Display for SongCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)
    }
}

/// The raw song list answered by the AI model.
///
/// Parsing is lazy and can be restarted: every call to [`SongList::candidates`]
/// walks the text again from the top.
#[derive(Debug, Clone, Copy)]
pub struct SongList<'a> {
    raw: &'a str,
}

impl<'a> SongList<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self { raw }
    }

    /// Well-formed lines in order, anything else is skipped
    pub fn candidates(self) -> impl Iterator<Item = SongCandidate> + 'a {
        self.raw.lines().filter_map(SongCandidate::from_line)
    }
}
