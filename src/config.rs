use anyhow::{Context, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5001/callback";

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub gemini_model: String,
    pub spotify: SpotifyConfig,
}

/// Credentials of the Spotify application the playlists are created with
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Lets the server start already authorized, without going through `/login`
    pub refresh_token: Option<String>,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("Missing environment variable {name}"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();

    let spotify = SpotifyConfig {
        client_id: required("SPOTIFY_CLIENT_ID")?,
        client_secret: required("SPOTIFY_CLIENT_SECRET")?,
        redirect_uri: optional("SPOTIFY_REDIRECT_URI")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        refresh_token: optional("SPOTIFY_REFRESH_TOKEN"),
    };

    Ok(Config {
        google_api_key: required("GOOGLE_API_KEY")?,
        gemini_model: optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        spotify,
    })
}
