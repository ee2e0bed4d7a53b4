use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use tracing::{debug, info};
use ureq::Agent;
use urlencoding::encode;

use crate::client::api_error;
use crate::config::SpotifyConfig;
use crate::models::TokenResponse;

pub const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
pub const SCOPE: &str = "playlist-modify-public playlist-modify-private";

/// Refresh this many seconds before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    expires_at: i64,
    refresh_token: Option<String>,
}

/// Authorization code flow against the Spotify accounts service.
///
/// Tokens live in memory only. An access token is handed out while it is
/// fresh and refreshed transparently otherwise.
pub struct SpotifyAuth {
    agent: Agent,
    accounts_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    state: Mutex<TokenState>,
}

impl SpotifyAuth {
    pub fn new(agent: Agent, config: &SpotifyConfig) -> Self {
        SpotifyAuth {
            agent,
            accounts_url: ACCOUNTS_BASE_URL.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            state: Mutex::new(TokenState {
                refresh_token: config.refresh_token.clone(),
                ..TokenState::default()
            }),
        }
    }

    /// URL of the consent page the user is sent to by `/login`
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&scope={}&redirect_uri={}",
            self.accounts_url,
            encode(&self.client_id),
            encode(SCOPE),
            encode(&self.redirect_uri)
        )
    }

    /// Whether a refresh token is known, i.e. the API can be called
    pub fn is_authorized(&self) -> bool {
        self.lock_state().refresh_token.is_some()
    }

    /// Exchange the code received on the redirect URI for tokens
    pub fn exchange_code(&self, code: &str) -> Result<()> {
        let tokens = self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])?;
        info!("Spotify authorization code exchanged");
        self.store(tokens);
        Ok(())
    }

    /// Return a usable access token, refreshing it when needed
    pub fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let refresh_token = {
            let state = self.lock_state();
            if let Some(token) = &state.access_token {
                if state.expires_at - EXPIRY_MARGIN_SECS > now {
                    return Ok(token.clone());
                }
            }
            state.refresh_token.clone().ok_or_else(|| {
                anyhow!("Spotify is not authorized yet, visit /login to connect an account")
            })?
        };

        debug!("Refreshing Spotify access token");
        let tokens = self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ])?;
        let access_token = tokens.access_token.clone();
        self.store(tokens);
        Ok(access_token)
    }

    fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .agent
            .post(&format!("{}/api/token", self.accounts_url))
            .set("Authorization", &format!("Basic {credentials}"))
            .send_form(form)
            .map_err(api_error)
            .context("Spotify token request failed")?;

        Ok(response.into_json()?)
    }

    fn store(&self, tokens: TokenResponse) {
        let mut state = self.lock_state();
        state.expires_at = Utc::now().timestamp() + tokens.expires_in;
        state.access_token = Some(tokens.access_token);
        // Spotify only sometimes rotates the refresh token
        if let Some(refresh_token) = tokens.refresh_token {
            state.refresh_token = Some(refresh_token);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_auth(refresh_token: Option<&str>) -> SpotifyAuth {
        let config = SpotifyConfig {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:5001/callback".to_string(),
            refresh_token: refresh_token.map(str::to_string),
        };
        SpotifyAuth::new(Agent::new(), &config)
    }

    #[test]
    fn test_authorize_url_is_encoded() {
        let auth = create_test_auth(None);
        let url = auth.authorize_url();

        assert!(url.starts_with("https://accounts.spotify.com/authorize?response_type=code"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("scope=playlist-modify-public%20playlist-modify-private"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5001%2Fcallback"));
    }

    #[test]
    fn test_unauthorized_without_refresh_token() {
        let auth = create_test_auth(None);

        assert!(!auth.is_authorized());
        let err = auth.access_token().unwrap_err();
        assert!(err.to_string().contains("/login"));
    }

    #[test]
    fn test_fresh_token_is_reused() {
        let auth = create_test_auth(Some("refresh"));
        auth.store(TokenResponse {
            access_token: "access".to_string(),
            expires_in: 3600,
            refresh_token: None,
        });

        assert!(auth.is_authorized());
        assert_eq!(auth.access_token().unwrap(), "access");
    }
}
