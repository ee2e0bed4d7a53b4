use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::SpotifyAuth;
use crate::error::GenerateError;
use crate::playlist::PlaylistGenerator;

#[derive(Clone)]
pub struct ServerState {
    pub generator: Arc<PlaylistGenerator>,
    pub auth: Arc<SpotifyAuth>,
}

#[derive(Deserialize, Debug)]
struct GeneratePlaylistBody {
    #[serde(default)]
    info: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn home() -> impl IntoResponse {
    Json(json!({ "message": "AI Playlist Generator Backend is Running!" }))
}

async fn generate_playlist(State(state): State<ServerState>, body: Bytes) -> Response {
    let info = serde_json::from_slice::<GeneratePlaylistBody>(&body)
        .ok()
        .and_then(|body| body.info)
        .filter(|info| !info.trim().is_empty());
    let Some(info) = info else {
        return GenerateError::EmptyInput.into_response();
    };

    info!(mood = %info, "Generating playlist");
    let generator = state.generator.clone();
    match tokio::task::spawn_blocking(move || generator.generate(&info)).await {
        Ok(Ok(playlist)) => Json(playlist).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => GenerateError::Upstream(anyhow::anyhow!("Playlist generation aborted: {e}"))
            .into_response(),
    }
}

async fn login(State(state): State<ServerState>) -> Redirect {
    Redirect::temporary(&state.auth.authorize_url())
}

async fn callback(
    State(state): State<ServerState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let code = match (params.code, params.error) {
        (_, Some(reason)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Spotify authorization denied: {reason}") })),
            )
                .into_response();
        }
        (Some(code), None) => code,
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing authorization code" })),
            )
                .into_response();
        }
    };

    let auth = state.auth.clone();
    match tokio::task::spawn_blocking(move || auth.exchange_code(&code)).await {
        Ok(Ok(())) => Json(json!({ "message": "Spotify authorization complete" })).into_response(),
        Ok(Err(e)) => {
            error!("Spotify authorization failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{e:#}") })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/generate_playlist", post(generate_playlist))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves
pub async fn run_server(
    state: ServerState,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = make_app(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockMusicCatalog;
    use crate::config::SpotifyConfig;
    use crate::gemini::MockSongOracle;
    use crate::playlist::PlaylistRegistry;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn create_test_state(oracle: MockSongOracle, catalog: MockMusicCatalog) -> ServerState {
        let generator = PlaylistGenerator::new(
            Arc::new(oracle),
            Arc::new(catalog),
            Arc::new(PlaylistRegistry::new()),
        );
        let config = SpotifyConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:5001/callback".to_string(),
            refresh_token: None,
        };
        ServerState {
            generator: Arc::new(generator),
            auth: Arc::new(SpotifyAuth::new(ureq::Agent::new(), &config)),
        }
    }

    fn idle_state() -> ServerState {
        let mut oracle = MockSongOracle::new();
        oracle.expect_generate().never();
        create_test_state(oracle, MockMusicCatalog::new())
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate_playlist")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_home() {
        let app = make_app(idle_state());
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "AI Playlist Generator Backend is Running!" })
        );
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        for body in [r#"{"info": ""}"#, r#"{"info": "   "}"#, r#"{}"#, "not json"] {
            let app = make_app(idle_state());
            let response = app.oneshot(post_json(body)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(
                json_body(response).await,
                json!({ "error": "Please provide input" })
            );
        }
    }

    #[tokio::test]
    async fn test_insufficient_songs_is_500() {
        let mut oracle = MockSongOracle::new();
        oracle
            .expect_generate()
            .times(1)
            .returning(|_| Ok("1. Only One - Artist".to_string()));
        let app = make_app(create_test_state(oracle, MockMusicCatalog::new()));

        let response = app.oneshot(post_json(r#"{"info": "happy"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Gemini AI did not return enough valid songs" })
        );
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_forwarded() {
        let mut oracle = MockSongOracle::new();
        oracle
            .expect_generate()
            .returning(|_| Err(anyhow::anyhow!("API key not valid")));
        let app = make_app(create_test_state(oracle, MockMusicCatalog::new()));

        let response = app.oneshot(post_json(r#"{"info": "happy"}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "error": "API key not valid" }));
    }

    #[tokio::test]
    async fn test_login_redirects_to_spotify() {
        let app = make_app(idle_state());
        let request = Request::builder().uri("/login").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://accounts.spotify.com/authorize?"));
    }

    #[tokio::test]
    async fn test_callback_without_code() {
        let app = make_app(idle_state());
        let request = Request::builder()
            .uri("/callback?error=access_denied")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Spotify authorization denied: access_denied" })
        );
    }
}
