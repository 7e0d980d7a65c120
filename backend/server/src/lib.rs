//! Documentation of the light-dance choreography backend.
//!
//! Stores timed LED colors for every performer of a show, the client's raw
//! save format, and the music the show is cut to.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks to this server over JSON, bearer token in `Authorization`
//! - Snapshots and credentials live in Redis
//! - Music lives on a mounted volume, one directory per user
//! - `STORE_BACKEND=memory` runs without Redis for local work
//!
//!
//!
//! # Snapshots
//!
//! Every save is a new snapshot stamped `YYYY-MM-DD-HH:MM:SS` by the server.
//! Clients ask for a specific stamp or `LATEST`. A player's frames can be
//! fetched 10 at a time so boards with little memory can page through them.
//!
//! Only the newest `RETENTION_CAP` snapshots per user are kept.
//!
//!
//!
//! # Routes
//!
//! | route | auth | |
//! |---|---|---|
//! | `POST /token` | | form login, token is the username |
//! | `GET /users/me` | bearer | current identity |
//! | `GET /timelist/`, `/timelist/{user}` | | snapshot stamps |
//! | `GET /items/{user}/{time}` | | whole snapshot |
//! | `GET /items/{user}/{time}/{player}` | | one player |
//! | `GET /items/{user}/{time}/player={p}/chunk={c}` | | 10 frames of one player |
//! | `GET /raw/{user}/{time}` | | raw snapshot |
//! | `POST /upload_items/`, `/upload_raw/` | bearer | append a snapshot |
//! | `POST /upload_music` | bearer | multipart `file`, MP3 only |
//! | `GET /get_music_list`, `/get_music_list/{user}` | | song names |
//! | `GET /get_music/{user}/{file}` | | song bytes |
//! | `GET /get_rand_lightlist/...`, `/get_test_lightlist/...` | | synthetic frames |
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 SEED_USERS=testuser:testpassword cargo run -p lightdance
//! ```
//!
//! Run without Redis.
//! ```sh
//! STORE_BACKEND=memory MUSIC_FILE_PATH=./music_file SEED_USERS=testuser:testpassword cargo run -p lightdance
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod music;
pub mod routes;
pub mod snapshots;
pub mod state;
pub mod utils;

use routes::{
    all_music_lists_handler, chunk_handler, items_handler, me_handler, music_handler,
    music_list_handler, player_handler, rand_lightlist_handler, raw_handler, root_handler,
    seeded_lightlist_handler, test_lightlist_chunk_handler, test_lightlist_handler,
    timelist_handler, token_handler, upload_items_handler, upload_music_handler,
    upload_raw_handler, user_timelist_handler,
};
use state::AppState;

pub async fn start_server() -> Result<(), anyhow::Error> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");
    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| warn!("Skipping CORS origin {origin}: {e}"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn app(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/", get(root_handler))
        .route("/token", post(token_handler))
        .route("/users/me", get(me_handler))
        .route("/timelist", get(timelist_handler))
        .route("/timelist/", get(timelist_handler))
        .route("/timelist/{username}", get(user_timelist_handler))
        .route("/items/{username}/{query_time}", get(items_handler))
        .route("/items/{username}/{query_time}/{player}", get(player_handler))
        .route(
            "/items/{username}/{query_time}/{player}/{chunk}",
            get(chunk_handler),
        )
        .route("/raw/{username}/{query_time}", get(raw_handler))
        .route("/upload_items", post(upload_items_handler).layer(upload_limit))
        .route("/upload_items/", post(upload_items_handler).layer(upload_limit))
        .route("/upload_raw", post(upload_raw_handler).layer(upload_limit))
        .route("/upload_raw/", post(upload_raw_handler).layer(upload_limit))
        .route("/upload_music", post(upload_music_handler).layer(upload_limit))
        .route("/get_music_list", get(all_music_lists_handler))
        .route("/get_music_list/{username}", get(music_list_handler))
        .route("/get_music/{username}/{filename}", get(music_handler))
        .route("/get_rand_lightlist/{cnt}", get(rand_lightlist_handler))
        .route("/get_rand_lightlist/{cnt}/{seed}", get(seeded_lightlist_handler))
        .route("/get_rand_lightlist/json/{cnt}", get(rand_lightlist_handler))
        .route("/get_test_lightlist/{cnt}", get(test_lightlist_handler))
        .route("/get_test_lightlist/{cnt}/{chunk}", get(test_lightlist_chunk_handler))
        .layer(cors(&state.config.cors_origins))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::WWW_AUTHENTICATE},
    };
    use bank::frames::Credential;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, database::CredentialStore, memory::MemoryStore};

    const BOUNDARY: &str = "lightdance-boundary";

    async fn test_app() -> (Router, Arc<AppState>, TempDir) {
        let music = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());

        store
            .put_credential(&Credential {
                username: "bob".into(),
                password: "builder".into(),
                disabled: true,
            })
            .await
            .unwrap();

        let config = Config {
            music_path: music.path().to_path_buf(),
            seed_users: vec![("alice".into(), "wonderland".into())],
            ..Config::default()
        };

        let state = AppState::with_stores(config, store.clone(), store).await.unwrap();

        (app(state.clone()), state, music)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, request).await;

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn authed_post(uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn music_upload(token: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload_music")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn frame(time: i64) -> Value {
        json!({
            "time": time, "head": 1, "shoulder": 2, "chest": 3, "front": 4,
            "skirt": 5, "leg": 6, "shoes": 7, "weap_1": 8, "weap_2": 9
        })
    }

    fn players() -> Value {
        let long: Vec<Value> = (0..25).map(frame).collect();
        json!({ "players": [long, [frame(0)]] })
    }

    #[tokio::test]
    async fn test_root() {
        let (app, _, _music) = test_app().await;

        let (status, body) = send_json(&app, get_request("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "Hello": "World" }));
    }

    #[tokio::test]
    async fn test_token() {
        let (app, _, _music) = test_app().await;

        let login = |form: &'static str| {
            Request::builder()
                .method("POST")
                .uri("/token")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap()
        };

        let (status, body) = send_json(&app, login("username=alice&password=wonderland")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "access_token": "alice", "token_type": "bearer" }));

        let (status, body) = send_json(&app, login("username=alice&password=nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Incorrect username or password");

        let (status, body) = send_json(&app, login("username=alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Malformed payload"));
    }

    #[tokio::test]
    async fn test_users_me() {
        let (app, _, _music) = test_app().await;

        let me = |token: Option<&str>| {
            let mut builder = Request::builder().uri("/users/me");
            if let Some(token) = token {
                builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
            }
            builder.body(Body::empty()).unwrap()
        };

        let (status, body) = send_json(&app, me(Some("alice"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "username": "alice", "disabled": false }));

        let response = app.clone().oneshot(me(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let (status, _) = send_json(&app, me(Some("mallory"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send_json(&app, me(Some("bob"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Inactive user");
    }

    #[tokio::test]
    async fn test_upload_and_query_items() {
        let (app, _, _music) = test_app().await;

        let (status, body) = send_json(&app, authed_post("/upload_items/", "alice", players())).await;
        assert_eq!(status, StatusCode::OK);
        let update_time = body["update_time"].as_str().unwrap().to_string();

        let (status, body) = send_json(&app, get_request("/timelist/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["list"], json!([{ "user": "alice", "update_time": update_time }]));

        let (status, body) = send_json(&app, get_request("/timelist/alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["list"].as_array().unwrap().len(), 1);

        let (status, latest) = send_json(&app, get_request("/items/alice/LATEST")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(latest["update_time"], update_time.as_str());
        assert_eq!(latest["players"], players()["players"]);

        let (_, exact) = send_json(&app, get_request(&format!("/items/alice/{update_time}"))).await;
        assert_eq!(exact, latest);

        let (status, body) = send_json(&app, get_request(&format!("/items/alice/{update_time}/1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["color_data"], json!([frame(0)]));

        let (status, body) = send_json(&app, get_request("/items/alice/LATEST/2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Invalid player index: 2");

        let (status, body) = send_json(&app, get_request("/items/alice/LATEST/player=0/chunk=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["player_data"], json!((20..25).map(frame).collect::<Vec<_>>()));

        let (status, body) = send_json(&app, get_request("/items/alice/LATEST/player=0/chunk=3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["player_data"], json!([]));

        let (status, _) = send_json(&app, get_request("/items/alice/LATEST/player=5/chunk=0")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send_json(&app, get_request("/items/alice/LATEST/player=x/chunk=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_snapshot() {
        let (app, _, _music) = test_app().await;

        let (status, body) = send_json(&app, get_request("/items/ghost/LATEST")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "user not found: 'ghost'");

        let (status, _) = send_json(&app, get_request("/raw/ghost/LATEST")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send_json(&app, get_request("/timelist/ghost")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["list"], json!([]));
    }

    #[tokio::test]
    async fn test_upload_items_validation() {
        let (app, state, _music) = test_app().await;

        let missing_field = json!({ "players": [[{ "time": 0, "head": 1 }]] });
        let (status, _) = send_json(&app, authed_post("/upload_items/", "alice", missing_field)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(&app, authed_post("/upload_items", "alice", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(&app, authed_post("/upload_items/", "mallory", players())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send_json(&app, authed_post("/upload_items/", "bob", players())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(state.snapshots.summaries(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_raw() {
        let (app, _, _music) = test_app().await;

        let (status, body) = send_json(
            &app,
            authed_post("/upload_raw/", "alice", json!({ "raw_data": "AAECAw==" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let update_time = body["update_time"].clone();

        let (status, body) = send_json(&app, get_request("/raw/alice/LATEST")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "user": "alice", "update_time": update_time, "raw_data": "AAECAw==" })
        );

        // raw uploads do not show up as color snapshots
        let (_, body) = send_json(&app, get_request("/timelist/")).await;
        assert_eq!(body["list"], json!([]));

        let (status, _) = send_json(&app, authed_post("/upload_raw/", "alice", json!({ "raw": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_music_round_trip() {
        let (app, _, _music) = test_app().await;
        let song = b"ID3\x03\x00 not really an mp3".to_vec();

        let (status, body) = send_json(&app, music_upload("alice", "song.mp3", "audio/mpeg", &song)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["info"].as_str().unwrap().starts_with("file 'song.mp3' saved at"));

        let (status, body) = send_json(&app, get_request("/get_music_list/alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["music_list"], json!(["song.mp3"]));

        let (status, body) = send_json(&app, get_request("/get_music_list")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["music_lists"], json!({ "alice": ["song.mp3"] }));

        let response = app.clone().oneshot(get_request("/get_music/alice/song.mp3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "audio/mpeg");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"song.mp3\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.to_vec(), song);
    }

    #[tokio::test]
    async fn test_music_rejections() {
        let (app, _, _music) = test_app().await;

        let (status, _) = send_json(&app, music_upload("alice", "notes.txt", "text/plain", b"hi")).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (status, _) = send_json(&app, music_upload("mallory", "song.mp3", "audio/mpeg", b"x")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let not_multipart = Request::builder()
            .method("POST")
            .uri("/upload_music")
            .header(AUTHORIZATION, "Bearer alice")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send_json(&app, not_multipart).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Malformed payload"));

        let no_file = Request::builder()
            .method("POST")
            .uri("/upload_music")
            .header(AUTHORIZATION, "Bearer alice")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
            )))
            .unwrap();
        let (status, body) = send_json(&app, no_file).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "No file provided");

        let (status, _) = send_json(&app, get_request("/get_music/alice/missing.mp3")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send_json(&app, get_request("/get_music/alice/%2E%2E")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(&app, get_request("/get_music_list/nobody")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["music_list"], json!([]));
    }

    #[tokio::test]
    async fn test_missing_music_root() {
        let (_, state, music) = test_app().await;
        let config = Config {
            music_path: music.path().join("does-not-exist"),
            ..state.config.clone()
        };
        let store = Arc::new(MemoryStore::new());
        let app = app(AppState::with_stores(config, store.clone(), store).await.unwrap());

        let (status, body) = send_json(&app, get_request("/get_music_list")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["music_lists"], json!({}));
        assert!(body["message"].as_str().unwrap().starts_with("Root directory"));
    }

    #[tokio::test]
    async fn test_lightlists() {
        let (app, _, _music) = test_app().await;

        let (status, first) = send(&app, get_request("/get_rand_lightlist/cnt=3/seed=1")).await;
        let (_, second) = send(&app, get_request("/get_rand_lightlist/cnt=3/seed=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);

        let body: Value = serde_json::from_slice(&first).unwrap();
        let times: Vec<u64> = body["color_data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|light| light["time"].as_str().unwrap().parse().unwrap())
            .collect();
        assert_eq!(times.len(), 3);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(times.iter().all(|&t| t < 1500));

        let (status, negative) = send(&app, get_request("/get_rand_lightlist/cnt=3/seed=-1")).await;
        let (_, again) = send(&app, get_request("/get_rand_lightlist/cnt=3/seed=-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(negative, again);
        assert_ne!(negative, first);

        for uri in ["/get_rand_lightlist/cnt=10", "/get_rand_lightlist/json/cnt=10"] {
            let (status, body) = send_json(&app, get_request(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["color_data"].as_array().unwrap().len(), 10);
            assert!(body["color_data"][0].get("leg1").is_some());
        }

        let (_, whole) = send_json(&app, get_request("/get_test_lightlist/cnt=50")).await;
        let (_, chunk) = send_json(&app, get_request("/get_test_lightlist/cnt=50/chunk=0")).await;
        assert_eq!(whole, chunk);
        assert_eq!(whole["color_data"].as_array().unwrap().len(), 50);

        for uri in [
            "/get_rand_lightlist/cnt=0/seed=1",
            "/get_rand_lightlist/cnt=1501",
            "/get_test_lightlist/cnt=0",
            "/get_test_lightlist/cnt=abc",
        ] {
            let (status, _) = send_json(&app, get_request(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
