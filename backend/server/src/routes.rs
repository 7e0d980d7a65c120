use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Form, Json,
    body::{Body, Bytes},
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::FormRejection,
    },
    http::{
        HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::IntoResponse,
};
use bank::{
    frames::{PlayerFrame, PlayerTrack},
    lightlist::{LightList, pattern_chunk, pattern_lights, random_lights, seeded_lights},
    payloads::{get_items_from_bytes, get_raw_from_bytes},
};
use serde::Serialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::{
    auth::{AccessToken, CurrentUser, Identity, LoginForm, login},
    error::AppError,
    music::MP3_CONTENT_TYPE,
    snapshots::{ColorSnapshot, RawSnapshot, SnapshotSummary, chunk},
    state::AppState,
    utils::{check_component, now_stamp, parse_index, parse_segment},
};

type SharedState = State<Arc<AppState>>;

#[derive(Serialize)]
pub struct TimeList {
    pub list: Vec<SnapshotSummary>,
}

#[derive(Serialize)]
pub struct PlayerData {
    pub color_data: PlayerTrack,
}

#[derive(Serialize)]
pub struct ChunkData {
    pub player_data: Vec<PlayerFrame>,
}

#[derive(Serialize)]
pub struct Uploaded {
    pub message: &'static str,
    pub update_time: String,
}

#[derive(Serialize)]
pub struct MusicList {
    pub music_list: Vec<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct MusicLists {
    pub music_lists: BTreeMap<String, Vec<String>>,
    pub message: String,
}

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({ "Hello": "World" }))
}

pub async fn token_handler(
    State(state): SharedState,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<AccessToken>, AppError> {
    let Form(form) = form?;

    Ok(Json(login(state.credentials.as_ref(), &form).await?))
}

pub async fn me_handler(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}

pub async fn timelist_handler(State(state): SharedState) -> Result<Json<TimeList>, AppError> {
    Ok(Json(TimeList {
        list: state.snapshots.summaries(None).await?,
    }))
}

pub async fn user_timelist_handler(
    State(state): SharedState,
    Path(username): Path<String>,
) -> Result<Json<TimeList>, AppError> {
    Ok(Json(TimeList {
        list: state.snapshots.summaries(Some(&username)).await?,
    }))
}

async fn color_snapshot(
    state: &AppState,
    username: &str,
    query_time: &str,
) -> Result<ColorSnapshot, AppError> {
    state
        .snapshots
        .color(username, query_time)
        .await?
        .ok_or_else(|| AppError::SnapshotNotFound(username.to_string()))
}

pub async fn items_handler(
    State(state): SharedState,
    Path((username, query_time)): Path<(String, String)>,
) -> Result<Json<ColorSnapshot>, AppError> {
    Ok(Json(color_snapshot(&state, &username, &query_time).await?))
}

pub async fn player_handler(
    State(state): SharedState,
    Path((username, query_time, player)): Path<(String, String, String)>,
) -> Result<Json<PlayerData>, AppError> {
    let player = parse_index(&player, "player")?;
    let snapshot = color_snapshot(&state, &username, &query_time).await?;

    let track = snapshot
        .into_player(player)
        .ok_or(AppError::InvalidPlayer(player))?;

    Ok(Json(PlayerData { color_data: track }))
}

pub async fn chunk_handler(
    State(state): SharedState,
    Path((username, query_time, player, chunk_index)): Path<(String, String, String, String)>,
) -> Result<Json<ChunkData>, AppError> {
    let player = parse_segment(&player, "player")?;
    let chunk_index = parse_segment(&chunk_index, "chunk")?;
    let snapshot = color_snapshot(&state, &username, &query_time).await?;

    let track = snapshot
        .player(player)
        .ok_or(AppError::InvalidPlayer(player))?;

    Ok(Json(ChunkData {
        player_data: chunk(&track.frames, chunk_index).to_vec(),
    }))
}

pub async fn raw_handler(
    State(state): SharedState,
    Path((username, query_time)): Path<(String, String)>,
) -> Result<Json<RawSnapshot>, AppError> {
    state
        .snapshots
        .raw(&username, &query_time)
        .await?
        .map(Json)
        .ok_or(AppError::SnapshotNotFound(username))
}

pub async fn upload_items_handler(
    State(state): SharedState,
    CurrentUser(identity): CurrentUser,
    body: Bytes,
) -> Result<Json<Uploaded>, AppError> {
    let items = get_items_from_bytes(&body).map_err(|e| AppError::MalformedPayload(e.to_string()))?;
    let update_time = now_stamp();

    let evicted = state
        .snapshots
        .append_color(&identity.username, &update_time, items.players)
        .await?;

    info!(
        "Stored color snapshot {update_time} for {}, evicted {}",
        identity.username,
        evicted.len()
    );

    Ok(Json(Uploaded {
        message: "upload success",
        update_time,
    }))
}

pub async fn upload_raw_handler(
    State(state): SharedState,
    CurrentUser(identity): CurrentUser,
    body: Bytes,
) -> Result<Json<Uploaded>, AppError> {
    let raw = get_raw_from_bytes(&body).map_err(|e| AppError::MalformedPayload(e.to_string()))?;
    let update_time = now_stamp();

    let evicted = state
        .snapshots
        .append_raw(&identity.username, &update_time, raw.raw_data)
        .await?;

    info!(
        "Stored raw snapshot {update_time} for {}, evicted {}",
        identity.username,
        evicted.len()
    );

    Ok(Json(Uploaded {
        message: "raw data upload success",
        update_time,
    }))
}

pub async fn upload_music_handler(
    State(state): SharedState,
    CurrentUser(identity): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart?;
    let username = check_component(&identity.username)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::MalformedPayload(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_string) else {
            return Err(AppError::MissingFile);
        };
        let filename = check_component(&filename)?.to_string();

        if field.content_type() != Some(MP3_CONTENT_TYPE) {
            return Err(AppError::UnsupportedMediaType);
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::MalformedPayload(e.body_text()))?;
        let size = bytes.len();

        let path = state.music.save(username, &filename, bytes).await?;
        info!("Saved {size} bytes of music to {}", path.display());

        let dir = state.music.user_dir(username);
        return Ok(Json(json!({
            "info": format!("file '{filename}' saved at '{}'", dir.display())
        })));
    }

    Err(AppError::MissingFile)
}

pub async fn music_list_handler(
    State(state): SharedState,
    Path(username): Path<String>,
) -> Result<Json<MusicList>, AppError> {
    let username = check_component(&username)?;
    let dir = state.music.user_dir(username);

    Ok(Json(MusicList {
        music_list: state.music.list(username).await?,
        message: format!("get music list from {}", dir.display()),
    }))
}

pub async fn all_music_lists_handler(
    State(state): SharedState,
) -> Result<Json<MusicLists>, AppError> {
    let response = match state.music.list_all().await? {
        Some(music_lists) => MusicLists {
            music_lists,
            message: "Retrieved all music lists".to_string(),
        },
        None => MusicLists {
            music_lists: BTreeMap::new(),
            message: format!("Root directory '{}' not found", state.music.root().display()),
        },
    };

    Ok(Json(response))
}

pub async fn music_handler(
    State(state): SharedState,
    Path((username, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let username = check_component(&username)?;
    let filename = check_component(&filename)?;

    let file = state
        .music
        .open(username, filename)
        .await?
        .ok_or_else(|| AppError::MusicNotFound(format!("{username}/{filename}")))?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|_| AppError::InvalidParameter(format!("invalid name '{filename}'")))?;

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(MP3_CONTENT_TYPE)),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

pub async fn seeded_lightlist_handler(
    Path((cnt, seed)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let cnt = parse_segment(&cnt, "cnt")?;
    let seed: i64 = parse_segment(&seed, "seed")?;

    Ok(Json(LightList::from(seeded_lights(cnt, seed as u64)?)))
}

pub async fn rand_lightlist_handler(Path(cnt): Path<String>) -> Result<impl IntoResponse, AppError> {
    let cnt = parse_segment(&cnt, "cnt")?;

    Ok(Json(LightList::from(random_lights(cnt)?)))
}

pub async fn test_lightlist_handler(Path(cnt): Path<String>) -> Result<impl IntoResponse, AppError> {
    let cnt = parse_segment(&cnt, "cnt")?;

    Ok(Json(LightList::from(pattern_lights(cnt)?)))
}

pub async fn test_lightlist_chunk_handler(
    Path((cnt, chunk_index)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let cnt = parse_segment(&cnt, "cnt")?;
    let chunk_index = parse_segment(&chunk_index, "chunk")?;

    Ok(Json(LightList::from(pattern_chunk(cnt, chunk_index)?)))
}
