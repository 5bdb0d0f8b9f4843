use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::{rooms, schemas, serialized, songs, sse};

#[derive(OpenApi)]
#[openapi(
    paths(
        rooms::list_rooms,
        rooms::create_room,
        rooms::room,
        rooms::queue,
        rooms::now_playing,
        rooms::enqueue,
        rooms::boost,
        rooms::perform_room_action,
        songs::upsert_song,
        sse::event_stream,
    ),
    components(schemas(
        schemas::NewRoomSchema,
        schemas::EnqueueSchema,
        schemas::SongMetadataSchema,
        schemas::RoomActionSchema,
        serialized::PlaybackStatus,
        serialized::Room,
        serialized::CreatedRoom,
        serialized::QueueItem,
        serialized::SongMetadata,
        serialized::NowPlaying,
        sse::ServerEvent,
    )),
    info(
        description = "partyqueue-server exposes endpoints to share a queue of songs in a room"
    )
)]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
