use axum::{
    extract::Path,
    routing::{get, post},
    Json,
};
use partyqueue_core::{RoomId, SongId};

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{EnqueueSchema, NewRoomSchema, RoomActionSchema, ValidatedJson},
    serialized::{CreatedRoom, NowPlaying, QueueItem, Room, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
pub async fn list_rooms(context: ServerContext) -> Json<Vec<Room>> {
    let rooms: Vec<Room> = context.collab.rooms.list_all().to_serialized();

    Json(rooms)
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    responses(
        (status = 200, body = CreatedRoom),
        (status = 409, description = "A room with the requested id exists")
    )
)]
pub async fn create_room(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<CreatedRoom>> {
    let room = context
        .collab
        .rooms
        .create_room(body.id.map(RoomId::new))
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    responses(
        (status = 200, body = Room),
        (status = 404, description = "Room does not exist")
    )
)]
pub async fn room(context: ServerContext, Path(room_id): Path<String>) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.room_by_id(&room_id.into())?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/queue",
    tag = "rooms",
    responses(
        (status = 200, description = "Waiting songs in play order", body = Vec<QueueItem>)
    )
)]
pub async fn queue(
    context: ServerContext,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Vec<QueueItem>>> {
    let room = context.collab.rooms.room_by_id(&room_id.into())?;
    let queue = room.joined_queue().await?;

    Ok(Json(queue.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/now-playing",
    tag = "rooms",
    responses(
        (status = 200, body = NowPlaying)
    )
)]
pub async fn now_playing(
    context: ServerContext,
    Path(room_id): Path<String>,
) -> ServerResult<Json<NowPlaying>> {
    let room = context.collab.rooms.room_by_id(&room_id.into())?;
    let snapshot = room.snapshot();

    let joined = context
        .collab
        .metadata()
        .join(snapshot.now_playing.into_iter().collect())
        .await?;

    Ok(Json(NowPlaying::new(
        snapshot.status,
        snapshot.remaining,
        joined.first(),
    )))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/queue",
    tag = "rooms",
    request_body = EnqueueSchema,
    responses(
        (status = 200, description = "The song was queued, or boosted if it already was", body = QueueItem),
        (status = 503, description = "Nothing changed, the room could not be stored")
    )
)]
pub async fn enqueue(
    context: ServerContext,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<EnqueueSchema>,
) -> ServerResult<Json<QueueItem>> {
    let room = context.collab.rooms.room_by_id(&room_id.into())?;
    let song_id = SongId::new(body.song_id);

    let (_, request) = room.enqueue(song_id, body.duration_ms).await?;
    Ok(Json(request.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/queue/{song_id}/boost",
    tag = "rooms",
    responses(
        (status = 200, body = QueueItem),
        (status = 404, description = "The song is not in the room")
    )
)]
pub async fn boost(
    context: ServerContext,
    Path((room_id, song_id)): Path<(String, String)>,
) -> ServerResult<Json<QueueItem>> {
    let room = context.collab.rooms.room_by_id(&room_id.into())?;
    let request = room.boost(&song_id.into()).await?;

    Ok(Json(request.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/actions",
    tag = "rooms",
    request_body = RoomActionSchema,
    responses(
        (status = 200, description = "Action was performed."),
        (status = 409, description = "The action is not possible in the room's current state")
    )
)]
pub async fn perform_room_action(
    context: ServerContext,
    Path(room_id): Path<String>,
    Json(body): Json<RoomActionSchema>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_id(&room_id.into())?;

    match body {
        RoomActionSchema::Pause => room.pause().await?,
        RoomActionSchema::Resume => room.resume().await?,
        RoomActionSchema::Skip { song_id } => {
            let expected = song_id.map(SongId::new);
            room.skip(expected.as_ref()).await?;
        }
    };

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/:id", get(room))
        .route("/:id/queue", get(queue).post(enqueue))
        .route("/:id/queue/:song_id/boost", post(boost))
        .route("/:id/now-playing", get(now_playing))
        .route("/:id/actions", post(perform_room_action))
}
