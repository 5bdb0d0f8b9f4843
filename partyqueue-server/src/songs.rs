use axum::{extract::Path, routing::put, Json};
use partyqueue_collab::{Database, Metadata};
use partyqueue_core::SongId;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    schemas::{SongMetadataSchema, ValidatedJson},
    serialized::{SongMetadata, ToSerialized},
    Router,
};

#[utoipa::path(
    put,
    path = "/v1/songs/{song_id}",
    tag = "songs",
    request_body = SongMetadataSchema,
    responses(
        (status = 200, description = "Metadata was stored", body = SongMetadata)
    )
)]
pub async fn upsert_song(
    context: ServerContext,
    Path(song_id): Path<String>,
    ValidatedJson(body): ValidatedJson<SongMetadataSchema>,
) -> ServerResult<Json<SongMetadata>> {
    let metadata = Metadata {
        song_id: SongId::new(song_id),
        title: body.title,
        artist: body.artist,
        popularity: body.popularity,
        last_requested: None,
        image: body.image,
    };

    context
        .collab
        .database()
        .upsert_metadata(metadata.clone())
        .await?;

    Ok(Json(metadata.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/:song_id", put(upsert_song))
}
