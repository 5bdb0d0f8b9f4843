use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    /// Requested room id, generated if left out
    #[validate(length(min = 3, max = 32))]
    pub id: Option<String>,
}

/// Longest duration a request can be stored with
const MAX_DURATION_MS: u64 = i64::MAX as u64;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnqueueSchema {
    #[validate(length(min = 1, max = 128))]
    pub song_id: String,
    /// Length of the song, in milliseconds
    #[validate(range(min = 1, max = MAX_DURATION_MS))]
    pub duration_ms: u64,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SongMetadataSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(min = 1, max = 256))]
    pub artist: String,
    #[serde(default)]
    pub popularity: i32,
    #[validate(url)]
    pub image: Option<String>,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum RoomActionSchema {
    Pause,
    Resume,
    /// Skips the now playing song. If a song id is given, only that song is skipped.
    #[serde(rename_all = "camelCase")]
    Skip { song_id: Option<String> },
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
