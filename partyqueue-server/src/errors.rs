use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::warn;
use partyqueue_collab::{DatabaseError, RoomError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("The {resource} {identifier} was not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("Storage is unavailable, nothing was changed")]
    Unavailable,
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            RoomError::InvalidTransition { action, state } => {
                Self::InvalidTransition { action, state }
            }
            RoomError::AlreadyExists(id) => Self::Conflict {
                resource: "room",
                field: "id",
                value: id.to_string(),
            },
            RoomError::PersistenceFailure(e) => {
                warn!("Persistence failed: {}", e);
                Self::Unavailable
            }
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier: identifier.to_string(),
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            DatabaseError::Internal(e) => {
                warn!("Database failed: {}", e);
                Self::Unavailable
            }
            e => Self::Unknown(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ServerError::from(RoomError::NotFound {
                    resource: "room",
                    identifier: "abc".to_string(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::from(RoomError::InvalidTransition {
                    action: "pause",
                    state: "idle",
                }),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::from(RoomError::AlreadyExists("abc".into())),
                StatusCode::CONFLICT,
            ),
            (
                ServerError::from(RoomError::PersistenceFailure(DatabaseError::Malformed {
                    resource: "room",
                    reason: "broken".to_string(),
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ServerError::from(DatabaseError::Malformed {
                    resource: "room",
                    reason: "broken".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.as_status_code(), expected, "status of {}", error);
        }
    }
}
