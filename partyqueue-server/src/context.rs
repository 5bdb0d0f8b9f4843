use std::{convert::Infallible, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use partyqueue_collab::{Collab, Database};

use crate::sse::ServerSentEvents;

/// The collab system as the server sees it, over whichever database was configured
pub type ServerCollab = Collab<Arc<dyn Database>>;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<ServerCollab>,
    pub sse: Arc<ServerSentEvents>,
}

#[async_trait]
impl FromRequestParts<ServerContext> for ServerContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
