mod context;
mod docs;
mod errors;
mod rooms;
mod schemas;
mod serialized;
mod songs;
mod sse;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::*;
pub use errors::*;
pub use sse::{ServerEvent, ServerSentEvents};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Builds the partyqueue api, without binding it to an address
pub fn app(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/songs", songs::router())
        .nest("/events", sse::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the partyqueue server, forwarding collab events to connected clients
pub async fn run_server(collab: Arc<ServerCollab>, port: u16) -> std::io::Result<()> {
    let sse = ServerSentEvents::new();
    sse.forward(collab.events());

    let context = ServerContext { collab, sse };

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);
    axum::serve(listener, app(context)).await
}
