use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use switchboard_gateway::connection;
use switchboard_gateway::hub::Hub;
use switchboard_gateway::identity::{IdentityResolver, JwtIdentityResolver, resolve_or_guest};
use switchboard_types::api::Handshake;

mod templates;

#[derive(Clone)]
struct ServerState {
    hub: Hub,
    resolver: Arc<dyn IdentityResolver>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchboard=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("SWITCHBOARD_JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path =
        std::env::var("SWITCHBOARD_DB_PATH").unwrap_or_else(|_| "switchboard.db".into());
    let host = std::env::var("SWITCHBOARD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SWITCHBOARD_PORT")
        .unwrap_or_else(|_| "3100".into())
        .parse()?;

    // Init database
    let db = Arc::new(switchboard_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let hub = Hub::new(db, Arc::new(templates::DefaultTemplates));
    let resolver: Arc<dyn IdentityResolver> = Arc::new(JwtIdentityResolver::new(jwt_secret));
    let state = ServerState { hub, resolver };

    // Routes
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Switchboard hub listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(handshake): Query<Handshake>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // Identity is resolved before the upgrade; failures become guests.
    let identity = resolve_or_guest(state.resolver.as_ref(), &handshake);
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.hub, identity))
}
