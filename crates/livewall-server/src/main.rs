use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use livewall_api::auth::{self, AppState, AppStateInner};
use livewall_api::media::{MAX_IMAGE_BYTES, Storage};
use livewall_api::middleware::require_auth;
use livewall_api::{announcements, events, likes, media, notes, participants, profiles};
use livewall_db::Database;
use livewall_gateway::connection;
use livewall_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    db: Arc<Database>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livewall=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("LIVEWALL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("LIVEWALL_DB_PATH").unwrap_or_else(|_| "livewall.db".into());
    let host = std::env::var("LIVEWALL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("LIVEWALL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let media_dir = std::env::var("LIVEWALL_MEDIA_DIR").unwrap_or_else(|_| "media".into());
    let public_url = std::env::var("LIVEWALL_PUBLIC_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));

    // Shared infrastructure: one store handle and one dispatcher per process,
    // passed into every component instead of living behind a global.
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    let dispatcher = Dispatcher::new();
    let storage = Storage::new(PathBuf::from(&media_dir)).await?;

    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret,
        dispatcher: dispatcher.clone(),
        storage,
        public_url,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/profiles", post(profiles::upsert_profile))
        .route("/events/by-code/{code}", get(events::lookup_by_code))
        .route("/events/{event_id}/participants", post(participants::join))
        .route(
            "/events/{event_id}/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route("/notes/{note_id}/likes", post(likes::toggle_like))
        .route(
            "/uploads/{event_id}/{participant_id}",
            post(media::upload_image),
        )
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/events", post(events::create_event))
        .route("/events/{event_id}/status", patch(events::set_status))
        .route(
            "/events/{event_id}/announcements",
            post(announcements::broadcast_announcement),
        )
        .route("/host/events/latest", get(events::latest_event))
        .route(
            "/notes/{note_id}",
            patch(notes::set_favorite).delete(notes::delete_note),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState { dispatcher, db });

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service("/media", ServeDir::new(&media_dir))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Livewall server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.db)
    })
}
