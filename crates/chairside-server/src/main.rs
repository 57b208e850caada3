use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chairside_api::middleware::{hash_password, require_auth};
use chairside_api::{AppState, AppStateInner, handwriting, holidays, reservations, users};
use chairside_gateway::broadcaster::Broadcaster;
use chairside_gateway::connection;
use chairside_gateway::registry::{IDLE_TIMEOUT, Registry, SWEEP_INTERVAL, run_idle_sweep};
use chairside_service::{GridConfig, HandwritingStore, ReservationService};
use chairside_types::api::AuthUser;
use chairside_types::models::Role;

#[derive(Clone)]
struct ServerState {
    registry: Registry,
    service: Arc<ReservationService>,
    broadcaster: Broadcaster,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chairside=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("CHAIRSIDE_DB_PATH").unwrap_or_else(|_| "chairside.db".into());
    let data_dir = std::env::var("CHAIRSIDE_DATA_DIR").unwrap_or_else(|_| "data/png".into());
    let host = std::env::var("CHAIRSIDE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CHAIRSIDE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let grid = GridConfig {
        columns: std::env::var("CHAIRSIDE_COLUMNS")
            .unwrap_or_else(|_| "5".into())
            .parse()?,
        slot_interval_min: std::env::var("CHAIRSIDE_SLOT_INTERVAL_MIN")
            .unwrap_or_else(|_| "5".into())
            .parse()?,
    };

    // Init database
    let db = Arc::new(chairside_db::Database::open(&PathBuf::from(&db_path))?);
    bootstrap_admin(&db)?;

    // Shared state
    let files = HandwritingStore::new(PathBuf::from(&data_dir)).await?;
    let service = Arc::new(ReservationService::new(db.clone(), files, grid));
    let registry = Registry::new();
    let broadcaster = Broadcaster::new(registry.clone(), service.clone());

    // Idle connections are reclaimed on a fixed timer, independent of
    // command processing.
    tokio::spawn(run_idle_sweep(registry.clone(), SWEEP_INTERVAL, IDLE_TIMEOUT));

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        service: service.clone(),
        broadcaster: broadcaster.clone(),
    });

    let state = ServerState {
        registry,
        service,
        broadcaster,
    };

    // Routes — everything, the gateway upgrade included, sits behind the
    // Basic-auth layer; role gating happens per handler.
    let api_routes = Router::new()
        .route("/api/reservations", get(reservations::list).post(reservations::create))
        .route(
            "/api/reservations/{id}",
            put(reservations::update).delete(reservations::delete),
        )
        .route("/api/holidays", get(holidays::list).post(holidays::create))
        .route("/api/holidays/{id}", axum::routing::delete(holidays::delete))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/{id}", axum::routing::delete(users::delete))
        .route("/api/handwriting", post(handwriting::upload))
        .route("/api/handwriting/{filename}", get(handwriting::download))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .layer(middleware::from_fn_with_state(app_state, require_auth))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Chairside server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed a first admin account on an empty users table so the instance is
/// reachable out of the box.
fn bootstrap_admin(db: &chairside_db::Database) -> anyhow::Result<()> {
    if db.count_users()? > 0 {
        return Ok(());
    }

    let password =
        std::env::var("CHAIRSIDE_ADMIN_PASSWORD").unwrap_or_else(|_| "admin".into());
    let hash = hash_password(&password)?;
    db.insert_user("admin", &hash, Role::Admin)?;
    warn!("Created bootstrap 'admin' user — change its password");
    Ok(())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Extension(user): Extension<AuthUser>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.registry, state.service, state.broadcaster, user)
    })
}
