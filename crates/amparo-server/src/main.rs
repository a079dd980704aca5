use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use amparo_api::middleware::require_auth;
use amparo_api::{AppState, AppStateInner, admin, auth, cities, comments, images, markers, reports};
use amparo_gateway::connection;
use amparo_store::{LifecycleEngine, QueryFacade, RequestStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amparo=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("AMPARO_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("AMPARO_DB_PATH").unwrap_or_else(|_| "amparo.db".into());
    let image_dir = std::env::var("AMPARO_IMAGE_DIR").unwrap_or_else(|_| "images".into());
    let host = std::env::var("AMPARO_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AMPARO_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database and store
    let db = Arc::new(amparo_db::Database::open(&PathBuf::from(&db_path))?);
    bootstrap_super_user(&db)?;

    let store = Arc::new(RequestStore::new(Arc::clone(&db)));
    let engine = LifecycleEngine::new(Arc::clone(&store));
    let facade = QueryFacade::new(Arc::clone(&store));

    let state: AppState = Arc::new(AppStateInner {
        db,
        store: Arc::clone(&store),
        engine,
        facade,
        jwt_secret: jwt_secret.clone(),
        image_dir: PathBuf::from(&image_dir),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/cities", get(cities::list_cities))
        .route("/city-requests", post(cities::suggest_city))
        .route("/markers/nearby", get(markers::nearby))
        .route("/cities/{city}/markers", get(markers::list_markers))
        .route("/cities/{city}/markers", post(markers::create_marker))
        .route("/cities/{city}/markers/{id}", get(markers::get_marker))
        .route(
            "/cities/{city}/markers/{id}/images",
            post(images::upload_image),
        )
        .route(
            "/cities/{city}/markers/{id}/comments",
            get(comments::list_comments),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/cities/{city}/markers/{id}/status",
            post(markers::transition),
        )
        .route("/cities/{city}/markers/reorder", post(markers::reorder))
        .route("/cities/{city}/markers/counts", get(markers::counts))
        .route("/cities/{city}/report", get(reports::city_report))
        .route(
            "/cities/{city}/markers/{id}/comments",
            post(comments::create_comment),
        )
        .route("/cities/{city}/users", get(admin::list_users))
        .route("/users", post(admin::create_user))
        .route("/users/{id}", patch(admin::update_user))
        .route("/cities", post(cities::create_city))
        .route("/city-requests", get(cities::list_city_requests))
        .route(
            "/city-requests/{id}/approve",
            post(cities::approve_city_request),
        )
        .route(
            "/city-requests/{id}/reject",
            post(cities::reject_city_request),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ServerState {
            store,
            jwt_secret,
        });

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service("/images", ServeDir::new(&image_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Amparo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
struct ServerState {
    store: Arc<RequestStore>,
    jwt_secret: String,
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.store, state.jwt_secret))
}

/// First-run convenience: when the users table is empty and bootstrap
/// credentials are configured, provision the initial super account.
fn bootstrap_super_user(db: &amparo_db::Database) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("AMPARO_SUPER_EMAIL"),
        std::env::var("AMPARO_SUPER_PASSWORD"),
    ) else {
        return Ok(());
    };

    if db.count_users()? > 0 {
        return Ok(());
    }

    let hash = amparo_api::auth::hash_password(&password)
        .map_err(|_| anyhow::anyhow!("bootstrap password hash failed"))?;
    let user = amparo_types::models::User {
        id: uuid::Uuid::new_v4(),
        email,
        name: "Super".to_string(),
        role: amparo_types::models::Role::Super,
        city: "todos".to_string(),
        phone_number: None,
        created_at: chrono::Utc::now(),
    };
    db.create_user(&user, &hash)?;
    info!("Bootstrapped super user {}", user.email);
    Ok(())
}
