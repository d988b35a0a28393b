use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use hearth_api::auth::{self, AppState, AppStateInner};
use hearth_api::gateway_client::{GatewayClient, GatewayConfig};
use hearth_api::middleware::require_auth;
use hearth_api::{children, contacts, conversations, orphanages, payments, sos, users, wishes};
use hearth_gateway::connection;
use hearth_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HEARTH_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("HEARTH_DB_PATH").unwrap_or_else(|_| "hearth.db".into());
    let host = std::env::var("HEARTH_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HEARTH_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(hearth_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new(db.clone());
    let payments_client = GatewayClient::new(GatewayConfig::from_env());
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
        payments: payments_client,
    });

    let state = ServerState {
        dispatcher,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/users/me", get(users::me).patch(users::update_me))
        .route("/users/{user_id}/status", patch(users::set_account_status))
        .route(
            "/orphanages",
            get(orphanages::list_orphanages).post(orphanages::create_orphanage),
        )
        .route(
            "/orphanages/{orphanage_id}",
            get(orphanages::get_orphanage).patch(orphanages::update_orphanage),
        )
        .route(
            "/orphanages/{orphanage_id}/children",
            get(children::list_children).post(children::create_child),
        )
        .route("/children/{child_id}", get(children::get_child))
        .route("/children/{child_id}/documents", post(children::add_document))
        .route(
            "/wishes",
            get(wishes::list_wishes).post(wishes::create_wish),
        )
        .route("/wishes/{wish_id}/claim", post(wishes::claim_wish))
        .route("/wishes/{wish_id}/status", patch(wishes::update_wish_status))
        .route(
            "/payments",
            get(payments::list_payments).post(payments::initiate_donation),
        )
        .route("/sponsorships", post(payments::initiate_sponsorship))
        .route("/payments/verify/{reference}", get(payments::verify_payment))
        .route("/contacts", get(contacts::list_contacts))
        .route(
            "/conversations/{conversation_id}/messages",
            get(conversations::get_messages).post(conversations::send_message),
        )
        .route("/sos", get(sos::list_sos).post(sos::create_sos))
        .route("/sos/{alert_id}/status", patch(sos::update_sos_status))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Hearth server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.jwt_secret)
    })
}
