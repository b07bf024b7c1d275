//! # Encuesta
//!
//! Survey creation and response backend: owners author surveys of typed
//! questions (short text, multiple choice, 1-5 rating), share a link,
//! collect responses, and read aggregated results.
//!
//! The service is a thin HTTP binding over three row tables (`profiles`,
//! `surveys`, `survey_responses`) kept in SQLite, plus a pure results
//! aggregator. Owner-scoped routes identify the caller through the
//! `x-user-id` header; authentication itself happens upstream.
//!
//! ## Routes
//!
//! ```text
//! GET    /api/surveys                    owner's surveys, newest first
//! POST   /api/surveys                    create (returns share_url)
//! GET    /api/surveys/:id                public form load
//! PATCH  /api/surveys/:id                partial update (owner)
//! DELETE /api/surveys/:id                delete (owner)
//! POST   /api/surveys/:id/responses      submit (public, active surveys only)
//! GET    /api/surveys/:id/responses      raw responses (owner)
//! GET    /api/surveys/:id/results        aggregated results (owner)
//! GET    /api/dashboard                  surveys + response counts (owner)
//! POST   /api/profiles                   record email / display name
//! ```

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod error;
pub mod models;
pub mod results;
pub mod routes;
pub mod state;
pub mod store;
pub mod validate;

use routes::{
    create_survey_handler, dashboard_handler, delete_survey_handler, get_survey_handler,
    list_responses_handler, list_surveys_handler, profile_handler, results_handler,
    submit_response_handler, update_survey_handler, USER_HEADER,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/api/surveys",
            get(list_surveys_handler).post(create_survey_handler),
        )
        .route(
            "/api/surveys/:survey_id",
            get(get_survey_handler)
                .patch(update_survey_handler)
                .delete(delete_survey_handler),
        )
        .route(
            "/api/surveys/:survey_id/responses",
            get(list_responses_handler).post(submit_response_handler),
        )
        .route("/api/surveys/:survey_id/results", get(results_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/profiles", post(profile_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().expect("Failed to initialize state");

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
