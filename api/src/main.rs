use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod db;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vitalog API",
        version = "0.1.0",
        description = "Personal health data API behind the vitalog MCP tools. \
                       Every record is owned by one user; every operation is key-scoped."
    ),
    paths(
        routes::health::health_check,
        routes::users::upsert_user,
        routes::users::update_user,
        routes::users::get_user,
        routes::goals::create_goal,
        routes::goals::update_goal,
        routes::goals::delete_goal,
        routes::goals::list_goals,
        routes::policies::create_policy,
        routes::policies::update_policy,
        routes::policies::delete_policy,
        routes::policies::list_policies,
        routes::concerns::create_concern,
        routes::concerns::update_concern,
        routes::concerns::delete_concern,
        routes::concerns::list_concerns,
        routes::activities::add_activities,
        routes::activities::replace_activities,
        routes::activities::update_activity,
        routes::activities::delete_activity,
        routes::activities::get_activities,
        routes::activities::list_activities_in_range,
        routes::measurements::add_measurement,
        routes::measurements::update_measurement,
        routes::measurements::delete_measurement,
        routes::measurements::get_latest,
        routes::measurements::get_oldest,
        routes::measurements::list_history,
        routes::journals::add_journal,
        routes::journals::update_journal,
        routes::journals::delete_journal,
        routes::journals::get_journal,
        routes::journals::list_journals_in_range,
    ),
    components(schemas(
        HealthResponse,
        vitalog_core::error::ApiError,
        vitalog_core::user::User,
        vitalog_core::user::UpsertUserRequest,
        vitalog_core::user::UpdateUserRequest,
        vitalog_core::goal::HealthGoal,
        vitalog_core::goal::GoalType,
        vitalog_core::goal::GoalStatus,
        vitalog_core::goal::CreateGoalRequest,
        vitalog_core::goal::UpdateGoalRequest,
        vitalog_core::policy::HealthPolicy,
        vitalog_core::policy::PolicyType,
        vitalog_core::policy::CreatePolicyRequest,
        vitalog_core::policy::UpdatePolicyRequest,
        vitalog_core::concern::HealthConcern,
        vitalog_core::concern::ConcernCategory,
        vitalog_core::concern::ConcernStatus,
        vitalog_core::concern::CreateConcernRequest,
        vitalog_core::concern::UpdateConcernRequest,
        vitalog_core::activity::DailyActivity,
        vitalog_core::activity::ActivityEntry,
        vitalog_core::activity::ActivityType,
        vitalog_core::activity::AddActivitiesRequest,
        vitalog_core::activity::ReplaceActivitiesRequest,
        vitalog_core::activity::UpdateActivityRequest,
        vitalog_core::measurement::BodyMeasurement,
        vitalog_core::measurement::MeasurementSummary,
        vitalog_core::measurement::FieldSnapshot,
        vitalog_core::measurement::AddMeasurementRequest,
        vitalog_core::measurement::UpdateMeasurementRequest,
        vitalog_core::journal::JournalEntry,
        vitalog_core::journal::AddJournalRequest,
        vitalog_core::journal::UpdateJournalRequest,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalog_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let auth = state::AuthConfig::from_env().expect("auth configuration");
    let app_state = state::AppState { db: pool, auth };

    // CORS
    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::users::router())
        .merge(routes::goals::router())
        .merge(routes::policies::router())
        .merge(routes::concerns::router())
        .merge(routes::activities::router())
        .merge(routes::measurements::router())
        .merge(routes::journals::router())
        .merge(routes::mcp_http::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Vitalog API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
