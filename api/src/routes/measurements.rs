use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use vitalog_core::error::ApiError;
use vitalog_core::measurement::{
    AddMeasurementRequest, BodyMeasurement, DerivedSummaries, FieldSnapshot, MeasurementSummary,
    UpdateMeasurementRequest, recompute_summaries,
};
use vitalog_core::validate;

use crate::auth::AuthenticatedUser;
use crate::db::with_backoff;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/measurements", get(list_history).post(add_measurement))
        .route("/v1/measurements/latest", get(get_latest))
        .route("/v1/measurements/oldest", get(get_oldest))
        .route(
            "/v1/measurements/{measured_at}",
            patch(update_measurement).delete(delete_measurement),
        )
}

#[derive(sqlx::FromRow)]
struct MeasurementRow {
    user_id: Uuid,
    measured_at: DateTime<Utc>,
    weight: Option<f64>,
    height: Option<f64>,
    body_fat_percentage: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MeasurementRow {
    fn into_measurement(self) -> BodyMeasurement {
        BodyMeasurement {
            user_id: self.user_id,
            measured_at: self.measured_at,
            weight: self.weight,
            height: self.height,
            body_fat_percentage: self.body_fat_percentage,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    weight: Option<f64>,
    weight_recorded_at: Option<DateTime<Utc>>,
    height: Option<f64>,
    height_recorded_at: Option<DateTime<Utc>>,
    body_fat_percentage: Option<f64>,
    body_fat_percentage_recorded_at: Option<DateTime<Utc>>,
}

impl SummaryRow {
    fn into_summary(self) -> MeasurementSummary {
        fn snapshot(value: Option<f64>, at: Option<DateTime<Utc>>) -> Option<FieldSnapshot> {
            Some(FieldSnapshot {
                value: value?,
                recorded_at: at?,
            })
        }
        MeasurementSummary {
            weight: snapshot(self.weight, self.weight_recorded_at),
            height: snapshot(self.height, self.height_recorded_at),
            body_fat_percentage: snapshot(
                self.body_fat_percentage,
                self.body_fat_percentage_recorded_at,
            ),
        }
    }
}

fn validate_fields(
    weight: Option<f64>,
    height: Option<f64>,
    body_fat_percentage: Option<f64>,
) -> Result<(), AppError> {
    if let Some(weight) = weight {
        validate::validate_weight(weight)?;
    }
    if let Some(height) = height {
        validate::validate_height(height)?;
    }
    if let Some(body_fat) = body_fat_percentage {
        validate::validate_body_fat_percentage(body_fat)?;
    }
    Ok(())
}

async fn fetch_all_records(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<BodyMeasurement>, AppError> {
    let rows = with_backoff("fetch_all_measurements", || {
        sqlx::query_as::<_, MeasurementRow>(
            "SELECT user_id, measured_at, weight, height, body_fat_percentage, \
                    created_at, updated_at \
             FROM body_measurements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&state.db)
    })
    .await?;
    Ok(rows.into_iter().map(MeasurementRow::into_measurement).collect())
}

/// Recompute both derived singletons from scratch and rewrite them. Runs
/// after every mutation, outside any transaction — a crash between the
/// record write and this rewrite leaves stale singletons that the next
/// mutation heals.
async fn refresh_summaries(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let records = fetch_all_records(state, user_id).await?;
    let derived = recompute_summaries(&records);

    with_backoff("clear_measurement_summaries", || {
        sqlx::query("DELETE FROM body_measurement_summaries WHERE user_id = $1")
            .bind(user_id)
            .execute(&state.db)
    })
    .await?;

    let Some(DerivedSummaries { latest, oldest }) = derived else {
        return Ok(());
    };

    for (kind, summary) in [("latest", &latest), ("oldest", &oldest)] {
        with_backoff("write_measurement_summary", || {
            sqlx::query(
                "INSERT INTO body_measurement_summaries \
                 (user_id, kind, weight, weight_recorded_at, height, height_recorded_at, \
                  body_fat_percentage, body_fat_percentage_recorded_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())",
            )
            .bind(user_id)
            .bind(kind)
            .bind(summary.weight.map(|s| s.value))
            .bind(summary.weight.map(|s| s.recorded_at))
            .bind(summary.height.map(|s| s.value))
            .bind(summary.height.map(|s| s.recorded_at))
            .bind(summary.body_fat_percentage.map(|s| s.value))
            .bind(summary.body_fat_percentage.map(|s| s.recorded_at))
            .execute(&state.db)
        })
        .await?;
    }

    Ok(())
}

async fn get_summary(
    state: &AppState,
    user_id: Uuid,
    kind: &'static str,
) -> Result<MeasurementSummary, AppError> {
    let row = with_backoff("get_measurement_summary", || {
        sqlx::query_as::<_, SummaryRow>(
            "SELECT weight, weight_recorded_at, height, height_recorded_at, \
                    body_fat_percentage, body_fat_percentage_recorded_at \
             FROM body_measurement_summaries WHERE user_id = $1 AND kind = $2",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or(AppError::NotFound {
        resource: "measurement summary",
        id: kind.to_string(),
    })?;

    Ok(row.into_summary())
}

/// Record a body measurement
///
/// At least one of weight, height, bodyFatPercentage is required.
/// `measurementTime` defaults to now; recording twice at the same time
/// overwrites the earlier record's fields.
#[utoipa::path(
    post,
    path = "/v1/measurements",
    request_body = AddMeasurementRequest,
    responses(
        (status = 201, description = "Measurement stored", body = BodyMeasurement),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "measurements"
)]
pub async fn add_measurement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<AddMeasurementRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !req.has_any_field() {
        return Err(AppError::Validation {
            message: "At least one of weight, height, bodyFatPercentage is required".to_string(),
            field: None,
            received: None,
            docs_hint: None,
        });
    }
    validate_fields(req.weight, req.height, req.body_fat_percentage)?;
    let measured_at = req.measurement_time.unwrap_or_else(Utc::now);
    validate::validate_timestamp_not_future("measurementTime", measured_at)?;

    let row = with_backoff("add_measurement", || {
        sqlx::query_as::<_, MeasurementRow>(
            "INSERT INTO body_measurements \
             (user_id, measured_at, weight, height, body_fat_percentage, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             ON CONFLICT (user_id, measured_at) DO UPDATE SET \
                 weight = EXCLUDED.weight, \
                 height = EXCLUDED.height, \
                 body_fat_percentage = EXCLUDED.body_fat_percentage, \
                 updated_at = NOW() \
             RETURNING user_id, measured_at, weight, height, body_fat_percentage, \
                       created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(measured_at)
        .bind(req.weight)
        .bind(req.height)
        .bind(req.body_fat_percentage)
        .fetch_one(&state.db)
    })
    .await?;

    refresh_summaries(&state, user.user_id).await?;

    Ok((StatusCode::CREATED, Json(row.into_measurement())))
}

/// Update the measurement at a point in time
#[utoipa::path(
    patch,
    path = "/v1/measurements/{measured_at}",
    request_body = UpdateMeasurementRequest,
    params(("measured_at" = DateTime<Utc>, Path, description = "Measurement time (RFC 3339)")),
    responses(
        (status = 200, description = "Measurement updated", body = BodyMeasurement),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Measurement not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "measurements"
)]
pub async fn update_measurement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(measured_at): Path<DateTime<Utc>>,
    AppJson(req): AppJson<UpdateMeasurementRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one of weight, height, bodyFatPercentage is required".to_string(),
            field: None,
            received: None,
            docs_hint: None,
        });
    }
    validate_fields(req.weight, req.height, req.body_fat_percentage)?;

    let row = with_backoff("update_measurement", || {
        sqlx::query_as::<_, MeasurementRow>(
            "UPDATE body_measurements SET \
                 weight = COALESCE($3, weight), \
                 height = COALESCE($4, height), \
                 body_fat_percentage = COALESCE($5, body_fat_percentage), \
                 updated_at = NOW() \
             WHERE user_id = $1 AND measured_at = $2 \
             RETURNING user_id, measured_at, weight, height, body_fat_percentage, \
                       created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(measured_at)
        .bind(req.weight)
        .bind(req.height)
        .bind(req.body_fat_percentage)
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "measurement",
        id: measured_at.to_rfc3339(),
    })?;

    refresh_summaries(&state, user.user_id).await?;

    Ok(Json(row.into_measurement()))
}

/// Delete the measurement at a point in time
///
/// When the last record goes, the derived latest/oldest singletons go with it.
#[utoipa::path(
    delete,
    path = "/v1/measurements/{measured_at}",
    params(("measured_at" = DateTime<Utc>, Path, description = "Measurement time (RFC 3339)")),
    responses(
        (status = 204, description = "Measurement deleted"),
        (status = 404, description = "Measurement not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "measurements"
)]
pub async fn delete_measurement(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(measured_at): Path<DateTime<Utc>>,
) -> Result<impl IntoResponse, AppError> {
    let result = with_backoff("delete_measurement", || {
        sqlx::query("DELETE FROM body_measurements WHERE user_id = $1 AND measured_at = $2")
            .bind(user.user_id)
            .bind(measured_at)
            .execute(&state.db)
    })
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: "measurement",
            id: measured_at.to_rfc3339(),
        });
    }

    refresh_summaries(&state, user.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Each field's newest observation
#[utoipa::path(
    get,
    path = "/v1/measurements/latest",
    responses(
        (status = 200, description = "Per-field latest values", body = MeasurementSummary),
        (status = 404, description = "No measurements recorded", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "measurements"
)]
pub async fn get_latest(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = get_summary(&state, user.user_id, "latest").await?;
    Ok(Json(summary))
}

/// Each field's first observation
#[utoipa::path(
    get,
    path = "/v1/measurements/oldest",
    responses(
        (status = 200, description = "Per-field oldest values", body = MeasurementSummary),
        (status = 404, description = "No measurements recorded", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "measurements"
)]
pub async fn get_oldest(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = get_summary(&state, user.user_id, "oldest").await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HistoryQuery {
    /// Inclusive lower bound on measurement time
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on measurement time
    pub end: Option<DateTime<Utc>>,
    /// Maximum records returned (default 50, max 1000)
    pub limit: Option<i64>,
}

/// Measurement history, newest first
#[utoipa::path(
    get,
    path = "/v1/measurements",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Measurements in the window", body = Vec<BodyMeasurement>),
        (status = 400, description = "Invalid query", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "measurements"
)]
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    if let (Some(start), Some(end)) = (query.start, query.end) {
        if end < start {
            return Err(AppError::Validation {
                message: format!("end {end} is before start {start}"),
                field: Some("end".to_string()),
                received: None,
                docs_hint: None,
            });
        }
    }
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(AppError::Validation {
            message: format!("limit must be between 1 and {MAX_HISTORY_LIMIT}, got {limit}"),
            field: Some("limit".to_string()),
            received: Some(serde_json::json!(limit)),
            docs_hint: None,
        });
    }

    let rows = with_backoff("list_measurement_history", || {
        sqlx::query_as::<_, MeasurementRow>(
            "SELECT user_id, measured_at, weight, height, body_fat_percentage, \
                    created_at, updated_at \
             FROM body_measurements \
             WHERE user_id = $1 \
               AND ($2::timestamptz IS NULL OR measured_at >= $2) \
               AND ($3::timestamptz IS NULL OR measured_at <= $3) \
             ORDER BY measured_at DESC \
             LIMIT $4",
        )
        .bind(user.user_id)
        .bind(query.start)
        .bind(query.end)
        .bind(limit)
        .fetch_all(&state.db)
    })
    .await?;

    let measurements: Vec<BodyMeasurement> = rows
        .into_iter()
        .map(MeasurementRow::into_measurement)
        .collect();

    Ok(Json(measurements))
}
