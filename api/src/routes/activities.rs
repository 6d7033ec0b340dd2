use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use vitalog_core::activity::{
    ActivityEntry, AddActivitiesRequest, DailyActivity, ReplaceActivitiesRequest,
    UpdateActivityRequest, patch_entry, remove_entry,
};
use vitalog_core::error::ApiError;
use vitalog_core::validate;

use crate::auth::AuthenticatedUser;
use crate::db::with_backoff;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/activities", get(list_activities_in_range))
        .route(
            "/v1/activities/{date}",
            post(add_activities).put(replace_activities).get(get_activities),
        )
        .route(
            "/v1/activities/{date}/{time}",
            patch(update_activity).delete(delete_activity),
        )
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    user_id: Uuid,
    date: NaiveDate,
    activities: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ActivityRow {
    fn into_daily(self) -> Result<DailyActivity, AppError> {
        let activities: Vec<ActivityEntry> = serde_json::from_value(self.activities)
            .map_err(|e| AppError::Internal(format!("corrupt activities column: {e}")))?;
        Ok(DailyActivity {
            user_id: self.user_id,
            date: self.date,
            activities,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

fn validate_entries(entries: &[ActivityEntry]) -> Result<(), AppError> {
    if entries.is_empty() {
        return Err(AppError::Validation {
            message: "activities must not be empty".to_string(),
            field: Some("activities".to_string()),
            received: None,
            docs_hint: Some("Provide at least one activity entry.".to_string()),
        });
    }
    for entry in entries {
        validate::validate_time_of_day("time", &entry.time)?;
    }
    Ok(())
}

fn entries_json(entries: &[ActivityEntry]) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(entries)
        .map_err(|e| AppError::Internal(format!("failed to serialize activities: {e}")))
}

async fn fetch_day(
    state: &AppState,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Option<ActivityRow>, AppError> {
    let row = with_backoff("get_activities", || {
        sqlx::query_as::<_, ActivityRow>(
            "SELECT user_id, date, activities, created_at, updated_at \
             FROM daily_activities WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&state.db)
    })
    .await?;
    Ok(row)
}

async fn write_day_entries(
    state: &AppState,
    user_id: Uuid,
    date: NaiveDate,
    entries: &[ActivityEntry],
) -> Result<ActivityRow, AppError> {
    let activities = entries_json(entries)?;
    let row = with_backoff("write_day_entries", || {
        sqlx::query_as::<_, ActivityRow>(
            "UPDATE daily_activities SET activities = $3, updated_at = NOW() \
             WHERE user_id = $1 AND date = $2 \
             RETURNING user_id, date, activities, created_at, updated_at",
        )
        .bind(user_id)
        .bind(date)
        .bind(&activities)
        .fetch_one(&state.db)
    })
    .await?;
    Ok(row)
}

/// Append activity entries to a day
///
/// Creates the day record when it does not exist yet.
#[utoipa::path(
    post,
    path = "/v1/activities/{date}",
    request_body = AddActivitiesRequest,
    params(("date" = NaiveDate, Path, description = "Day to append to (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "Day record after the append", body = DailyActivity),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "activities"
)]
pub async fn add_activities(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(date): Path<NaiveDate>,
    AppJson(req): AppJson<AddActivitiesRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_date_not_future("date", date)?;
    validate_entries(&req.activities)?;

    let activities = entries_json(&req.activities)?;
    let row = with_backoff("add_activities", || {
        sqlx::query_as::<_, ActivityRow>(
            "INSERT INTO daily_activities (user_id, date, activities, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                 activities = daily_activities.activities || EXCLUDED.activities, \
                 updated_at = NOW() \
             RETURNING user_id, date, activities, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(date)
        .bind(&activities)
        .fetch_one(&state.db)
    })
    .await?;

    Ok(Json(row.into_daily()?))
}

/// Replace a day's entry list wholesale
#[utoipa::path(
    put,
    path = "/v1/activities/{date}",
    request_body = ReplaceActivitiesRequest,
    params(("date" = NaiveDate, Path, description = "Day to replace (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "Day record after the replacement", body = DailyActivity),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "activities"
)]
pub async fn replace_activities(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(date): Path<NaiveDate>,
    AppJson(req): AppJson<ReplaceActivitiesRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_date_not_future("date", date)?;
    validate_entries(&req.activities)?;

    let activities = entries_json(&req.activities)?;
    let row = with_backoff("replace_activities", || {
        sqlx::query_as::<_, ActivityRow>(
            "INSERT INTO daily_activities (user_id, date, activities, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                 activities = EXCLUDED.activities, \
                 updated_at = NOW() \
             RETURNING user_id, date, activities, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(date)
        .bind(&activities)
        .fetch_one(&state.db)
    })
    .await?;

    Ok(Json(row.into_daily()?))
}

/// Patch the single entry addressed by (date, time)
#[utoipa::path(
    patch,
    path = "/v1/activities/{date}/{time}",
    request_body = UpdateActivityRequest,
    params(
        ("date" = NaiveDate, Path, description = "Day of the entry (YYYY-MM-DD)"),
        ("time" = String, Path, description = "Time of the entry (HH:MM)")
    ),
    responses(
        (status = 200, description = "Day record after the patch", body = DailyActivity),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Day or entry not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "activities"
)]
pub async fn update_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((date, time)): Path<(NaiveDate, String)>,
    AppJson(req): AppJson<UpdateActivityRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_time_of_day("time", &time)?;
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one field must be provided".to_string(),
            field: None,
            received: None,
            docs_hint: Some("Updatable fields: activityType, description, items.".to_string()),
        });
    }

    let row = fetch_day(&state, user.user_id, date)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: "daily activity",
            id: date.to_string(),
        })?;
    let mut day = row.into_daily()?;

    if !patch_entry(&mut day.activities, &time, &req) {
        return Err(AppError::NotFound {
            resource: "activity entry",
            id: format!("{date} {time}"),
        });
    }

    let row = write_day_entries(&state, user.user_id, date, &day.activities).await?;
    Ok(Json(row.into_daily()?))
}

/// Delete the single entry addressed by (date, time)
///
/// Removing the last entry deletes the whole day record.
#[utoipa::path(
    delete,
    path = "/v1/activities/{date}/{time}",
    params(
        ("date" = NaiveDate, Path, description = "Day of the entry (YYYY-MM-DD)"),
        ("time" = String, Path, description = "Time of the entry (HH:MM)")
    ),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Day or entry not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "activities"
)]
pub async fn delete_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((date, time)): Path<(NaiveDate, String)>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_time_of_day("time", &time)?;

    let row = fetch_day(&state, user.user_id, date)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: "daily activity",
            id: date.to_string(),
        })?;
    let mut day = row.into_daily()?;

    if !remove_entry(&mut day.activities, &time) {
        return Err(AppError::NotFound {
            resource: "activity entry",
            id: format!("{date} {time}"),
        });
    }

    if day.activities.is_empty() {
        with_backoff("delete_day", || {
            sqlx::query("DELETE FROM daily_activities WHERE user_id = $1 AND date = $2")
                .bind(user.user_id)
                .bind(date)
                .execute(&state.db)
        })
        .await?;
    } else {
        write_day_entries(&state, user.user_id, date, &day.activities).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch one day's record
///
/// A day that was never written reads as an empty entry list, not an error.
#[utoipa::path(
    get,
    path = "/v1/activities/{date}",
    params(("date" = NaiveDate, Path, description = "Day to fetch (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "The day's record, empty when never written", body = DailyActivity)
    ),
    security(("bearer_auth" = [])),
    tag = "activities"
)]
pub async fn get_activities(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, AppError> {
    let day = match fetch_day(&state, user.user_id, date).await? {
        Some(row) => row.into_daily()?,
        None => DailyActivity::empty(user.user_id, date),
    };
    Ok(Json(day))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ActivityRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Fetch day records in an inclusive date range
///
/// Ascending by date; days without a record are omitted. The range may span
/// at most a year.
#[utoipa::path(
    get,
    path = "/v1/activities",
    params(ActivityRangeQuery),
    responses(
        (status = 200, description = "Day records in the range", body = Vec<DailyActivity>),
        (status = 400, description = "Invalid range", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "activities"
)]
pub async fn list_activities_in_range(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(range): Query<ActivityRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_date_range(range.start_date, range.end_date)?;

    let rows = with_backoff("list_activities_in_range", || {
        sqlx::query_as::<_, ActivityRow>(
            "SELECT user_id, date, activities, created_at, updated_at \
             FROM daily_activities \
             WHERE user_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date ASC",
        )
        .bind(user.user_id)
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_all(&state.db)
    })
    .await?;

    let days: Vec<DailyActivity> = rows
        .into_iter()
        .map(ActivityRow::into_daily)
        .collect::<Result<_, _>>()?;

    Ok(Json(days))
}
