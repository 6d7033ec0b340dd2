use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use vitalog_core::error::ApiError;
use vitalog_core::journal::{
    AddJournalRequest, JournalEntry, UpdateJournalRequest, append_content, validate_content,
    validate_tags,
};
use vitalog_core::validate;

use crate::auth::AuthenticatedUser;
use crate::db::with_backoff;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/journals", get(list_journals_in_range).post(add_journal))
        .route(
            "/v1/journals/{date}",
            put(update_journal).delete(delete_journal).get(get_journal),
        )
}

#[derive(sqlx::FromRow)]
struct JournalRow {
    user_id: Uuid,
    date: NaiveDate,
    content: String,
    mood_score: Option<i32>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JournalRow {
    fn into_entry(self) -> JournalEntry {
        JournalEntry {
            user_id: self.user_id,
            date: self.date,
            content: self.content,
            mood_score: self.mood_score,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn fetch_entry(
    state: &AppState,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<Option<JournalRow>, AppError> {
    let row = with_backoff("get_journal", || {
        sqlx::query_as::<_, JournalRow>(
            "SELECT user_id, date, content, mood_score, tags, created_at, updated_at \
             FROM journal_entries WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&state.db)
    })
    .await?;
    Ok(row)
}

/// Write a journal entry for a date
///
/// Creates the entry, or appends to an existing one: new content joins the
/// stored content with a blank line, `createdAt` stays put, and moodScore /
/// tags change only when supplied. The length cap applies to the joined text.
/// Omitting `date` writes to the current date.
#[utoipa::path(
    post,
    path = "/v1/journals",
    request_body = AddJournalRequest,
    responses(
        (status = 201, description = "Entry created", body = JournalEntry),
        (status = 200, description = "Entry appended", body = JournalEntry),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "journals"
)]
pub async fn add_journal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<AddJournalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
    validate::validate_date_not_future("date", date)?;
    validate_content(&req.content)?;
    if let Some(mood_score) = req.mood_score {
        validate::validate_rating("moodScore", mood_score)?;
    }
    if let Some(tags) = &req.tags {
        validate_tags(tags)?;
    }

    let existing = fetch_entry(&state, user.user_id, date).await?;

    let Some(existing) = existing else {
        let tags = req.tags.unwrap_or_default();
        let row = with_backoff("create_journal", || {
            sqlx::query_as::<_, JournalRow>(
                "INSERT INTO journal_entries \
                 (user_id, date, content, mood_score, tags, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
                 RETURNING user_id, date, content, mood_score, tags, created_at, updated_at",
            )
            .bind(user.user_id)
            .bind(date)
            .bind(&req.content)
            .bind(req.mood_score)
            .bind(&tags)
            .fetch_one(&state.db)
        })
        .await?;
        return Ok((StatusCode::CREATED, Json(row.into_entry())));
    };

    let content = append_content(&existing.content, &req.content);
    validate_content(&content)?;
    let mood_score = req.mood_score.or(existing.mood_score);
    let tags = req.tags.unwrap_or(existing.tags);

    let row = with_backoff("append_journal", || {
        sqlx::query_as::<_, JournalRow>(
            "UPDATE journal_entries SET \
                 content = $3, mood_score = $4, tags = $5, updated_at = NOW() \
             WHERE user_id = $1 AND date = $2 \
             RETURNING user_id, date, content, mood_score, tags, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(date)
        .bind(&content)
        .bind(mood_score)
        .bind(&tags)
        .fetch_one(&state.db)
    })
    .await?;

    Ok((StatusCode::OK, Json(row.into_entry())))
}

/// Replace fields of a journal entry
///
/// Supplied fields are replaced outright — an explicit empty tags array
/// clears the stored tags.
#[utoipa::path(
    put,
    path = "/v1/journals/{date}",
    request_body = UpdateJournalRequest,
    params(("date" = NaiveDate, Path, description = "Entry date (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "Entry updated", body = JournalEntry),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Entry not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "journals"
)]
pub async fn update_journal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(date): Path<NaiveDate>,
    AppJson(req): AppJson<UpdateJournalRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one field must be provided".to_string(),
            field: None,
            received: None,
            docs_hint: Some("Updatable fields: content, moodScore, tags.".to_string()),
        });
    }
    if let Some(content) = &req.content {
        validate_content(content)?;
    }
    if let Some(mood_score) = req.mood_score {
        validate::validate_rating("moodScore", mood_score)?;
    }
    if let Some(tags) = &req.tags {
        validate_tags(tags)?;
    }

    let row = with_backoff("update_journal", || {
        sqlx::query_as::<_, JournalRow>(
            "UPDATE journal_entries SET \
                 content = COALESCE($3, content), \
                 mood_score = COALESCE($4, mood_score), \
                 tags = COALESCE($5, tags), \
                 updated_at = NOW() \
             WHERE user_id = $1 AND date = $2 \
             RETURNING user_id, date, content, mood_score, tags, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(date)
        .bind(req.content.as_deref())
        .bind(req.mood_score)
        .bind(req.tags.as_ref())
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "journal entry",
        id: date.to_string(),
    })?;

    Ok(Json(row.into_entry()))
}

/// Delete a journal entry
#[utoipa::path(
    delete,
    path = "/v1/journals/{date}",
    params(("date" = NaiveDate, Path, description = "Entry date (YYYY-MM-DD)")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Entry not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "journals"
)]
pub async fn delete_journal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, AppError> {
    let result = with_backoff("delete_journal", || {
        sqlx::query("DELETE FROM journal_entries WHERE user_id = $1 AND date = $2")
            .bind(user.user_id)
            .bind(date)
            .execute(&state.db)
    })
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: "journal entry",
            id: date.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a journal entry
#[utoipa::path(
    get,
    path = "/v1/journals/{date}",
    params(("date" = NaiveDate, Path, description = "Entry date (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "The entry", body = JournalEntry),
        (status = 404, description = "Entry not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "journals"
)]
pub async fn get_journal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_entry(&state, user.user_id, date)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource: "journal entry",
            id: date.to_string(),
        })?;
    Ok(Json(row.into_entry()))
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct JournalRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Journal entries in an inclusive date range
///
/// Ascending by date; dates without an entry are omitted. The range may span
/// at most a year.
#[utoipa::path(
    get,
    path = "/v1/journals",
    params(JournalRangeQuery),
    responses(
        (status = 200, description = "Entries in the range", body = Vec<JournalEntry>),
        (status = 400, description = "Invalid range", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "journals"
)]
pub async fn list_journals_in_range(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(range): Query<JournalRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_date_range(range.start_date, range.end_date)?;

    let rows = with_backoff("list_journals_in_range", || {
        sqlx::query_as::<_, JournalRow>(
            "SELECT user_id, date, content, mood_score, tags, created_at, updated_at \
             FROM journal_entries \
             WHERE user_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date ASC",
        )
        .bind(user.user_id)
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_all(&state.db)
    })
    .await?;

    let entries: Vec<JournalEntry> = rows.into_iter().map(JournalRow::into_entry).collect();

    Ok(Json(entries))
}
