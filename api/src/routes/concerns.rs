use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use vitalog_core::concern::{
    ConcernCategory, ConcernStatus, CreateConcernRequest, DEFAULT_SEVERITY, HealthConcern,
    UpdateConcernRequest, validate_categories,
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
        .route("/v1/concerns", get(list_concerns).post(create_concern))
        .route(
            "/v1/concerns/{concern_id}",
            patch(update_concern).delete(delete_concern),
        )
}

#[derive(sqlx::FromRow)]
struct ConcernRow {
    concern_id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    category: Vec<String>,
    severity: i32,
    status: String,
    triggers: String,
    history: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConcernRow {
    fn into_concern(self) -> Result<HealthConcern, AppError> {
        let category = self
            .category
            .iter()
            .map(|c| c.parse())
            .collect::<Result<Vec<ConcernCategory>, _>>()
            .map_err(AppError::Internal)?;
        Ok(HealthConcern {
            concern_id: self.concern_id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            category,
            severity: self.severity,
            status: self.status.parse().map_err(AppError::Internal)?,
            triggers: self.triggers,
            history: self.history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn category_strings(categories: &[ConcernCategory]) -> Vec<String> {
    categories.iter().map(|c| c.as_str().to_string()).collect()
}

/// Create a health concern
#[utoipa::path(
    post,
    path = "/v1/concerns",
    request_body = CreateConcernRequest,
    responses(
        (status = 201, description = "Concern created", body = HealthConcern),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "concerns"
)]
pub async fn create_concern(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<CreateConcernRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_not_blank("title", &req.title)?;
    validate_categories(&req.category)?;
    let severity = req.severity.unwrap_or(DEFAULT_SEVERITY);
    validate::validate_rating("severity", severity)?;

    let concern_id = Uuid::now_v7();
    let status = req.status.unwrap_or(ConcernStatus::Active);
    let description = req.description.unwrap_or_default();
    let triggers = req.triggers.unwrap_or_default();
    let history = req.history.unwrap_or_default();
    let category = category_strings(&req.category);

    let row = with_backoff("create_concern", || {
        sqlx::query_as::<_, ConcernRow>(
            "INSERT INTO health_concerns \
             (concern_id, user_id, title, description, category, severity, status, \
              triggers, history, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING concern_id, user_id, title, description, category, severity, \
                       status, triggers, history, created_at, updated_at",
        )
        .bind(concern_id)
        .bind(user.user_id)
        .bind(&req.title)
        .bind(&description)
        .bind(&category)
        .bind(severity)
        .bind(status.as_str())
        .bind(&triggers)
        .bind(&history)
        .fetch_one(&state.db)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(row.into_concern()?)))
}

/// Partially update a concern
#[utoipa::path(
    patch,
    path = "/v1/concerns/{concern_id}",
    request_body = UpdateConcernRequest,
    params(("concern_id" = Uuid, Path, description = "Concern to update")),
    responses(
        (status = 200, description = "Concern updated", body = HealthConcern),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Concern not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "concerns"
)]
pub async fn update_concern(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(concern_id): Path<Uuid>,
    AppJson(req): AppJson<UpdateConcernRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one field must be provided".to_string(),
            field: None,
            received: None,
            docs_hint: Some(
                "Updatable fields: title, description, category, severity, status, triggers, history."
                    .to_string(),
            ),
        });
    }
    if let Some(title) = &req.title {
        validate::validate_not_blank("title", title)?;
    }
    if let Some(category) = &req.category {
        validate_categories(category)?;
    }
    if let Some(severity) = req.severity {
        validate::validate_rating("severity", severity)?;
    }

    let category = req.category.as_deref().map(category_strings);

    let row = with_backoff("update_concern", || {
        sqlx::query_as::<_, ConcernRow>(
            "UPDATE health_concerns SET \
                 title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 category = COALESCE($5, category), \
                 severity = COALESCE($6, severity), \
                 status = COALESCE($7, status), \
                 triggers = COALESCE($8, triggers), \
                 history = COALESCE($9, history), \
                 updated_at = NOW() \
             WHERE user_id = $1 AND concern_id = $2 \
             RETURNING concern_id, user_id, title, description, category, severity, \
                       status, triggers, history, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(concern_id)
        .bind(req.title.as_deref())
        .bind(req.description.as_deref())
        .bind(category.as_ref())
        .bind(req.severity)
        .bind(req.status.map(|s| s.as_str()))
        .bind(req.triggers.as_deref())
        .bind(req.history.as_deref())
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "concern",
        id: concern_id.to_string(),
    })?;

    Ok(Json(row.into_concern()?))
}

/// Delete a concern
#[utoipa::path(
    delete,
    path = "/v1/concerns/{concern_id}",
    params(("concern_id" = Uuid, Path, description = "Concern to delete")),
    responses(
        (status = 204, description = "Concern deleted"),
        (status = 404, description = "Concern not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "concerns"
)]
pub async fn delete_concern(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(concern_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = with_backoff("delete_concern", || {
        sqlx::query("DELETE FROM health_concerns WHERE user_id = $1 AND concern_id = $2")
            .bind(user.user_id)
            .bind(concern_id)
            .execute(&state.db)
    })
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: "concern",
            id: concern_id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "snake_case")]
pub struct ConcernFilter {
    /// Filter by status (ACTIVE, IMPROVED, RESOLVED)
    pub status: Option<String>,
    /// Filter by category membership (PHYSICAL, MENTAL)
    pub category: Option<String>,
}

/// List the caller's concerns, newest first, with optional filters
#[utoipa::path(
    get,
    path = "/v1/concerns",
    params(ConcernFilter),
    responses(
        (status = 200, description = "Matching concerns", body = Vec<HealthConcern>),
        (status = 400, description = "Invalid filter", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "concerns"
)]
pub async fn list_concerns(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(filter): Query<ConcernFilter>,
) -> Result<impl IntoResponse, AppError> {
    // Parse filters up front so typos surface as validation errors, not empty lists.
    let status = filter
        .status
        .as_deref()
        .map(|s| {
            s.parse::<ConcernStatus>().map_err(|_| AppError::Validation {
                message: format!("status filter must be one of ACTIVE, IMPROVED, RESOLVED, got '{s}'"),
                field: Some("status".to_string()),
                received: Some(serde_json::Value::String(s.to_string())),
                docs_hint: None,
            })
        })
        .transpose()?;
    let category = filter
        .category
        .as_deref()
        .map(|c| {
            c.parse::<ConcernCategory>().map_err(|_| AppError::Validation {
                message: format!("category filter must be PHYSICAL or MENTAL, got '{c}'"),
                field: Some("category".to_string()),
                received: Some(serde_json::Value::String(c.to_string())),
                docs_hint: None,
            })
        })
        .transpose()?;

    let rows = with_backoff("list_concerns", || {
        sqlx::query_as::<_, ConcernRow>(
            "SELECT concern_id, user_id, title, description, category, severity, \
                    status, triggers, history, created_at, updated_at \
             FROM health_concerns \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR $3 = ANY(category)) \
             ORDER BY created_at DESC",
        )
        .bind(user.user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&state.db)
    })
    .await?;

    let concerns: Vec<HealthConcern> = rows
        .into_iter()
        .map(ConcernRow::into_concern)
        .collect::<Result<_, _>>()?;

    Ok(Json(concerns))
}
