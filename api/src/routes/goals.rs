use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use vitalog_core::error::ApiError;
use vitalog_core::goal::{
    CreateGoalRequest, DEFAULT_PRIORITY, GoalStatus, HealthGoal, UpdateGoalRequest,
};
use vitalog_core::validate;

use crate::auth::AuthenticatedUser;
use crate::db::with_backoff;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/goals", get(list_goals).post(create_goal))
        .route("/v1/goals/{goal_id}", patch(update_goal).delete(delete_goal))
}

#[derive(sqlx::FromRow)]
struct GoalRow {
    goal_id: Uuid,
    user_id: Uuid,
    goal_type: String,
    title: String,
    description: String,
    target_value: Option<f64>,
    target_date: Option<NaiveDate>,
    priority: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GoalRow {
    fn into_goal(self) -> Result<HealthGoal, AppError> {
        Ok(HealthGoal {
            goal_id: self.goal_id,
            user_id: self.user_id,
            goal_type: self.goal_type.parse().map_err(AppError::Internal)?,
            title: self.title,
            description: self.description,
            target_value: self.target_value,
            target_date: self.target_date,
            priority: self.priority,
            status: self.status.parse().map_err(AppError::Internal)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Create a health goal
#[utoipa::path(
    post,
    path = "/v1/goals",
    request_body = CreateGoalRequest,
    responses(
        (status = 201, description = "Goal created", body = HealthGoal),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "goals"
)]
pub async fn create_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<CreateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_not_blank("title", &req.title)?;
    let priority = req.priority.unwrap_or(DEFAULT_PRIORITY);
    validate::validate_rating("priority", priority)?;

    let goal_id = Uuid::now_v7();
    let status = req.status.unwrap_or(GoalStatus::Active);
    let description = req.description.unwrap_or_default();

    let row = with_backoff("create_goal", || {
        sqlx::query_as::<_, GoalRow>(
            "INSERT INTO health_goals \
             (goal_id, user_id, goal_type, title, description, target_value, target_date, \
              priority, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING goal_id, user_id, goal_type, title, description, target_value, \
                       target_date, priority, status, created_at, updated_at",
        )
        .bind(goal_id)
        .bind(user.user_id)
        .bind(req.goal_type.as_str())
        .bind(&req.title)
        .bind(&description)
        .bind(req.target_value)
        .bind(req.target_date)
        .bind(priority)
        .bind(status.as_str())
        .fetch_one(&state.db)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(row.into_goal()?)))
}

/// Partially update a goal
#[utoipa::path(
    patch,
    path = "/v1/goals/{goal_id}",
    request_body = UpdateGoalRequest,
    params(("goal_id" = Uuid, Path, description = "Goal to update")),
    responses(
        (status = 200, description = "Goal updated", body = HealthGoal),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Goal not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "goals"
)]
pub async fn update_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(goal_id): Path<Uuid>,
    AppJson(req): AppJson<UpdateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one field must be provided".to_string(),
            field: None,
            received: None,
            docs_hint: Some(
                "Updatable fields: goalType, title, description, targetValue, targetDate, priority, status."
                    .to_string(),
            ),
        });
    }
    if let Some(title) = &req.title {
        validate::validate_not_blank("title", title)?;
    }
    if let Some(priority) = req.priority {
        validate::validate_rating("priority", priority)?;
    }

    let row = with_backoff("update_goal", || {
        sqlx::query_as::<_, GoalRow>(
            "UPDATE health_goals SET \
                 goal_type = COALESCE($3, goal_type), \
                 title = COALESCE($4, title), \
                 description = COALESCE($5, description), \
                 target_value = COALESCE($6, target_value), \
                 target_date = COALESCE($7, target_date), \
                 priority = COALESCE($8, priority), \
                 status = COALESCE($9, status), \
                 updated_at = NOW() \
             WHERE user_id = $1 AND goal_id = $2 \
             RETURNING goal_id, user_id, goal_type, title, description, target_value, \
                       target_date, priority, status, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(goal_id)
        .bind(req.goal_type.map(|t| t.as_str()))
        .bind(req.title.as_deref())
        .bind(req.description.as_deref())
        .bind(req.target_value)
        .bind(req.target_date)
        .bind(req.priority)
        .bind(req.status.map(|s| s.as_str()))
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "goal",
        id: goal_id.to_string(),
    })?;

    Ok(Json(row.into_goal()?))
}

/// Delete a goal
#[utoipa::path(
    delete,
    path = "/v1/goals/{goal_id}",
    params(("goal_id" = Uuid, Path, description = "Goal to delete")),
    responses(
        (status = 204, description = "Goal deleted"),
        (status = 404, description = "Goal not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "goals"
)]
pub async fn delete_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(goal_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = with_backoff("delete_goal", || {
        sqlx::query("DELETE FROM health_goals WHERE user_id = $1 AND goal_id = $2")
            .bind(user.user_id)
            .bind(goal_id)
            .execute(&state.db)
    })
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: "goal",
            id: goal_id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

/// List the caller's goals, newest first
#[utoipa::path(
    get,
    path = "/v1/goals",
    responses(
        (status = 200, description = "All goals for the caller", body = Vec<HealthGoal>)
    ),
    security(("bearer_auth" = [])),
    tag = "goals"
)]
pub async fn list_goals(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let rows = with_backoff("list_goals", || {
        sqlx::query_as::<_, GoalRow>(
            "SELECT goal_id, user_id, goal_type, title, description, target_value, \
                    target_date, priority, status, created_at, updated_at \
             FROM health_goals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user.user_id)
        .fetch_all(&state.db)
    })
    .await?;

    let goals: Vec<HealthGoal> = rows
        .into_iter()
        .map(GoalRow::into_goal)
        .collect::<Result<_, _>>()?;

    Ok(Json(goals))
}
