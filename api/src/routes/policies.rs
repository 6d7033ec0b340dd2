use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use vitalog_core::error::ApiError;
use vitalog_core::policy::{CreatePolicyRequest, HealthPolicy, UpdatePolicyRequest};
use vitalog_core::validate;

use crate::auth::AuthenticatedUser;
use crate::db::with_backoff;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/policies", get(list_policies).post(create_policy))
        .route(
            "/v1/policies/{policy_id}",
            patch(update_policy).delete(delete_policy),
        )
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    policy_id: Uuid,
    user_id: Uuid,
    policy_type: String,
    title: String,
    description: String,
    rules: serde_json::Value,
    is_active: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PolicyRow {
    fn into_policy(self) -> Result<HealthPolicy, AppError> {
        Ok(HealthPolicy {
            policy_id: self.policy_id,
            user_id: self.user_id,
            policy_type: self.policy_type.parse().map_err(AppError::Internal)?,
            title: self.title,
            description: self.description,
            rules: self.rules,
            is_active: self.is_active,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn validate_policy_window(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            return Err(AppError::Validation {
                message: format!("endDate {end} is before startDate {start}"),
                field: Some("endDate".to_string()),
                received: Some(serde_json::Value::String(end.to_string())),
                docs_hint: None,
            });
        }
    }
    Ok(())
}

/// Create a health policy
#[utoipa::path(
    post,
    path = "/v1/policies",
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "Policy created", body = HealthPolicy),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn create_policy(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<CreatePolicyRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_not_blank("title", &req.title)?;
    validate_policy_window(req.start_date, req.end_date)?;

    let policy_id = Uuid::now_v7();
    let description = req.description.unwrap_or_default();
    let rules = req.rules.unwrap_or_else(|| serde_json::json!({}));
    let is_active = req.is_active.unwrap_or(true);

    let row = with_backoff("create_policy", || {
        sqlx::query_as::<_, PolicyRow>(
            "INSERT INTO health_policies \
             (policy_id, user_id, policy_type, title, description, rules, is_active, \
              start_date, end_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING policy_id, user_id, policy_type, title, description, rules, \
                       is_active, start_date, end_date, created_at, updated_at",
        )
        .bind(policy_id)
        .bind(user.user_id)
        .bind(req.policy_type.as_str())
        .bind(&req.title)
        .bind(&description)
        .bind(&rules)
        .bind(is_active)
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_one(&state.db)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(row.into_policy()?)))
}

/// Partially update a policy
#[utoipa::path(
    patch,
    path = "/v1/policies/{policy_id}",
    request_body = UpdatePolicyRequest,
    params(("policy_id" = Uuid, Path, description = "Policy to update")),
    responses(
        (status = 200, description = "Policy updated", body = HealthPolicy),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Policy not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn update_policy(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(policy_id): Path<Uuid>,
    AppJson(req): AppJson<UpdatePolicyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one field must be provided".to_string(),
            field: None,
            received: None,
            docs_hint: Some(
                "Updatable fields: policyType, title, description, rules, isActive, startDate, endDate."
                    .to_string(),
            ),
        });
    }
    if let Some(title) = &req.title {
        validate::validate_not_blank("title", title)?;
    }
    validate_policy_window(req.start_date, req.end_date)?;

    let row = with_backoff("update_policy", || {
        sqlx::query_as::<_, PolicyRow>(
            "UPDATE health_policies SET \
                 policy_type = COALESCE($3, policy_type), \
                 title = COALESCE($4, title), \
                 description = COALESCE($5, description), \
                 rules = COALESCE($6, rules), \
                 is_active = COALESCE($7, is_active), \
                 start_date = COALESCE($8, start_date), \
                 end_date = COALESCE($9, end_date), \
                 updated_at = NOW() \
             WHERE user_id = $1 AND policy_id = $2 \
             RETURNING policy_id, user_id, policy_type, title, description, rules, \
                       is_active, start_date, end_date, created_at, updated_at",
        )
        .bind(user.user_id)
        .bind(policy_id)
        .bind(req.policy_type.map(|t| t.as_str()))
        .bind(req.title.as_deref())
        .bind(req.description.as_deref())
        .bind(req.rules.as_ref())
        .bind(req.is_active)
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "policy",
        id: policy_id.to_string(),
    })?;

    Ok(Json(row.into_policy()?))
}

/// Delete a policy
#[utoipa::path(
    delete,
    path = "/v1/policies/{policy_id}",
    params(("policy_id" = Uuid, Path, description = "Policy to delete")),
    responses(
        (status = 204, description = "Policy deleted"),
        (status = 404, description = "Policy not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn delete_policy(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(policy_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = with_backoff("delete_policy", || {
        sqlx::query("DELETE FROM health_policies WHERE user_id = $1 AND policy_id = $2")
            .bind(user.user_id)
            .bind(policy_id)
            .execute(&state.db)
    })
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: "policy",
            id: policy_id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

/// List the caller's policies, newest first
#[utoipa::path(
    get,
    path = "/v1/policies",
    responses(
        (status = 200, description = "All policies for the caller", body = Vec<HealthPolicy>)
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn list_policies(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let rows = with_backoff("list_policies", || {
        sqlx::query_as::<_, PolicyRow>(
            "SELECT policy_id, user_id, policy_type, title, description, rules, \
                    is_active, start_date, end_date, created_at, updated_at \
             FROM health_policies WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user.user_id)
        .fetch_all(&state.db)
    })
    .await?;

    let policies: Vec<HealthPolicy> = rows
        .into_iter()
        .map(PolicyRow::into_policy)
        .collect::<Result<_, _>>()?;

    Ok(Json(policies))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_window_must_be_ordered() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1);
        let end = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert!(validate_policy_window(start, end).is_ok());
        assert!(validate_policy_window(end, start).is_err());
        assert!(validate_policy_window(start, None).is_ok());
        assert!(validate_policy_window(None, end).is_ok());
    }
}
