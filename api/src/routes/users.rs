use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::put;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use vitalog_core::error::ApiError;
use vitalog_core::user::{UpdateUserRequest, UpsertUserRequest, User};
use vitalog_core::validate;

use crate::auth::AuthenticatedUser;
use crate::db::with_backoff;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/users", put(upsert_user).patch(update_user).get(get_user))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    username: String,
    email: String,
    date_of_birth: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    last_login_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            user_id: self.user_id,
            username: self.username,
            email: self.email,
            date_of_birth: self.date_of_birth,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

/// Create or refresh the caller's profile
///
/// Upsert: the first call creates the profile, later calls keep `createdAt`
/// and refresh `lastLoginAt`.
#[utoipa::path(
    put,
    path = "/v1/users",
    request_body = UpsertUserRequest,
    responses(
        (status = 200, description = "Profile stored", body = User),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Not authenticated", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn upsert_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<UpsertUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate::validate_not_blank("username", &req.username)?;
    if let Some(date_of_birth) = req.date_of_birth {
        validate::validate_date_not_future("dateOfBirth", date_of_birth)?;
    }

    let email = req.email.unwrap_or_default();

    let row = with_backoff("upsert_user", || {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (user_id, username, email, date_of_birth, created_at, last_login_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                date_of_birth = COALESCE(EXCLUDED.date_of_birth, users.date_of_birth),
                last_login_at = NOW()
            RETURNING user_id, username, email, date_of_birth, created_at, last_login_at
            "#,
        )
        .bind(user.user_id)
        .bind(&req.username)
        .bind(&email)
        .bind(req.date_of_birth)
        .fetch_one(&state.db)
    })
    .await?;

    Ok(Json(row.into_user()))
}

/// Partially update the caller's profile
#[utoipa::path(
    patch,
    path = "/v1/users",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Profile not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation {
            message: "At least one field must be provided".to_string(),
            field: None,
            received: None,
            docs_hint: Some("Updatable fields: username, email, dateOfBirth.".to_string()),
        });
    }
    if let Some(username) = &req.username {
        validate::validate_not_blank("username", username)?;
    }
    if let Some(date_of_birth) = req.date_of_birth {
        validate::validate_date_not_future("dateOfBirth", date_of_birth)?;
    }

    let row = with_backoff("update_user", || {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                date_of_birth = COALESCE($4, date_of_birth)
            WHERE user_id = $1
            RETURNING user_id, username, email, date_of_birth, created_at, last_login_at
            "#,
        )
        .bind(user.user_id)
        .bind(req.username.as_deref())
        .bind(req.email.as_deref())
        .bind(req.date_of_birth)
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "user",
        id: user.user_id.to_string(),
    })?;

    Ok(Json(row.into_user()))
}

/// Fetch the caller's profile
#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "The profile", body = User),
        (status = 404, description = "Profile not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let row = with_backoff("get_user", || {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, username, email, date_of_birth, created_at, last_login_at \
             FROM users WHERE user_id = $1",
        )
        .bind(user.user_id)
        .fetch_optional(&state.db)
    })
    .await?
    .ok_or_else(|| AppError::NotFound {
        resource: "user",
        id: user.user_id.to_string(),
    })?;

    Ok(Json(row.into_user()))
}
