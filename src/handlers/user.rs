// src/handlers/user.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{CreateProfileRequest, UpdateProfileRequest, User},
};

/// Create a new profile.
pub async fn create_profile(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, created_at) VALUES (?1, ?2, ?3) RETURNING id",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Username or email already taken".to_string())
        }
        _ => {
            tracing::error!("Failed to create profile: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    let user = fetch_user(&pool, id).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a profile by ID.
pub async fn get_profile(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, id).await?;
    Ok(Json(user))
}

/// Account settings update: any subset of username, email and profile
/// picture. Absent fields are left unchanged.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let result = sqlx::query(
        r#"
        UPDATE users SET
            username = COALESCE(?1, username),
            email = COALESCE(?2, email),
            profile_pic = COALESCE(?3, profile_pic)
        WHERE id = ?4
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.profile_pic)
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Username or email already taken".to_string())
        }
        _ => {
            tracing::error!("Failed to update profile {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = id, "profile updated");

    let user = fetch_user(&pool, id).await?;
    Ok(Json(user))
}

async fn fetch_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, profile_pic, created_at FROM users WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))
}
