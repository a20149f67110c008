// src/handlers/post.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json as SqlJson;
use validator::Validate;

use crate::{
    error::AppError,
    models::post::{CreatePostRequest, Post, PostListParams, PostView, UpdatePostRequest},
    sanitize::{SanitizationPolicy, sanitize},
};

const POST_COLUMNS: &str =
    "id, title, author, description, photo_url, categories, created_at, updated_at, deleted_at";

/// Create a new post.
/// The description is stored exactly as submitted (RawContent); titles are
/// unique, and a duplicate maps to 409 so the editor can prompt for another.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let categories = SqlJson(payload.categories.unwrap_or_default());

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (title, author, description, photo_url, categories, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.author)
    .bind(&payload.description)
    .bind(&payload.photo_url)
    .bind(categories)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("A post with this title already exists".to_string())
        }
        _ => {
            tracing::error!("Failed to create post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    tracing::info!(post_id = id, author = %payload.author, "post created");

    let post = fetch_post(&pool, id).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// List posts (recent first) for the feed/preview surface.
/// Soft-deleted posts are filtered out; supports cursor-based pagination,
/// title search and author filtering.
///
/// Each item carries `description_html` rendered under the summary policy.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    // Default 20, max 100. The lower bound matters on sqlite: LIMIT -1
    // means "no limit" and would dump the whole table.
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let posts = sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM posts
        WHERE deleted_at IS NULL
          AND (?1 IS NULL OR created_at < ?1)
          AND (?2 IS NULL OR title LIKE '%' || ?2 || '%')
          AND (?3 IS NULL OR author = ?3)
        ORDER BY created_at DESC
        LIMIT ?4
        "#
    ))
    .bind(params.cursor)
    .bind(params.q)
    .bind(params.author)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let policy = SanitizationPolicy::summary();
    let views: Vec<PostView> = posts.into_iter().map(|p| render(p, &policy)).collect();

    Ok(Json(views))
}

/// Get a single post by ID, with `description_html` rendered under the
/// minimal policy for the full-post body surface.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = fetch_post(&pool, id).await?;
    let view = render(post, &SanitizationPolicy::minimal());
    Ok(Json(view))
}

/// Partially update a post. Returns the stored record (raw description), as
/// consumed by the edit flow.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let categories = payload.categories.map(SqlJson);

    let result = sqlx::query(
        r#"
        UPDATE posts SET
            title = COALESCE(?1, title),
            description = COALESCE(?2, description),
            photo_url = COALESCE(?3, photo_url),
            categories = COALESCE(?4, categories),
            updated_at = ?5
        WHERE id = ?6 AND deleted_at IS NULL
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.photo_url)
    .bind(categories)
    .bind(Utc::now())
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("A post with this title already exists".to_string())
        }
        _ => {
            tracing::error!("Failed to update post {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let post = fetch_post(&pool, id).await?;
    Ok(Json(post))
}

/// Soft-delete a post.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE posts SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    tracing::info!(post_id = id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_post(pool: &SqlitePool, id: i64) -> Result<Post, AppError> {
    sqlx::query_as::<_, Post>(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = ?1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))
}

fn render(post: Post, policy: &SanitizationPolicy) -> PostView {
    let description_html = sanitize(&post.description, policy);
    PostView {
        post,
        description_html,
    }
}
