// src/models/post.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;
use url::Url;
use validator::Validate;

/// Represents the 'posts' table in the database.
///
/// `description` is the raw HTML produced by the rich-text editor. It is
/// stored untouched; sanitized markup is derived per response and never
/// written back.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,

    /// Author username. Denormalized on purpose: posts keep their original
    /// byline across profile renames.
    pub author: String,

    pub description: String,

    /// URL of the cover image, typically produced by the upload endpoint.
    pub photo_url: Option<String>,

    /// Category names, stored as a JSON array in the database.
    /// `sqlx::types::Json` handles automatic serialization/deserialization.
    pub categories: Json<Vec<String>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A post as delivered to rendering clients: the stored record plus the
/// sanitized description HTML.
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,

    /// Safe for direct injection; the only field a display surface may render
    /// as markup.
    pub description_html: String,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Author length must be between 1 and 50 chars"
    ))]
    pub author: String,

    #[validate(length(
        min = 1,
        max = 50000,
        message = "Description length must be between 1 and 50000 chars"
    ))]
    pub description: String,

    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub photo_url: Option<String>,

    #[validate(custom(function = validate_categories))]
    pub categories: Option<Vec<String>>,
}

/// DTO for partially updating a post. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 50000))]
    pub description: Option<String>,

    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub photo_url: Option<String>,

    #[validate(custom(function = validate_categories))]
    pub categories: Option<Vec<String>>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// Cursor for pagination: the created_at timestamp of the last post in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,

    /// Search keyword for title match.
    pub q: Option<String>,

    /// Filter to a single author's posts.
    pub author: Option<String>,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

/// Validates the category list: at most 10 entries, each 1-50 chars.
fn validate_categories(categories: &[String]) -> Result<(), validator::ValidationError> {
    if categories.len() > 10 {
        return Err(validator::ValidationError::new("too_many_categories"));
    }
    for category in categories {
        if category.is_empty() || category.len() > 50 {
            return Err(validator::ValidationError::new("invalid_category_length"));
        }
    }
    Ok(())
}
