// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    pub email: String,

    /// URL of the profile picture, typically produced by the upload endpoint.
    pub profile_pic: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new profile.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    #[validate(email(message = "Invalid email address."))]
    pub email: String,
}

/// DTO for the account settings form. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub profile_pic: Option<String>,
}

fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}
