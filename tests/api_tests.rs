// tests/api_tests.rs

use inkpost::{config::Config, routes, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// Each test gets its own in-memory sqlite database and its own temporary
/// upload directory.
async fn spawn_app() -> String {
    // 1. Create a single-connection pool; every connection to "sqlite::memory:"
    // is a distinct database, so the pool must not open a second one.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory sqlite");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let upload_dir = std::env::temp_dir().join(format!("inkpost-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .expect("Failed to create test upload dir");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        upload_dir: upload_dir.to_string_lossy().into_owned(),
        max_upload_bytes: 1024 * 1024, // 1 MB is plenty for tests
        rust_log: "error".to_string(),
    };

    let state = AppState { pool, config };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background. Connect info is required by the
    // rate limiter on the upload route.
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

async fn create_post(
    client: &reqwest::Client,
    address: &str,
    title: &str,
    description: &str,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/posts", address))
        .json(&serde_json::json!({
            "title": title,
            "author": "tester",
            "description": description,
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn create_post_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(&client, &address, "First post", "<p>Hello</p>").await;

    assert_eq!(post["title"], "First post");
    assert_eq!(post["author"], "tester");
    assert_eq!(post["description"], "<p>Hello</p>");
    assert!(post["id"].as_i64().is_some());
    assert!(post["created_at"].is_string());
}

#[tokio::test]
async fn create_post_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: empty title
    let response = client
        .post(format!("{}/api/posts", address))
        .json(&serde_json::json!({
            "title": "",
            "author": "tester",
            "description": "<p>body</p>",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_title_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    create_post(&client, &address, "Unique title", "<p>one</p>").await;

    let response = client
        .post(format!("{}/api/posts", address))
        .json(&serde_json::json!({
            "title": "Unique title",
            "author": "someone_else",
            "description": "<p>two</p>",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn list_renders_sanitized_summaries() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let raw = "<p style=\"color:red;position:fixed;\">Hi</p>\
               <script>alert(1)</script>\
               <img src=\"x\" onerror=\"alert(1)\">";
    create_post(&client, &address, "Styled post", raw).await;

    let posts: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(posts.len(), 1);

    // The stored record still holds the raw description.
    assert_eq!(posts[0]["description"], raw);

    // The rendered field is sanitized under the summary policy: inline color
    // survives, positioning and every scripting vector do not.
    let html = posts[0]["description_html"].as_str().unwrap();
    assert!(html.contains("color:red;"));
    assert!(!html.contains("position:fixed"));
    assert!(!html.contains("<script"));
    assert!(!html.contains("onerror"));
}

#[tokio::test]
async fn single_post_uses_conservative_body_policy() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let raw = "<p style=\"color:red\">Body</p><script>alert(1)</script>";
    let post = create_post(&client, &address, "Body post", raw).await;
    let id = post["id"].as_i64().unwrap();

    let view: serde_json::Value = client
        .get(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Single-post bodies drop inline styles entirely.
    let html = view["description_html"].as_str().unwrap();
    assert!(html.contains("<p>Body</p>"));
    assert!(!html.contains("style="));
    assert!(!html.contains("<script"));

    // Raw description rides along for the edit flow.
    assert_eq!(view["description"], raw);
}

#[tokio::test]
async fn list_filters_by_author_and_search() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    create_post(&client, &address, "Rust diaries", "<p>a</p>").await;

    let response = client
        .post(format!("{}/api/posts", address))
        .json(&serde_json::json!({
            "title": "Cooking notes",
            "author": "chef",
            "description": "<p>b</p>",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let by_author: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts?author=chef", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0]["title"], "Cooking notes");

    let by_search: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts?q=Rust", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0]["title"], "Rust diaries");
}

#[tokio::test]
async fn list_paginates_with_cursor_and_clamps_limit() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for title in ["Post one", "Post two", "Post three"] {
        create_post(&client, &address, title, "<p>body</p>").await;
    }

    // First page: two newest posts.
    let first_page: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts?limit=2", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0]["title"], "Post three");
    assert_eq!(first_page[1]["title"], "Post two");

    // Second page: cursor is the created_at of the last item seen.
    let cursor = first_page[1]["created_at"].as_str().unwrap();
    let second_page: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts", address))
        .query(&[("limit", "2"), ("cursor", cursor)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0]["title"], "Post one");

    // A negative limit must not turn into sqlite's "no limit"; it clamps to
    // the lower bound instead of dumping the table.
    let clamped: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts?limit=-1", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(clamped.len(), 1);

    let clamped_zero: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts?limit=0", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(clamped_zero.len(), 1);
}

#[tokio::test]
async fn update_post_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(&client, &address, "Old title", "<p>old</p>").await;
    let id = post["id"].as_i64().unwrap();

    let response = client
        .put(format!("{}/api/posts/{}", address, id))
        .json(&serde_json::json!({
            "title": "New title",
            "description": "<p>new</p>",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let updated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(updated["title"], "New title");
    assert_eq!(updated["description"], "<p>new</p>");
    assert!(updated["updated_at"].is_string());

    // Untouched fields survive a partial update.
    assert_eq!(updated["author"], "tester");
}

#[tokio::test]
async fn update_missing_post_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/api/posts/9999", address))
        .json(&serde_json::json!({ "title": "whatever" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn deleted_post_disappears() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(&client, &address, "Doomed", "<p>bye</p>").await;
    let id = post["id"].as_i64().unwrap();

    let response = client
        .delete(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let posts: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(posts.is_empty());

    // Deleting twice is a 404, not a second mutation.
    let response = client
        .delete(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn upload_rejects_non_image() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"not an image".to_vec())
            .file_name("evil.html")
            .mime_str("text/html")
            .unwrap(),
    );

    let response = client
        .post(format!("{}/api/upload", address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn upload_then_serve_roundtrip() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let payload = b"\x89PNG\r\n\x1a\nfake-png-bytes".to_vec();
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(payload.clone())
            .file_name("cover.png")
            .mime_str("image/png")
            .unwrap(),
    );

    let response = client
        .post(format!("{}/api/upload", address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".png"));

    // The uploaded file is served back from the static mount.
    let served = client
        .get(format!("{}{}", address, url))
        .send()
        .await
        .unwrap();
    assert_eq!(served.status().as_u16(), 200);
    assert_eq!(served.bytes().await.unwrap().to_vec(), payload);
}

#[tokio::test]
async fn oversized_upload_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Test config caps uploads at 1 MB.
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![0u8; 1024 * 1024 + 1])
            .file_name("huge.png")
            .mime_str("image/png")
            .unwrap(),
    );

    let response = client
        .post(format!("{}/api/upload", address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 413);
}

#[tokio::test]
async fn upload_exceeding_transport_limit_still_413() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Past double the configured cap the failure happens while reading the
    // multipart stream, before the handler's own size check; it must still
    // surface as 413.
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![0u8; 2 * 1024 * 1024 + 1])
            .file_name("colossal.png")
            .mime_str("image/png")
            .unwrap(),
    );

    let response = client
        .post(format!("{}/api/upload", address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 413);
}

#[tokio::test]
async fn deleted_title_is_reusable() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let post = create_post(&client, &address, "Phoenix", "<p>first life</p>").await;
    let id = post["id"].as_i64().unwrap();

    let response = client
        .delete(format!("{}/api/posts/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // The title belonged to a post nobody can see anymore; it is free again.
    let reborn = create_post(&client, &address, "Phoenix", "<p>second life</p>").await;
    assert_ne!(reborn["id"].as_i64().unwrap(), id);
    assert_eq!(reborn["description"], "<p>second life</p>");
}

#[tokio::test]
async fn profile_settings_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Create
    let response = client
        .post(format!("{}/api/users", address))
        .json(&serde_json::json!({
            "username": "writer",
            "email": "writer@example.com",
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    let user: serde_json::Value = response.json().await.unwrap();
    let id = user["id"].as_i64().unwrap();
    assert!(user["profile_pic"].is_null());

    // Update a subset of settings
    let response = client
        .put(format!("{}/api/users/{}", address, id))
        .json(&serde_json::json!({
            "email": "new@example.com",
            "profile_pic": "https://example.com/pic.png",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let updated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(updated["username"], "writer");
    assert_eq!(updated["email"], "new@example.com");
    assert_eq!(updated["profile_pic"], "https://example.com/pic.png");

    // Fetch reflects the update
    let fetched: serde_json::Value = client
        .get(format!("{}/api/users/{}", address, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["email"], "new@example.com");
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for (name, email) in [("alice", "alice@example.com"), ("bob", "bob@example.com")] {
        let response = client
            .post(format!("{}/api/users", address))
            .json(&serde_json::json!({ "username": name, "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
    }

    let response = client
        .post(format!("{}/api/users", address))
        .json(&serde_json::json!({
            "username": "alice",
            "email": "other@example.com",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn update_missing_profile_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("{}/api/users/424242", address))
        .json(&serde_json::json!({ "username": "ghost" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 404);
}
