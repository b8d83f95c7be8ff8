//! Integration tests for the platform client and typed store, against a
//! mock platform server.

use korekushon::favorites::FavoriteStore;
use korekushon::platform::{PlatformClient, PlatformError};
use korekushon::store::Store;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> Store {
    Store::new(PlatformClient::new(&server.uri(), "test-key"))
}

#[tokio::test]
async fn test_list_categories_parses_rows_and_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/categories"))
        .and(query_param("order", "id"))
        .and(header("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "フォーラム", "description": null,
              "created_at": "2024-01-01T00:00:00+00:00" },
            { "id": 2, "name": "ライトノベル" },
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let categories = store.list_categories().await.unwrap();

    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].name, "フォーラム");
    assert_eq!(categories[1].description, None);
}

#[tokio::test]
async fn test_duplicate_insert_maps_to_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/user_collection_items"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint",
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.insert_collection_item(100, 10).await.unwrap_err();

    assert!(err.is_conflict(), "expected conflict, got {err}");
}

#[tokio::test]
async fn test_duplicate_key_code_is_conflict_even_without_409() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/user_collection_items"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value",
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.insert_collection_item(100, 10).await.unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_other_api_errors_keep_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/links"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "connection to the database failed",
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.list_links().await.unwrap_err();

    match err {
        PlatformError::Api { status, message, .. } => {
            assert_eq!(status, 500);
            assert!(message.contains("database"));
        }
        other => panic!("expected Api error, got {other}"),
    }
}

#[tokio::test]
async fn test_adjust_favorite_count_accepts_bare_and_array_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/adjust_link_favorite_count"))
        .and(wiremock::matchers::body_json(json!({ "link_id": 10, "delta": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(5)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/adjust_link_favorite_count"))
        .and(wiremock::matchers::body_json(json!({ "link_id": 10, "delta": -1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([4])))
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert_eq!(store.adjust_favorite_count(10, 1).await.unwrap(), Some(5));
    assert_eq!(store.adjust_favorite_count(10, -1).await.unwrap(), Some(4));
}

#[tokio::test]
async fn test_comment_change_marker_reads_latest_id_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/comments"))
        .and(query_param("order", "id.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 12 }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/comments"))
        .and(header("Prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": 12 }]))
                .insert_header("content-range", "0-0/42"),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    let marker = store.comment_change_marker().await.unwrap();

    assert_eq!(marker, (Some(12), 42));
}

#[tokio::test]
async fn test_resolve_email_passes_emails_through_without_a_request() {
    // No mocks mounted: a request would fail the test with an Api error.
    let server = MockServer::start().await;
    let store = store_for(&server);

    let resolved = store.resolve_email("user@example.com").await.unwrap();
    assert_eq!(resolved, Some("user@example.com".to_string()));
}

#[tokio::test]
async fn test_resolve_email_looks_up_usernames_in_profiles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("username", "eq.haruka"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "u-1", "email": "haruka@example.com" },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("username", "eq.nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server);

    let resolved = store.resolve_email("haruka").await.unwrap();
    assert_eq!(resolved, Some("haruka@example.com".to_string()));

    let missing = store.resolve_email("nobody").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_sign_in_parses_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-token",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": {
                "id": "u-1",
                "email": "haruka@example.com",
                "user_metadata": { "username": "haruka" },
            },
        })))
        .mount(&server)
        .await;

    let client = PlatformClient::new(&server.uri(), "test-key");
    let session = client
        .sign_in_with_password("haruka@example.com", "secret-password")
        .await
        .unwrap();

    assert_eq!(session.access_token, "jwt-token");
    assert_eq!(session.expires_in, Some(3600));
    assert_eq!(session.user.username(), Some("haruka"));
}

#[tokio::test]
async fn test_user_token_replaces_bearer_for_scoped_writes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/comments"))
        .and(header("authorization", "Bearer user-jwt"))
        .and(header("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "id": 7, "content": "hi", "author_id": "u-1",
              "category_id": 1, "link_id": null, "parent_id": null },
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server).as_user("user-jwt");
    let comment = store
        .create_comment(&korekushon::store::NewComment {
            content: "hi".to_string(),
            category_id: Some(1),
            link_id: None,
            parent_id: None,
            author_id: "u-1".to_string(),
            author_name: "haruka".to_string(),
            author_email: None,
        })
        .await
        .unwrap();

    assert_eq!(comment.id, 7);
}
