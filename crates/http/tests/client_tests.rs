//! Integration tests for the OtherLink HTTP client

use otherlink_core::{
    EntityId, LinkDraft, LinkType, MemoryStore, OtherlinkDraft, StorageKey, TokenStore,
};
use otherlink_http::{ApiClient, ClientError, LinkService, OtherlinkService, UserService};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn store_with_token(token: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(StorageKey::AccessToken, token).unwrap();
    store
}

#[tokio::test]
async fn test_client_builder() {
    let client = ApiClient::builder()
        .base_url("http://localhost:8000/api/")
        .timeout(Duration::from_secs(3))
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000/api");
    assert_eq!(client.timeout(), Duration::from_secs(3));
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = ApiClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));

    let result = ApiClient::builder().base_url("not a url").build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_bearer_read_from_store_at_call_time() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("authorization", "Bearer second"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_token("first");
    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .token_store(store.clone())
        .build()
        .unwrap();

    // The token is looked up per request, not captured at build time
    store.set(StorageKey::AccessToken, "second").unwrap();

    let users = UserService::new(client);
    let profile = users.profile().await.unwrap();
    assert_eq!(profile["id"], 1);
}

#[tokio::test]
async fn test_no_authorization_without_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "testuser", "password": "password123"})))
        .respond_with(|req: &Request| {
            let has_auth = req.headers.contains_key("authorization");
            ResponseTemplate::new(200).set_body_json(json!({"had_auth": has_auth}))
        })
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .token_store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap();

    let body = UserService::new(client)
        .login(&otherlink_core::Credentials::new("testuser", "password123"))
        .await
        .unwrap();
    assert_eq!(body["had_auth"], false);
}

#[tokio::test]
async fn test_explicit_token_for_validation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token/validate"))
        .and(header("authorization", "Bearer explicit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 1}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .token_store(store_with_token("stored"))
        .build()
        .unwrap();

    let body = UserService::new(client).validate_token("explicit").await.unwrap();
    assert_eq!(body["user"]["id"], 1);
}

#[tokio::test]
async fn test_error_uses_body_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Invalid username or password"})),
        )
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let err = UserService::new(client)
        .login(&otherlink_core::Credentials::new("testuser", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Invalid username or password");
}

#[tokio::test]
async fn test_error_without_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/password/reset/complete"))
        .respond_with(ResponseTemplate::new(410).set_body_string("gone"))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let err = UserService::new(client)
        .complete_password_reset(&otherlink_core::PasswordReset {
            token: "expired".into(),
            password: "password123".into(),
            password_confirm: "password123".into(),
        })
        .await
        .unwrap_err();

    match &err {
        ClientError::Http { status, body, .. } => {
            assert_eq!(*status, 410);
            assert_eq!(*body, Value::Null);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "HTTP 410: Gone");
    assert!(err.is_expired_link());
}

#[tokio::test]
async fn test_non_json_success_is_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2fa/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("enabled"))
        .mount(&mock_server)
        .await;

    let users = UserService::new(ApiClient::new(mock_server.uri()).unwrap());
    assert_eq!(users.logout("r").await.unwrap(), Value::Null);
    assert_eq!(users.two_factor_status().await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_timeout_drops_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = UserService::new(client).profile().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_multipart_upload_omits_json_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/avatar"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(|req: &Request| {
            let content_type = req
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            ResponseTemplate::new(200).set_body_json(json!({"content_type": content_type}))
        })
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .token_store(store_with_token("tok"))
        .build()
        .unwrap();

    let body = UserService::new(client)
        .upload_avatar("me.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])
        .await
        .unwrap();
    let content_type = body["content_type"].as_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"), "{content_type}");
}

#[tokio::test]
async fn test_otherlink_list_unwraps_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/otherlinks"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "100"))
        .and(query_param("active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {
                "otherlinks": [
                    {"id": "ol-1", "name": "Main", "display_name": "main", "active": true},
                    {"id": 7, "name": "Side"}
                ],
                "pagination": {"page": 1, "limit": 100, "total": 2, "total_pages": 1}
            }
        })))
        .mount(&mock_server)
        .await;

    let service = OtherlinkService::new(ApiClient::new(mock_server.uri()).unwrap());
    let page = service.list(1, 100, &[("active", "true")]).await.unwrap();

    assert_eq!(page.otherlinks.len(), 2);
    assert_eq!(page.otherlinks[1].id, EntityId::from("7"));
    assert_eq!(page.pagination.unwrap().total, 2);
}

#[tokio::test]
async fn test_envelope_failure_becomes_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/otherlinks/ol-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "message": "Otherlink not found"
        })))
        .mount(&mock_server)
        .await;

    let service = OtherlinkService::new(ApiClient::new(mock_server.uri()).unwrap());
    let err = service.get(&EntityId::from("ol-9")).await.unwrap_err();
    assert!(err.to_string().contains("Otherlink not found"));
}

#[tokio::test]
async fn test_otherlink_create_sends_draft() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/otherlinks"))
        .and(body_json(json!({
            "name": "My page",
            "display_name": "my-page",
            "description": "",
            "active": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": true,
            "data": {"otherlink": {"id": "ol-2", "name": "My page", "display_name": "my-page"}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = OtherlinkService::new(ApiClient::new(mock_server.uri()).unwrap());
    let created = service
        .create(&OtherlinkDraft {
            name: "My page".into(),
            display_name: Some("my-page".into()),
            description: String::new(),
            active: true,
        })
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "ol-2");
}

#[tokio::test]
async fn test_link_endpoints() {
    let mock_server = MockServer::start().await;
    let otherlink = EntityId::from("ol-1");

    Mock::given(method("GET"))
        .and(path("/links/otherlink/ol-1/check-shortcode/promo"))
        .and(query_param("exclude", "l-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"shortcode": "promo", "available": false}
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/links/otherlink/ol-1/generate-shortcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {"shortcode": "a1b2c3d4"}
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/links/otherlink/ol-1"))
        .and(header_exists("content-type"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": true,
            "data": {"link": {
                "id": 11, "name": "Shop", "shortcode": "shop",
                "url": "https://shop.example.com", "link_type": "telegram"
            }}
        })))
        .mount(&mock_server)
        .await;

    let links = LinkService::new(ApiClient::new(mock_server.uri()).unwrap());

    let check = links
        .check_shortcode(&otherlink, "promo", Some(&EntityId::from("l-3")))
        .await
        .unwrap();
    assert!(!check.available);

    assert_eq!(links.generate_shortcode(&otherlink).await.unwrap(), "a1b2c3d4");

    let link = links
        .create(
            &otherlink,
            &LinkDraft {
                name: "Shop".into(),
                shortcode: "shop".into(),
                url: "https://shop.example.com".into(),
                link_type: LinkType::Url,
                active: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(link.link_type, LinkType::Other);
    assert!(link.active);
}

#[tokio::test]
async fn test_status_false_envelope_is_rejected_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/otherlinks/check-display-name/taken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": false,
            "message": "Display name is taken"
        })))
        .mount(&server)
        .await;

    let pages = OtherlinkService::new(ApiClient::new(server.uri()).unwrap());
    let err = pages.check_display_name("taken").await.unwrap_err();

    assert!(matches!(err, ClientError::Rejected { .. }));
    assert_eq!(err.server_message(), Some("Display name is taken"));
    assert_eq!(err.to_string(), "Display name is taken");
    assert_eq!(err.status(), None);
}
