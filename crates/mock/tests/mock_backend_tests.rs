use chrono::{Duration, Utc};
use otherlink_core::{
    Credentials, LinkDraft, LinkType, MemoryStore, MockConfig, OtherlinkDraft, StorageKey,
    TokenStore,
};
use otherlink_http::{ApiClient, LinkService, OtherlinkService, UserService};
use otherlink_mock::{MockServer, MockState};
use serde_json::json;
use std::sync::Arc;

async fn signed_in(server: &MockServer) -> (ApiClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = ApiClient::new(server.base_url())
        .unwrap()
        .with_token_store(store.clone());
    let body = UserService::new(client.clone())
        .login(&Credentials::new("testuser", "password123"))
        .await
        .unwrap();
    store
        .set(StorageKey::AccessToken, body["accessToken"].as_str().unwrap())
        .unwrap();
    (client, store)
}

#[tokio::test]
async fn test_testuser_login() {
    let server = MockServer::start().await.unwrap();
    let users = UserService::new(ApiClient::new(server.base_url()).unwrap());

    let body = users
        .login(&Credentials::new("testuser", "password123"))
        .await
        .unwrap();

    assert!(!body["accessToken"].as_str().unwrap().is_empty());
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());
    assert_eq!(body["user"]["username"], "testuser");
    assert_eq!(body["user"]["roles"][1]["name"], "admin");
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = MockServer::start().await.unwrap();
    let users = UserService::new(ApiClient::new(server.base_url()).unwrap());

    let err = users
        .login(&Credentials::new("testuser", "nope"))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.server_message(), Some("Invalid username or password"));
}

#[tokio::test]
async fn test_validate_and_refresh_flow() {
    let server = MockServer::start().await.unwrap();
    let users = UserService::new(ApiClient::new(server.base_url()).unwrap());
    let body = users
        .login(&Credentials::new("admin", "admin123"))
        .await
        .unwrap();
    let access = body["accessToken"].as_str().unwrap();
    let refresh = body["refreshToken"].as_str().unwrap();

    let validated = users.validate_token(access).await.unwrap();
    assert_eq!(validated["user"]["username"], "admin");

    server.state().expire_access_tokens().await;
    let err = users.validate_token(access).await.unwrap_err();
    assert_eq!(err.server_message(), Some("Token is invalid or expired"));

    let refreshed = users.refresh_token(refresh).await.unwrap();
    let new_access = refreshed["accessToken"].as_str().unwrap();
    assert_ne!(new_access, access);
    assert!(refreshed.get("refreshToken").is_none());
    assert!(users.validate_token(new_access).await.is_ok());
}

#[tokio::test]
async fn test_expired_reset_token_is_gone() {
    let server = MockServer::start().await.unwrap();
    let users = UserService::new(ApiClient::new(server.base_url()).unwrap());

    let forgot = users.forgot_password("testuser").await.unwrap();
    assert!(forgot["resetToken"].as_str().unwrap().starts_with("reset-"));

    let expired = server
        .state()
        .insert_reset_token("testuser", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    let err = users
        .reset_password(&expired, "newpassword1")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(410));
    assert!(err.is_expired_link());
    assert_eq!(err.server_message(), Some("Reset token is invalid or expired"));
}

#[tokio::test]
async fn test_profile_and_preferences_follow_bearer() {
    let server = MockServer::start().await.unwrap();
    let (client, _store) = signed_in(&server).await;
    let users = UserService::new(client);

    let profile = users.profile().await.unwrap();
    assert_eq!(profile["firstName"], "John");

    let updated = users
        .update_preferences(json!({ "darkMode": true }).as_object().unwrap())
        .await
        .unwrap();
    assert_eq!(updated["darkMode"], true);
    assert_eq!(updated["emailNotifications"], true);

    let activity = users.activity_log(&[("page", "2")]).await.unwrap();
    assert_eq!(activity["pagination"]["page"], 2);
    assert_eq!(activity["activities"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_pages_and_links() {
    let server = MockServer::start().await.unwrap();
    let (client, _store) = signed_in(&server).await;
    let pages = OtherlinkService::new(client.clone());
    let links = LinkService::new(client);

    assert!(pages.list(1, 100, &[]).await.unwrap().otherlinks.is_empty());

    let page = pages
        .create(&OtherlinkDraft {
            name: "My links".into(),
            display_name: Some("johndoe".into()),
            description: String::new(),
            active: true,
        })
        .await
        .unwrap();
    assert!(!pages.check_display_name("johndoe").await.unwrap().available);

    let link = links
        .create(
            &page.id,
            &LinkDraft {
                name: "Blog".into(),
                shortcode: "blog".into(),
                url: "https://example.com".into(),
                link_type: LinkType::Url,
                active: true,
                ..LinkDraft::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(links.recent(&page.id, 5).await.unwrap().links[0].id, link.id);
    assert_eq!(links.get(&page.id, &link.id).await.unwrap().shortcode, "blog");
    assert!(!links.check_shortcode(&page.id, "BLOG", None).await.unwrap().available);
    assert!(
        links
            .check_shortcode(&page.id, "blog", Some(&link.id))
            .await
            .unwrap()
            .available
    );

    let public = pages.by_display_name("johndoe").await.unwrap();
    assert_eq!(public.links.len(), 1);

    let toggled = links.set_active(&page.id, &link.id, false).await.unwrap();
    assert!(!toggled.active);
    assert_eq!(toggled.name, "Blog");
    assert!(pages.by_display_name("johndoe").await.unwrap().links.is_empty());

    let generated = links.generate_shortcode(&page.id).await.unwrap();
    assert_eq!(generated.len(), 8);

    pages.delete(&page.id).await.unwrap();
    assert!(pages.get(&page.id).await.unwrap_err().status() == Some(404));
}

#[tokio::test]
async fn test_failure_rate_one_fails_everything_but_logout() {
    let config = MockConfig {
        failure_rate: 1.0,
        ..MockConfig::deterministic()
    };
    let server = MockServer::spawn_with_state(MockState::seeded(config))
        .await
        .unwrap();
    let users = UserService::new(ApiClient::new(server.base_url()).unwrap());

    let err = users
        .login(&Credentials::new("testuser", "password123"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(users.logout("anything").await.is_ok());
}
