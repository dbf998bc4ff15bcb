//! Sign-in, sign-out and startup restore against a mock backend.

mod common;

use std::time::Duration;

use campus_session::constants::{LEGACY_USER_KEY, TOKEN_KEY};
use campus_session::{
    DeviceService, ErrorKind, InvalidationReason, ProfileUpdate, SessionStatus, StorageAdapter,
    StorageKind,
};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_login_stores_token_and_authenticates_later_calls() {
    let server = MockServer::start().await;
    mount_login(&server, EMAIL, "t1").await;
    mount_profile(&server, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/devices/"))
        .and(header("Authorization", "Bearer t1"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let statuses = record_statuses(&store);

    let profile = store.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(profile.student_id, "2023001");
    assert_eq!(store.status(), SessionStatus::Authenticated);
    assert_eq!(store.user().map(|u| u.full_name).as_deref(), Some("Juan García"));
    assert_eq!(store.storage().get(TOKEN_KEY).await.as_deref(), Some("t1"));
    assert_eq!(
        *statuses.lock(),
        vec![SessionStatus::Authenticating, SessionStatus::Authenticated]
    );

    let devices = DeviceService::new(store.api().clone()).list().await.unwrap();
    assert!(devices.is_empty());
}

#[tokio::test]
async fn test_login_request_is_sent_without_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": EMAIL, "password": PASSWORD})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Incorrect email or password"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let invalidations = record_invalidations(&store);

    let err = store.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(err.message(), "Incorrect email or password");
    assert_eq!(store.status(), SessionStatus::Anonymous);
    assert_eq!(store.storage().get(TOKEN_KEY).await, None);
    assert!(invalidations.lock().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_login_failure_without_detail_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), "Failed to sign in");
}

#[tokio::test]
async fn test_profile_failure_after_login_removes_token() {
    let server = MockServer::start().await;
    mount_login(&server, EMAIL, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "Database unavailable"})))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let statuses = record_statuses(&store);
    let invalidations = record_invalidations(&store);

    let err = store.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.message(), "Database unavailable");

    assert_eq!(store.status(), SessionStatus::Anonymous);
    assert!(store.user().is_none());
    assert!(store.token().is_none());
    assert_eq!(store.storage().get(TOKEN_KEY).await, None);
    assert_eq!(
        *statuses.lock(),
        vec![SessionStatus::Authenticating, SessionStatus::Anonymous]
    );
    assert!(invalidations.lock().is_empty());
}

#[tokio::test]
async fn test_rejected_profile_after_login_is_invalid_credentials() {
    let server = MockServer::start().await;
    mount_login(&server, EMAIL, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Could not validate credentials"
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let invalidations = record_invalidations(&store);

    let err = store.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(store.storage().get(TOKEN_KEY).await, None);
    assert!(invalidations.lock().is_empty());
}

#[tokio::test]
async fn test_empty_token_is_invalid_response() {
    let server = MockServer::start().await;
    mount_login(&server, EMAIL, "   ").await;

    let store = store_for(&server);
    let err = store.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert_eq!(err.message(), "No token received from server");
    assert_eq!(requests_to(&server, "/api/users/me").await, 0);
    assert_eq!(store.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn test_second_login_while_first_in_flight_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "token-a"}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    mount_profile(&server, "token-a").await;

    let store = store_for(&server);
    let (first, second) = tokio::join!(
        store.login("a@university.edu", "password-a"),
        store.login("b@university.edu", "password-b"),
    );

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err().kind(), ErrorKind::LoginInProgress);
    assert_eq!(requests_to(&server, "/api/auth/login").await, 1);
    assert_eq!(store.storage().get(TOKEN_KEY).await.as_deref(), Some("token-a"));
    assert_eq!(store.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_register_while_login_in_flight_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "token-a"}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    mount_profile(&server, "token-a").await;

    let store = store_for(&server);
    let (login, register) = tokio::join!(
        store.login(EMAIL, PASSWORD),
        store.register("new@university.edu", PASSWORD, "Ana Ruiz", "2023002"),
    );

    assert!(login.is_ok());
    assert_eq!(register.unwrap_err().kind(), ErrorKind::LoginInProgress);
    assert_eq!(requests_to(&server, "/api/auth/register").await, 0);
    assert_eq!(store.token().as_deref(), Some("token-a"));
}

#[tokio::test]
async fn test_failed_login_over_active_session_logs_it_out() {
    let server = MockServer::start().await;
    let store = signed_in(&server, "t1").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "other@university.edu", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Incorrect email or password"
        })))
        .mount(&server)
        .await;

    let statuses = record_statuses(&store);
    let invalidations = record_invalidations(&store);

    let err = store
        .login("other@university.edu", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

    assert_eq!(store.status(), SessionStatus::Anonymous);
    assert!(store.user().is_none());
    assert_eq!(store.storage().get(TOKEN_KEY).await, None);
    assert_eq!(
        *statuses.lock(),
        vec![SessionStatus::Authenticating, SessionStatus::Anonymous]
    );
    assert_eq!(*invalidations.lock(), vec![InvalidationReason::LoggedOut]);
}

#[tokio::test]
async fn test_login_over_active_session_replaces_it() {
    let server = MockServer::start().await;
    let store = signed_in(&server, "t1").await;
    mount_login(&server, "other@university.edu", "t2").await;
    mount_profile(&server, "t2").await;

    let invalidations = record_invalidations(&store);

    store.login("other@university.edu", PASSWORD).await.unwrap();
    assert_eq!(store.token().as_deref(), Some("t2"));
    assert_eq!(store.storage().get(TOKEN_KEY).await.as_deref(), Some("t2"));
    assert_eq!(*invalidations.lock(), vec![InvalidationReason::LoggedOut]);
}

#[tokio::test]
async fn test_logout_publishes_once_and_clears_storage() {
    let server = MockServer::start().await;
    let store = signed_in(&server, "t1").await;
    let invalidations = record_invalidations(&store);

    store.logout().await;
    assert_eq!(*invalidations.lock(), vec![InvalidationReason::LoggedOut]);
    assert_eq!(store.status(), SessionStatus::Anonymous);
    assert!(store.user().is_none());
    assert_eq!(store.storage().get(TOKEN_KEY).await, None);

    store.logout().await;
    assert_eq!(invalidations.lock().len(), 1);
}

#[tokio::test]
async fn test_logout_while_anonymous_publishes_nothing() {
    let server = MockServer::start().await;
    let store = store_for(&server);
    let invalidations = record_invalidations(&store);
    let statuses = record_statuses(&store);

    store.logout().await;
    assert!(invalidations.lock().is_empty());
    assert!(statuses.lock().is_empty());
}

#[tokio::test]
async fn test_logout_during_login_prevents_commit() {
    let server = MockServer::start().await;
    mount_login(&server, EMAIL, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(profile_json(EMAIL))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    let logout = async {
        while requests_to(&server, "/api/users/me").await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        store.logout().await;
    };
    let (login, ()) = tokio::join!(store.login(EMAIL, PASSWORD), logout);

    let err = login.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationExpired);
    assert_eq!(err.message(), "Session was closed while signing in");
    assert_eq!(store.status(), SessionStatus::Anonymous);
    assert_eq!(store.storage().get(TOKEN_KEY).await, None);
}

#[tokio::test]
async fn test_register_signs_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({
            "email": EMAIL,
            "password": PASSWORD,
            "full_name": "Juan García",
            "student_id": "2023001"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "fresh",
            "user": profile_json(EMAIL)
        })))
        .mount(&server)
        .await;
    mount_profile(&server, "fresh").await;

    let store = store_for(&server);
    let profile = store
        .register(EMAIL, PASSWORD, "Juan García", "2023001")
        .await
        .unwrap();
    assert_eq!(profile.email, EMAIL);
    assert_eq!(store.token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_register_validation_errors_are_joined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                {"loc": ["body", "email"], "msg": "value is not a valid email address"},
                {"loc": ["body", "password"], "msg": "String should have at least 8 characters"}
            ]
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store
        .register("not-an-email", "short", "Juan", "2023001")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status(), Some(422));
    assert_eq!(
        err.message(),
        "value is not a valid email address, String should have at least 8 characters"
    );
}

#[tokio::test]
async fn test_hydrate_restores_stored_token() {
    let server = MockServer::start().await;
    mount_profile(&server, "stored").await;

    let storage = StorageAdapter::memory();
    storage.set(TOKEN_KEY, "stored").await;
    storage.set(LEGACY_USER_KEY, r#"{"full_name":"old"}"#).await;

    let store = store_with(&server, storage.clone());
    assert_eq!(store.hydrate().await, SessionStatus::Authenticated);
    assert_eq!(store.token().as_deref(), Some("stored"));
    assert_eq!(store.user().map(|u| u.student_id).as_deref(), Some("2023001"));
    assert_eq!(storage.get(LEGACY_USER_KEY).await, None);
}

#[tokio::test]
async fn test_hydrate_with_rejected_token_clears_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let storage = StorageAdapter::memory();
    storage.set(TOKEN_KEY, "expired").await;

    let store = store_with(&server, storage.clone());
    let invalidations = record_invalidations(&store);

    assert_eq!(store.hydrate().await, SessionStatus::Anonymous);
    assert_eq!(storage.get(TOKEN_KEY).await, None);
    assert!(invalidations.lock().is_empty());
}

#[tokio::test]
async fn test_hydrate_when_backend_unreachable() {
    let config = campus_session::ClientConfig::default()
        .with_base_url("http://127.0.0.1:9/api")
        .unwrap();

    let storage = StorageAdapter::memory();
    storage.set(TOKEN_KEY, "stored").await;
    let store = campus_session::SessionStore::new(&config, storage.clone()).unwrap();

    assert_eq!(store.hydrate().await, SessionStatus::Anonymous);
    assert_eq!(storage.get(TOKEN_KEY).await, None);
}

#[tokio::test]
async fn test_hydrate_without_token_makes_no_request() {
    let server = MockServer::start().await;
    let store = store_for(&server);
    let statuses = record_statuses(&store);

    assert_eq!(store.hydrate().await, SessionStatus::Anonymous);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(statuses.lock().is_empty());
}

#[tokio::test]
async fn test_encrypted_file_session_survives_restart() {
    let server = MockServer::start().await;
    let home = tempfile::tempdir().unwrap();

    mount_login(&server, EMAIL, "persisted").await;
    mount_profile(&server, "persisted").await;

    let first = store_with(
        &server,
        StorageAdapter::from_kind(StorageKind::EncryptedFile, home.path()),
    );
    first.login(EMAIL, PASSWORD).await.unwrap();

    let second = store_with(
        &server,
        StorageAdapter::from_kind(StorageKind::EncryptedFile, home.path()),
    );
    assert_eq!(second.hydrate().await, SessionStatus::Authenticated);
    assert_eq!(second.token().as_deref(), Some("persisted"));

    second.logout().await;
    assert!(!home.path().join("session.enc").exists());
}

#[tokio::test]
async fn test_update_profile_replaces_cached_user() {
    let server = MockServer::start().await;
    let store = signed_in(&server, "t1").await;

    let mut updated = profile_json(EMAIL);
    updated["full_name"] = json!("Juan G. López");
    Mock::given(method("PUT"))
        .and(path("/api/users/me"))
        .and(header("Authorization", "Bearer t1"))
        .and(body_json(json!({"full_name": "Juan G. López"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .mount(&server)
        .await;

    let profile = store
        .update_profile(&ProfileUpdate {
            full_name: Some("Juan G. López".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(profile.full_name, "Juan G. López");
    assert_eq!(
        store.user().map(|u| u.full_name).as_deref(),
        Some("Juan G. López")
    );
}

#[tokio::test]
async fn test_change_password_reports_backend_detail() {
    let server = MockServer::start().await;
    let store = signed_in(&server, "t1").await;
    Mock::given(method("POST"))
        .and(path("/api/users/me/password"))
        .and(body_json(json!({"current_password": "wrong", "new_password": "NewPassword123!"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Current password is incorrect"
        })))
        .mount(&server)
        .await;

    let err = store
        .change_password("wrong", "NewPassword123!")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "Current password is incorrect");
    assert!(store.is_authenticated());
}

#[tokio::test]
async fn test_password_reset_uses_fixed_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/password/reset-request"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "SMTP down"})))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store
        .request_password_reset("someone@university.edu")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.message(), "Failed to request password reset");
}

#[tokio::test]
async fn test_password_reset_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/password/reset-request"))
        .and(body_json(json!({"email": "someone@university.edu"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "If the email exists, a reset link has been sent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    store
        .request_password_reset("someone@university.edu")
        .await
        .unwrap();
}
