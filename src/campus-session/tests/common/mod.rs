#![allow(dead_code)]

use std::sync::Arc;

use campus_session::{
    ClientConfig, InvalidationReason, SessionStatus, SessionStore, StorageAdapter,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "juan@university.edu";
pub const PASSWORD: &str = "SecurePassword123!";

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(format!("{}/api", server.uri()))
        .unwrap()
}

pub fn store_for(server: &MockServer) -> SessionStore {
    store_with(server, StorageAdapter::memory())
}

pub fn store_with(server: &MockServer, storage: StorageAdapter) -> SessionStore {
    SessionStore::new(&config_for(server), storage).unwrap()
}

pub fn profile_json(email: &str) -> Value {
    json!({
        "id": "550e8400-e29b-41d4-a716-446655440000",
        "email": email,
        "full_name": "Juan García",
        "student_id": "2023001",
        "is_active": true,
        "created_at": "2024-01-15T10:30:00+00:00",
        "updated_at": "2024-01-15T10:30:00+00:00"
    })
}

pub fn device_json(id: &str) -> Value {
    json!({
        "id": id,
        "user_id": "550e8400-e29b-41d4-a716-446655440000",
        "name": "MacBook Pro",
        "device_type": "laptop",
        "serial_number": "C02XG0FDH7JY",
        "qr_data": format!("DEVICE:{id}"),
        "qr_code": null,
        "created_at": "2024-01-15T10:30:00+00:00",
        "updated_at": null
    })
}

/// `POST /api/auth/login` for `email` answering with `token`.
pub async fn mount_login(server: &MockServer, email: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({ "email": email })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "user": {"student_id": "2023001", "full_name": "Juan García"}
        })))
        .mount(server)
        .await;
}

/// `GET /api/users/me` succeeding for `token`.
pub async fn mount_profile(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json(EMAIL)))
        .mount(server)
        .await;
}

/// A signed-in store holding `token`.
pub async fn signed_in(server: &MockServer, token: &str) -> SessionStore {
    mount_login(server, EMAIL, token).await;
    mount_profile(server, token).await;
    let store = store_for(server);
    store.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(store.status(), SessionStatus::Authenticated);
    store
}

/// Record every invalidation published by `store`.
pub fn record_invalidations(store: &SessionStore) -> Arc<Mutex<Vec<InvalidationReason>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store
        .invalidation_bus()
        .subscribe(move |reason| sink.lock().push(*reason));
    seen
}

/// Record every status transition of `store`.
pub fn record_statuses(store: &SessionStore) -> Arc<Mutex<Vec<SessionStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |status| sink.lock().push(*status));
    seen
}

pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
