//! Token refresh behaviour of authenticated requests

use cinema_core::{MemorySessionStore, Session, SessionStore};
use cinema_http::client::{CinemaClient, RefreshCoordinator, error::ClientError};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ticket_json() -> serde_json::Value {
    json!([{
        "booking_id": 1,
        "show_id": 10,
        "title": "Dune",
        "seat_name": "C7",
        "show_time": "2030-05-01T19:30:00Z",
        "book_at": "2030-04-20T08:00:00Z"
    }])
}

fn signed_in_store(token: &str) -> MemorySessionStore {
    MemorySessionStore::with_session(Session::new(token).with_user(7, "ana@example.com", "Ana"))
}

struct Harness {
    client: CinemaClient,
    store: MemorySessionStore,
    coordinator: RefreshCoordinator,
    expired: Arc<AtomicUsize>,
}

fn harness(server: &MockServer, token: &str) -> Harness {
    let store = signed_in_store(token);
    let coordinator = RefreshCoordinator::new();
    let expired = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&expired);
    let client = CinemaClient::builder()
        .base_url(format!("{}/api", server.uri()))
        .api_key("web_test_key")
        .session_store(Arc::new(store.clone()))
        .refresh_coordinator(coordinator.clone())
        .on_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    Harness {
        client,
        store,
        coordinator,
        expired,
    }
}

async fn mount_rejects_old_token(server: &MockServer) {
    for (verb, route) in [("GET", "/api/tickets"), ("POST", "/api/book")] {
        Mock::given(method(verb))
            .and(path(route))
            .and(header("authorization", "Bearer old-token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "token expired" })))
            .mount(server)
            .await;
    }
}

async fn mount_accepts_new_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_json()))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/book"))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_refresh_then_replay_returns_replayed_outcome() {
    let server = MockServer::start().await;
    mount_rejects_old_token(&server).await;
    mount_accepts_new_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("x-api-key", "web_test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "access_token": "new-token" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let tickets = h.client.my_tickets().await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].seat_name, "C7");

    // Token replaced, identity kept
    let session = h.store.get().unwrap();
    assert_eq!(session.access_token, "new-token");
    assert_eq!(session.user_id, Some(7));

    assert!(!h.coordinator.is_in_progress());
    assert_eq!(h.coordinator.refresh_count(), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let server = MockServer::start().await;
    mount_rejects_old_token(&server).await;
    mount_accepts_new_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new-token" }))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let tickets = tokio::spawn({
        let client = h.client.clone();
        async move { client.my_tickets().await }
    });
    let booking = tokio::spawn({
        let client = h.client.clone();
        async move { client.book_seats(&[100, 101]).await }
    });

    // Both 401s are back while the refresh is still held open, so the
    // second caller can only be waiting on the in-flight refresh.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let rejected = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() != "/api/auth/refresh")
        .count();
    assert_eq!(rejected, 2);
    assert!(h.coordinator.is_in_progress());
    assert_eq!(h.store.access_token().as_deref(), Some("old-token"));

    assert_eq!(tickets.await.unwrap().unwrap().len(), 1);
    booking.await.unwrap().unwrap();
    assert!(!h.coordinator.is_in_progress());
    assert_eq!(h.coordinator.refresh_count(), 1);
    assert_eq!(h.store.access_token().as_deref(), Some("new-token"));

    let requests = server.received_requests().await.unwrap();
    let refreshes = requests
        .iter()
        .filter(|r| r.url.path() == "/api/auth/refresh")
        .count();
    assert_eq!(refreshes, 1);
}

#[tokio::test]
async fn test_failed_refresh_ends_session_for_every_caller() {
    let server = MockServer::start().await;
    mount_rejects_old_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": "refresh token not found" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let (tickets, booking) = tokio::join!(h.client.my_tickets(), h.client.book_seats(&[100]));

    assert!(matches!(tickets, Err(ClientError::Unauthenticated(_))));
    assert!(matches!(booking, Err(ClientError::Unauthenticated(_))));
    assert!(h.store.get().is_none());
    assert!(!h.client.is_authenticated());
    // One refresh, one notification
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_rejection_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "token revoked" })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let result = h.client.my_tickets().await;
    assert!(matches!(result, Err(ClientError::Unauthenticated(msg)) if msg == "token revoked"));
    assert!(h.store.get().is_none());
    assert_eq!(h.coordinator.refresh_count(), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_public_calls_never_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/movies"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new-token" })))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let result = h.client.list_movies().await;
    assert!(matches!(result, Err(ClientError::Unauthenticated(_))));
    assert_eq!(h.store.access_token().as_deref(), Some("old-token"));
    assert_eq!(h.coordinator.refresh_count(), 0);
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/book"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "error": "seat already booked" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let result = h.client.book_seats(&[5]).await;
    assert!(matches!(result, Err(ClientError::Conflict(msg)) if msg == "seat already booked"));
    assert_eq!(h.store.access_token().as_deref(), Some("old-token"));
}

#[tokio::test]
async fn test_refresh_without_token_fails() {
    let server = MockServer::start().await;
    mount_rejects_old_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let result = h.client.my_tickets().await;
    assert!(matches!(result, Err(ClientError::Unauthenticated(_))));
    assert!(h.store.get().is_none());
}

#[tokio::test]
async fn test_token_changed_in_flight_replays_without_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    mount_accepts_new_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");

    let client = h.client.clone();
    let pending = tokio::spawn(async move { client.my_tickets().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    h.store.set_access_token("new-token").unwrap();

    let tickets = pending.await.unwrap().unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(h.coordinator.refresh_count(), 0);
}

#[tokio::test]
async fn test_refresh_cookie_from_login_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refresh_token=rt-1; Path=/; HttpOnly")
                .set_body_json(json!({
                    "response": {
                        "access_token": "old-token",
                        "user_id": 7,
                        "email": "ana@example.com",
                        "name": "Ana"
                    }
                })),
        )
        .mount(&server)
        .await;

    mount_rejects_old_token(&server).await;
    mount_accepts_new_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("cookie", "refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemorySessionStore::new();
    let client = CinemaClient::builder()
        .base_url(format!("{}/api", server.uri()))
        .session_store(Arc::new(store.clone()))
        .build()
        .unwrap();

    client.login("ana@example.com", "secret1").await.unwrap();
    let tickets = client.my_tickets().await.unwrap();

    assert_eq!(tickets.len(), 1);
    assert_eq!(store.access_token().as_deref(), Some("new-token"));
}

#[tokio::test]
async fn test_explicit_refresh_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new-token" })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "old-token");
    h.client.refresh_session().await.unwrap();
    assert_eq!(h.store.access_token().as_deref(), Some("new-token"));
}

fn client_with(
    server: &MockServer,
    store: &MemorySessionStore,
    coordinator: &RefreshCoordinator,
    expired: &Arc<AtomicUsize>,
) -> CinemaClient {
    let counter = Arc::clone(expired);
    CinemaClient::builder()
        .base_url(format!("{}/api", server.uri()))
        .session_store(Arc::new(store.clone()))
        .refresh_coordinator(coordinator.clone())
        .on_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_shared_coordinator_failure_clears_every_store() {
    let server = MockServer::start().await;
    mount_rejects_old_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = RefreshCoordinator::new();
    let expired = Arc::new(AtomicUsize::new(0));
    let first_store = signed_in_store("old-token");
    let second_store = signed_in_store("old-token");
    let first = client_with(&server, &first_store, &coordinator, &expired);
    let second = client_with(&server, &second_store, &coordinator, &expired);

    let (a, b) = tokio::join!(first.my_tickets(), second.my_tickets());

    assert!(matches!(a, Err(ClientError::Unauthenticated(_))));
    assert!(matches!(b, Err(ClientError::Unauthenticated(_))));
    assert!(first_store.get().is_none());
    assert!(second_store.get().is_none());
    assert_eq!(coordinator.refresh_count(), 1);
    assert_eq!(expired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shared_coordinator_success_updates_every_store() {
    let server = MockServer::start().await;
    mount_rejects_old_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_json()))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "new-token" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = RefreshCoordinator::new();
    let expired = Arc::new(AtomicUsize::new(0));
    let first_store = signed_in_store("old-token");
    let second_store = signed_in_store("old-token");
    let first = client_with(&server, &first_store, &coordinator, &expired);
    let second = client_with(&server, &second_store, &coordinator, &expired);

    let (a, b) = tokio::join!(first.my_tickets(), second.my_tickets());

    assert_eq!(a.unwrap().len(), 1);
    assert_eq!(b.unwrap().len(), 1);
    assert_eq!(first_store.access_token().as_deref(), Some("new-token"));
    assert_eq!(second_store.access_token().as_deref(), Some("new-token"));
    // Identity survives the token swap in both stores
    assert_eq!(second_store.get().unwrap().user_id, Some(7));
    assert_eq!(coordinator.refresh_count(), 1);
    assert_eq!(expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_refresh_without_session_does_not_report_expiry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = RefreshCoordinator::new();
    let expired = Arc::new(AtomicUsize::new(0));
    let store = MemorySessionStore::new();
    let client = client_with(&server, &store, &coordinator, &expired);

    let result = client.my_tickets().await;

    assert!(matches!(result, Err(ClientError::Unauthenticated(_))));
    assert!(store.get().is_none());
    assert_eq!(expired.load(Ordering::SeqCst), 0);
}
