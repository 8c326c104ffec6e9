use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gatehouse_core::session::csrf::generate_csrf_secret;
use gatehouse_core::session::store::{
    generate_session_id, InMemoryStore, Session, SessionService, SessionStore,
};
use gatehouse_core::{GateError, TestApp};

fn sample_session(user_id: Option<i64>) -> Session {
    let now = Utc::now().naive_utc();
    Session {
        id: generate_session_id(),
        user_id,
        csrf_secret: generate_csrf_secret(),
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}

fn service_over(store: Arc<dyn SessionStore>) -> SessionService {
    let mut config = TestApp::test_config();
    config.store_timeout_secs = 1;
    SessionService::new(store, &config)
}

// ── In-memory store ──

#[tokio::test]
async fn test_create_and_get() {
    let store = InMemoryStore::new();
    let session = sample_session(Some(1));

    store.create(&session).await.unwrap();
    assert_eq!(store.get(&session.id).await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let store = InMemoryStore::new();
    assert_eq!(store.get("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_update_replaces_record() {
    let store = InMemoryStore::new();
    let mut session = sample_session(None);
    store.create(&session).await.unwrap();

    session.user_id = Some(9);
    store.update(&session).await.unwrap();

    assert_eq!(store.get(&session.id).await.unwrap().unwrap().user_id, Some(9));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = InMemoryStore::new();
    let session = sample_session(None);
    assert!(matches!(
        store.update(&session).await,
        Err(GateError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let store = InMemoryStore::new();
    let session = sample_session(None);
    store.create(&session).await.unwrap();

    store.destroy(&session.id).await.unwrap();
    store.destroy(&session.id).await.unwrap();
    assert_eq!(store.get(&session.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_updates_are_last_write_wins() {
    let store = InMemoryStore::new();
    let session = sample_session(None);
    store.create(&session).await.unwrap();

    let mut as_seven = session.clone();
    as_seven.user_id = Some(7);
    let mut as_eight = session.clone();
    as_eight.user_id = Some(8);

    let (a, b) = tokio::join!(store.update(&as_seven), store.update(&as_eight));
    a.unwrap();
    b.unwrap();

    // Whole-record last-write-wins: the surviving record is one of the two
    // writes, never a torn mix.
    let survived = store.get(&session.id).await.unwrap().unwrap();
    assert!(survived == as_seven || survived == as_eight);
}

// ── SessionService ──

#[tokio::test]
async fn test_load_passively_deletes_expired_sessions() {
    let store = InMemoryStore::new();
    let mut session = sample_session(Some(3));
    session.expires_at = Utc::now().naive_utc() - Duration::hours(1);
    store.create(&session).await.unwrap();

    let service = service_over(Arc::new(store.clone()));
    assert_eq!(service.load(&session.id).await.unwrap(), None);
    assert_eq!(store.get(&session.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_login_regenerates_id_and_secret() {
    let store = InMemoryStore::new();
    let service = service_over(Arc::new(store.clone()));

    let anonymous = service.create_anonymous().await.unwrap();
    let elevated = service.log_in(&anonymous, 42).await.unwrap();

    assert_ne!(elevated.id, anonymous.id);
    assert_ne!(elevated.csrf_secret, anonymous.csrf_secret);
    assert_eq!(elevated.user_id, Some(42));
    // The pre-login session is gone.
    assert_eq!(store.get(&anonymous.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_logout_regenerates_down_to_anonymous() {
    let store = InMemoryStore::new();
    let service = service_over(Arc::new(store.clone()));

    let anonymous = service.create_anonymous().await.unwrap();
    let elevated = service.log_in(&anonymous, 42).await.unwrap();
    let dropped = service.log_out(&elevated).await.unwrap();

    assert_ne!(dropped.id, elevated.id);
    assert_ne!(dropped.csrf_secret, elevated.csrf_secret);
    assert_eq!(dropped.user_id, None);
    assert_eq!(store.get(&elevated.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_service_destroy_is_idempotent() {
    let service = service_over(Arc::new(InMemoryStore::new()));
    let session = service.create_anonymous().await.unwrap();
    service.destroy(&session.id).await.unwrap();
    service.destroy(&session.id).await.unwrap();
}

// ── Failure handling: the store failing must never read as "anonymous" ──

struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, _id: &str) -> Result<Option<Session>, GateError> {
        Err(GateError::Internal("connection refused".to_string()))
    }

    async fn create(&self, _session: &Session) -> Result<(), GateError> {
        Err(GateError::Internal("connection refused".to_string()))
    }

    async fn update(&self, _session: &Session) -> Result<(), GateError> {
        Err(GateError::Internal("connection refused".to_string()))
    }

    async fn destroy(&self, _id: &str) -> Result<(), GateError> {
        Err(GateError::Internal("connection refused".to_string()))
    }
}

struct StalledStore;

#[async_trait]
impl SessionStore for StalledStore {
    async fn get(&self, _id: &str) -> Result<Option<Session>, GateError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn create(&self, _session: &Session) -> Result<(), GateError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(())
    }

    async fn update(&self, _session: &Session) -> Result<(), GateError> {
        Ok(())
    }

    async fn destroy(&self, _id: &str) -> Result<(), GateError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_store_failure_is_unavailable_not_anonymous() {
    let service = service_over(Arc::new(FailingStore));
    assert!(matches!(
        service.load("whatever").await,
        Err(GateError::SessionStoreUnavailable(_))
    ));
    assert!(matches!(
        service.create_anonymous().await,
        Err(GateError::SessionStoreUnavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_store_timeout_is_unavailable() {
    let service = service_over(Arc::new(StalledStore));
    assert!(matches!(
        service.load("whatever").await,
        Err(GateError::SessionStoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_not_found_is_preserved_through_the_service() {
    let service = service_over(Arc::new(InMemoryStore::new()));
    let session = sample_session(None);
    assert!(matches!(
        service.save(&session).await,
        Err(GateError::NotFound(_))
    ));
}
