use chrono::{Duration, Timelike, Utc};
use gatehouse_core::migrations::{Migrator, MigratorTrait};
use gatehouse_core::session::csrf::generate_csrf_secret;
use gatehouse_core::session::db_store::SeaOrmSessionStore;
use gatehouse_core::session::store::{generate_session_id, Session, SessionStore};
use gatehouse_core::{GateError, TestApp};

async fn sqlite_store() -> SeaOrmSessionStore {
    let config = TestApp::test_config();
    let db = gatehouse_core::db::connect("sqlite::memory:", &config)
        .await
        .expect("Failed to open in-memory sqlite");
    Migrator::up(&db, None).await.expect("Failed to migrate");
    SeaOrmSessionStore::new(db)
}

fn sample_session(user_id: Option<i64>) -> Session {
    // Whole-second timestamps survive the sqlite round trip untouched.
    let now = Utc::now().naive_utc().with_nanosecond(0).unwrap();
    Session {
        id: generate_session_id(),
        user_id,
        csrf_secret: generate_csrf_secret(),
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}

#[tokio::test]
async fn test_create_and_get() {
    let store = sqlite_store().await;
    let session = sample_session(Some(5));

    store.create(&session).await.unwrap();

    let loaded = store.get(&session.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, session.id);
    assert_eq!(loaded.user_id, Some(5));
    assert_eq!(loaded.csrf_secret, session.csrf_secret);
    assert_eq!(loaded.expires_at, session.expires_at);
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let store = sqlite_store().await;
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_replaces_record() {
    let store = sqlite_store().await;
    let mut session = sample_session(None);
    store.create(&session).await.unwrap();

    session.user_id = Some(11);
    session.csrf_secret = generate_csrf_secret();
    store.update(&session).await.unwrap();

    let loaded = store.get(&session.id).await.unwrap().unwrap();
    assert_eq!(loaded.user_id, Some(11));
    assert_eq!(loaded.csrf_secret, session.csrf_secret);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = sqlite_store().await;
    let session = sample_session(None);
    assert!(matches!(
        store.update(&session).await,
        Err(GateError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let store = sqlite_store().await;
    let session = sample_session(None);
    store.create(&session).await.unwrap();

    store.destroy(&session.id).await.unwrap();
    store.destroy(&session.id).await.unwrap();
    assert!(store.get(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_anonymous_sessions_store_null_user() {
    let store = sqlite_store().await;
    let session = sample_session(None);
    store.create(&session).await.unwrap();

    let loaded = store.get(&session.id).await.unwrap().unwrap();
    assert_eq!(loaded.user_id, None);
}
