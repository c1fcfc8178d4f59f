use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use warden_auth::{AuthConfig, AuthError, Authenticator, HashParams};
use warden_db::{ManualClock, WardenDb};
use warden_migration::Migrator;

async fn setup(ttl: Duration) -> (Authenticator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let db = WardenDb::open_in_memory()
        .await
        .unwrap()
        .with_clock(clock.clone());
    Migrator::new(db.pool().clone())
        .apply_pending(None)
        .await
        .unwrap();

    let config = AuthConfig {
        token_ttl: ttl,
        hashing: HashParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
    };
    (Authenticator::new(db, config).unwrap(), clock)
}

#[tokio::test]
async fn alice_session_lifecycle() {
    let (auth, clock) = setup(Duration::minutes(15)).await;
    let alice = auth.register("alice", "s3cret").await.unwrap();

    let issued = auth.authenticate("alice", "s3cret").await.unwrap();

    clock.advance(Duration::minutes(10));
    let principal = auth.validate(&issued.token).await.unwrap();
    assert_eq!(principal.id, alice.id);

    clock.advance(Duration::minutes(6));
    assert!(matches!(
        auth.validate(&issued.token).await,
        Err(AuthError::TokenExpired)
    ));
}

#[tokio::test]
async fn expiry_boundary_is_exclusive() {
    let (auth, clock) = setup(Duration::seconds(60)).await;
    auth.register("alice", "s3cret").await.unwrap();
    let issued = auth.authenticate("alice", "s3cret").await.unwrap();

    clock.set(issued.expires_at - Duration::milliseconds(1));
    assert!(auth.validate(&issued.token).await.is_ok());

    clock.set(issued.expires_at);
    assert!(matches!(
        auth.validate(&issued.token).await,
        Err(AuthError::TokenExpired)
    ));
}

#[tokio::test]
async fn revocation_is_terminal_and_idempotent() {
    let (auth, _clock) = setup(Duration::hours(1)).await;
    auth.register("alice", "s3cret").await.unwrap();
    let issued = auth.authenticate("alice", "s3cret").await.unwrap();

    auth.revoke(&issued.token).await.unwrap();
    auth.revoke(&issued.token).await.unwrap();
    assert!(matches!(
        auth.validate(&issued.token).await,
        Err(AuthError::TokenRevoked)
    ));
}

#[tokio::test]
async fn expiry_is_reported_before_revocation() {
    let (auth, clock) = setup(Duration::minutes(1)).await;
    auth.register("alice", "s3cret").await.unwrap();
    let issued = auth.authenticate("alice", "s3cret").await.unwrap();
    auth.revoke(&issued.token).await.unwrap();

    clock.advance(Duration::hours(1));
    assert!(matches!(
        auth.validate(&issued.token).await,
        Err(AuthError::TokenExpired)
    ));
}

#[tokio::test]
async fn unknown_tokens() {
    let (auth, _clock) = setup(Duration::hours(1)).await;
    assert!(matches!(
        auth.validate("never-issued").await,
        Err(AuthError::TokenNotFound)
    ));
    assert!(matches!(
        auth.revoke("never-issued").await,
        Err(AuthError::TokenNotFound)
    ));
}

#[tokio::test]
async fn validation_does_not_write() {
    let (auth, clock) = setup(Duration::minutes(5)).await;
    auth.register("alice", "s3cret").await.unwrap();
    let issued = auth.authenticate("alice", "s3cret").await.unwrap();
    let before = auth.db().find_token(&issued.token).await.unwrap().unwrap();

    auth.validate(&issued.token).await.unwrap();
    clock.advance(Duration::minutes(10));
    let _ = auth.validate(&issued.token).await;

    let after = auth.db().find_token(&issued.token).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn each_login_gets_a_distinct_token() {
    let (auth, _clock) = setup(Duration::hours(1)).await;
    auth.register("alice", "s3cret").await.unwrap();
    let a = auth.authenticate("alice", "s3cret").await.unwrap();
    let b = auth.authenticate("alice", "s3cret").await.unwrap();
    assert_ne!(a.token, b.token);

    // Revoking one session leaves the other intact
    auth.revoke(&a.token).await.unwrap();
    assert!(auth.validate(&b.token).await.is_ok());
}

#[tokio::test]
async fn session_reports_expiry() {
    let (auth, _clock) = setup(Duration::minutes(30)).await;
    auth.register("alice", "s3cret").await.unwrap();
    let issued = auth.authenticate("alice", "s3cret").await.unwrap();

    let session = auth.session(&issued.token).await.unwrap();
    assert_eq!(session.expires_at, issued.expires_at);
    assert_eq!(session.principal.login, "alice");
}
