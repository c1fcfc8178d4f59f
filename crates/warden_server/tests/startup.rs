use warden_db::{StoreOptions, WardenDb};
use warden_migration::Migrator;
use warden_server::startup::check_schema;
use warden_server::{SchemaCheck, ServerError};

#[tokio::test]
async fn matching_version_starts() {
    let db = WardenDb::open_in_memory().await.unwrap();
    Migrator::new(db.pool().clone())
        .apply_pending(None)
        .await
        .unwrap();

    let version = check_schema(&db, warden_db::SCHEMA_VERSION, SchemaCheck::Fatal)
        .await
        .unwrap();
    assert_eq!(version, warden_db::SCHEMA_VERSION);
}

#[tokio::test]
async fn behind_store_refuses_to_start() {
    let db = WardenDb::open_in_memory().await.unwrap();
    Migrator::new(db.pool().clone())
        .apply_pending(Some(2))
        .await
        .unwrap();

    let err = check_schema(&db, warden_db::SCHEMA_VERSION, SchemaCheck::Fatal)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServerError::SchemaMismatch {
            recorded: 2,
            expected: 3
        }
    ));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn never_migrated_store_refuses_to_start() {
    let db = WardenDb::open_in_memory().await.unwrap();
    let err = check_schema(&db, warden_db::SCHEMA_VERSION, SchemaCheck::Fatal)
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::SchemaMismatch { recorded: 0, .. }));
}

#[tokio::test]
async fn store_ahead_of_build_refuses_to_start() {
    let db = WardenDb::open_in_memory().await.unwrap();
    Migrator::new(db.pool().clone())
        .apply_pending(None)
        .await
        .unwrap();

    let err = check_schema(&db, warden_db::SCHEMA_VERSION - 1, SchemaCheck::Fatal)
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn warn_mode_continues_on_mismatch() {
    let db = WardenDb::open_in_memory().await.unwrap();
    Migrator::new(db.pool().clone())
        .apply_pending(Some(1))
        .await
        .unwrap();

    let version = check_schema(&db, warden_db::SCHEMA_VERSION, SchemaCheck::Warn)
        .await
        .unwrap();
    assert_eq!(version, 1);
}

#[tokio::test]
async fn held_migration_lock_refuses_to_start() {
    let db = WardenDb::open_in_memory().await.unwrap();
    Migrator::new(db.pool().clone())
        .apply_pending(None)
        .await
        .unwrap();
    hold_migration_lock(&db).await;

    let err = check_schema(&db, warden_db::SCHEMA_VERSION, SchemaCheck::Fatal)
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::MigrationInProgress { ref holder } if holder == "deploy-42"));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn unreachable_store_exits_with_three() {
    let dir = tempfile::tempdir().unwrap();
    // No mode=rwc: the service never creates the store file.
    let url = format!("sqlite://{}", dir.path().join("missing.db").display());
    let err = WardenDb::connect(&url, &StoreOptions::default())
        .await
        .map_err(ServerError::from)
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

async fn hold_migration_lock(db: &WardenDb) {
    sqlx::query("INSERT INTO migration_lock (id, holder, acquired_at) VALUES (1, 'deploy-42', 0)")
        .execute(db.pool())
        .await
        .unwrap();
}
