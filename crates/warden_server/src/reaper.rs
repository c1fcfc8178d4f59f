//! Background purge of dead tokens.
//!
//! Validation never deletes anything, so expired and revoked rows pile up
//! until this task removes the ones older than the grace period.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_db::{DbError, DbResult, WardenDb};

/// Purge tokens that expired or were revoked more than `grace` ago.
pub async fn reap_once(db: &WardenDb, grace: chrono::Duration) -> DbResult<u64> {
    let cutoff = db
        .clock()
        .now()
        .checked_sub_signed(grace)
        .ok_or_else(|| DbError::invalid_argument(format!("reap grace {grace} out of range")))?;
    db.purge_tokens(cutoff).await
}

/// Run [`reap_once`] every `interval` until `shutdown` flips to `true`.
pub fn spawn_reaper(
    db: WardenDb,
    interval: Duration,
    grace: chrono::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Token reaper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match reap_once(&db, grace).await {
                        Ok(0) => {}
                        Ok(n) => debug!("Reaped {} tokens", n),
                        // Transient; try again next tick
                        Err(e) => warn!("Token purge failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Token reaper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use warden_db::ManualClock;
    use warden_migration::Migrator;

    async fn store(clock: Arc<ManualClock>) -> WardenDb {
        let db = WardenDb::open_in_memory().await.unwrap().with_clock(clock);
        Migrator::new(db.pool().clone())
            .apply_pending(None)
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn grace_period_is_respected() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = store(clock.clone()).await;
        let alice = db.create_principal("alice").await.unwrap();
        let issued = db
            .issue_token(&alice.id, chrono::Duration::minutes(1))
            .await
            .unwrap();

        clock.advance(chrono::Duration::minutes(30));
        let grace = chrono::Duration::hours(1);
        assert_eq!(reap_once(&db, grace).await.unwrap(), 0);
        assert!(db.find_token(&issued.token).await.unwrap().is_some());

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(reap_once(&db, grace).await.unwrap(), 1);
        assert!(db.find_token(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrepresentable_grace_is_an_error() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = store(clock).await;
        let err = reap_once(&db, chrono::Duration::MAX).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn reaper_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = store(clock).await;
        let (tx, rx) = watch::channel(false);

        let handle = spawn_reaper(
            db,
            Duration::from_millis(10),
            chrono::Duration::zero(),
            rx,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
