use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};
use crate::store::TransactionStore;

/// Periodically removes provisional records that never got an order id.
pub struct ProvisionalSweeper {
    store: Arc<TransactionStore>,
    max_age: chrono::Duration,
    interval: Duration,
}

impl ProvisionalSweeper {
    pub fn new(store: Arc<TransactionStore>, max_age: chrono::Duration, interval: Duration) -> Self {
        Self { store, max_age, interval }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.interval.max(Duration::from_secs(1)));

        loop {
            interval.tick().await;

            if let Err(e) = self.sweep().await {
                error!("Error pruning provisional transactions: {}", e);
            }
        }
    }

    async fn sweep(&self) -> Result<usize> {
        if self.max_age <= chrono::Duration::zero() {
            warn!("Provisional TTL {} is not positive, skipping prune", self.max_age);
            return Ok(0);
        }

        let cutoff = Utc::now() - self.max_age;
        let removed = self.store.prune_provisional(cutoff).await?;

        if removed > 0 {
            info!("Pruned {} provisional transactions created before {}", removed, cutoff);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::user_snapshot;
    use shared::TransactionRecord;

    #[tokio::test]
    async fn sweep_uses_configured_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TransactionStore::new(dir.path().join("db.json")));

        let mut stale = TransactionRecord::new(1, None, user_snapshot("old@example.com"));
        stale.created_at = Utc::now() - chrono::Duration::hours(49);
        store.append(stale).await.unwrap();
        store.append(TransactionRecord::new(2, None, user_snapshot("new@example.com"))).await.unwrap();

        let sweeper = ProvisionalSweeper::new(store.clone(), chrono::Duration::hours(48), Duration::from_secs(60));
        assert_eq!(sweeper.sweep().await.unwrap(), 1);
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
        assert_eq!(store.list_all().await.unwrap()[0].customer_id, 2);
    }

    #[tokio::test]
    async fn non_positive_age_prunes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TransactionStore::new(dir.path().join("db.json")));
        store.append(TransactionRecord::new(1, None, user_snapshot("new@example.com"))).await.unwrap();

        let sweeper = ProvisionalSweeper::new(store.clone(), chrono::Duration::hours(-1), Duration::from_secs(60));
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
