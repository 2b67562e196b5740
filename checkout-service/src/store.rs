use chrono::{DateTime, Utc};
use shared::{TransactionRecord, TransactionStatus};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use crate::error::StoreError;

type Result<T> = std::result::Result<T, StoreError>;

/// Whole-file JSON table of transaction records.
///
/// Every mutation reads the full array, changes it in memory and writes it
/// back through a temporary file. Mutations inside this process are
/// serialized; separate processes sharing the file are not coordinated.
pub struct TransactionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TransactionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, mut record: TransactionRecord) -> Result<TransactionRecord> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        if let Some(max_id) = records.iter().map(|r| r.id).max() {
            if record.id <= max_id {
                debug!("Transaction id {} already taken, using {}", record.id, max_id + 1);
                record.id = max_id + 1;
            }
        }

        records.push(record.clone());
        self.persist(&records).await?;

        info!("Stored transaction {} for customer {}", record.id, record.customer_id);
        Ok(record)
    }

    pub async fn list_all(&self) -> Result<Vec<TransactionRecord>> {
        self.load().await
    }

    /// Returns whether any record carried `order_id`.
    pub async fn update_status_by_order_id(&self, order_id: u64, status: TransactionStatus) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let mut updated = false;
        for record in records.iter_mut().filter(|r| r.order_id == Some(order_id)) {
            record.set_status(status);
            updated = true;
        }

        if updated {
            self.persist(&records).await?;
        }
        Ok(updated)
    }

    /// Links the first provisional record for `email` to `order_id`.
    /// Records that already carry an order id are never touched here.
    pub async fn update_by_email_where_order_id_null(
        &self,
        email: &str,
        order_id: u64,
        status: TransactionStatus,
    ) -> Result<Option<TransactionRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let Some(record) = records
            .iter_mut()
            .find(|r| r.is_provisional() && emails_match(&r.user.email, email))
        else {
            debug!("No provisional transaction found for {}", email);
            return Ok(None);
        };

        record.order_id = Some(order_id);
        record.set_status(status);
        let updated = record.clone();

        self.persist(&records).await?;
        info!("Transaction {} for {} linked to order {}", updated.id, email, order_id);
        Ok(Some(updated))
    }

    pub async fn find_by_order_id(&self, order_id: u64) -> Result<Option<TransactionRecord>> {
        Ok(self.load().await?.into_iter().find(|r| r.order_id == Some(order_id)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<TransactionRecord>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|r| emails_match(&r.user.email, email)))
    }

    /// Drops provisional records created before `cutoff`.
    pub async fn prune_provisional(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let before = records.len();
        records.retain(|r| !(r.is_provisional() && r.created_at < cutoff));
        let removed = before - records.len();

        if removed > 0 {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    async fn load(&self) -> Result<Vec<TransactionRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, records: &[TransactionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn emails_match(stored: &str, candidate: &str) -> bool {
    stored.trim().eq_ignore_ascii_case(candidate.trim())
}
