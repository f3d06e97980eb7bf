//! Keyed state store for merchant ledgers.

use std::collections::HashMap;
use std::sync::Arc;

use common::MerchantId;
use domain::MerchantLedgerState;
use tokio::sync::RwLock;

/// In-memory map from merchant to its current ledger.
///
/// The store owns every ledger; readers get clones. Entries are created by
/// the first `put` for a key and are never evicted. The store performs no
/// business logic and does not serialize writers: callers must ensure that
/// all writes for one key come from a single task at a time.
#[derive(Clone, Default)]
pub struct LedgerStore {
    ledgers: Arc<RwLock<HashMap<MerchantId, MerchantLedgerState>>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current ledger for a merchant, if it has been created.
    pub async fn get(&self, merchant_id: &MerchantId) -> Option<MerchantLedgerState> {
        self.ledgers.read().await.get(merchant_id).cloned()
    }

    /// Stores the ledger for a merchant, replacing any previous one.
    pub async fn put(&self, merchant_id: MerchantId, state: MerchantLedgerState) {
        self.ledgers.write().await.insert(merchant_id, state);
    }

    /// Returns every ledger, ordered by merchant ID.
    pub async fn all(&self) -> Vec<MerchantLedgerState> {
        let mut ledgers: Vec<_> = self.ledgers.read().await.values().cloned().collect();
        ledgers.sort_by(|a, b| a.merchant_id.cmp(&b.merchant_id));
        ledgers
    }

    pub async fn len(&self) -> usize {
        self.ledgers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ledgers.read().await.is_empty()
    }

    /// Removes every ledger. Only used when a projection is rebuilt.
    pub async fn clear(&self) {
        self.ledgers.write().await.clear();
    }

    /// Number of ledgers without waiting on a writer; 0 if the lock is busy.
    pub fn try_len(&self) -> usize {
        self.ledgers.try_read().map(|l| l.len()).unwrap_or(0)
    }
}
