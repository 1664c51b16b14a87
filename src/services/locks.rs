use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{ Mutex, OwnedMutexGuard };
use uuid::Uuid;

/// One async mutex per wallet. Holders of a wallet's guard are the only
/// writers of its balance bookkeeping.
#[derive(Default)]
pub struct WalletLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, wallet_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(wallet_id).or_default().clone()
        };

        lock.lock_owned().await
    }

    pub async fn remove(&self, wallet_id: Uuid) {
        self.locks.lock().await.remove(&wallet_id);
    }
}
