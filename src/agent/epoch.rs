use tokio::sync::{RwLock, RwLockReadGuard};

/// Generation counter for auto-mode runs.
///
/// A cycle captures the epoch when it starts and may only record its result
/// while holding a [`CycleEpoch::pin`] guard for that same value. Advancing
/// takes the write lock, so it waits for any in-progress record and every
/// record after it sees the new value.
#[derive(Debug, Default)]
pub struct CycleEpoch {
    current: RwLock<u64>,
}

impl CycleEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> u64 {
        *self.current.read().await
    }

    /// Bump the epoch, returning the new value
    pub async fn advance(&self) -> u64 {
        let mut current = self.current.write().await;
        *current += 1;
        *current
    }

    pub async fn is_current(&self, epoch: u64) -> bool {
        *self.current.read().await == epoch
    }

    /// Hold the epoch at `epoch` for as long as the guard lives, or `None` if it has moved on
    pub async fn pin(&self, epoch: u64) -> Option<RwLockReadGuard<'_, u64>> {
        let guard = self.current.read().await;
        (*guard == epoch).then_some(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn advance_is_monotonic() {
        let epoch = CycleEpoch::new();
        assert_eq!(epoch.current().await, 0);
        assert_eq!(epoch.advance().await, 1);
        assert_eq!(epoch.advance().await, 2);
        assert!(epoch.is_current(2).await);
        assert!(!epoch.is_current(1).await);
    }

    #[tokio::test]
    async fn stale_epoch_cannot_be_pinned() {
        let epoch = CycleEpoch::new();
        let started = epoch.advance().await;
        assert!(epoch.pin(started).await.is_some());
        epoch.advance().await;
        assert!(epoch.pin(started).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn advance_waits_for_pinned_record() {
        let epoch = Arc::new(CycleEpoch::new());
        let guard = epoch.pin(0).await.unwrap();

        let bumper = {
            let epoch = epoch.clone();
            tokio::spawn(async move { epoch.advance().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!bumper.is_finished());

        drop(guard);
        assert_eq!(bumper.await.unwrap(), 1);
    }
}
