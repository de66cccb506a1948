use crate::models::ContestId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map from contest IDs to their writer locks.
type LockMap = HashMap<ContestId, Arc<Mutex<()>>>;

/// Serializes confirmations per contest. Two confirmations for the same
/// contest never overlap; different contests proceed independently.
#[derive(Clone, Default)]
pub struct ContestLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl ContestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds the contest, then holds it until the
    /// returned lock is dropped.
    pub async fn acquire(&self, contest_id: &ContestId) -> ContestLock {
        let slot = {
            let mut locks = self.locks.lock().await;
            locks.entry(contest_id.clone()).or_default().clone()
        };
        let guard = slot.lock_owned().await;

        ContestLock {
            contest_id: contest_id.clone(),
            _guard: guard,
        }
    }
}

/// Exclusive right to write a contest's result. Released on drop.
pub struct ContestLock {
    contest_id: ContestId,
    _guard: OwnedMutexGuard<()>,
}

impl ContestLock {
    pub fn contest_id(&self) -> &ContestId {
        &self.contest_id
    }

    pub fn covers(&self, contest_id: &ContestId) -> bool {
        &self.contest_id == contest_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn second_writer_waits_for_first() {
        let locks = ContestLocks::new();
        let contest = ContestId::new("local.maidstone.shepway-south");
        let first = locks.acquire(&contest).await;

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let locks = locks.clone();
            let contest = contest.clone();
            let acquired = Arc::clone(&acquired);
            tokio::spawn(async move {
                let _lock = locks.acquire(&contest).await;
                acquired.store(true, Ordering::SeqCst);
            })
        };

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!acquired.load(Ordering::SeqCst));

        drop(first);
        waiter.await.unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn different_contests_do_not_block() {
        let locks = ContestLocks::new();
        let a = locks.acquire(&ContestId::new("parl.14419")).await;
        let b = locks.acquire(&ContestId::new("parl.14420")).await;

        assert!(a.covers(&ContestId::new("parl.14419")));
        assert!(!a.covers(b.contest_id()));
    }
}
