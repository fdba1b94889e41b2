//! Per-node run serialization.
//!
//! One async mutex per node. Runs for the same node queue behind each
//! other; runs for different nodes never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tnode_core::NodeId;

type LockTable = DashMap<NodeId, Arc<Mutex<()>>>;

#[derive(Debug, Default, Clone)]
pub struct NodeLocks {
    locks: Arc<LockTable>,
}

/// Exclusive access to one node. Dropping it releases the lock and forgets
/// the node once no other task holds or awaits it.
#[derive(Debug)]
pub struct NodeLockGuard {
    node_id: NodeId,
    locks: Arc<LockTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NodeLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters and holders keep their own clone of the mutex.
        self.locks
            .remove_if(&self.node_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl NodeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `node_id`. Held until the guard drops.
    pub async fn acquire(&self, node_id: NodeId) -> NodeLockGuard {
        // Clone the Arc out so the map shard is not borrowed across the await.
        let lock = self.locks.entry(node_id).or_default().clone();
        let guard = lock.lock_owned().await;
        NodeLockGuard {
            node_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Whether a run for `node_id` currently holds the lock.
    pub fn is_locked(&self, node_id: NodeId) -> bool {
        self.locks
            .get(&node_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of nodes with a lock held or awaited.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_node_is_exclusive() {
        let locks = NodeLocks::new();
        let guard = locks.acquire(NodeId(1)).await;
        assert!(locks.is_locked(NodeId(1)));

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(NodeId(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(!locks.is_locked(NodeId(1)));
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn released_locks_are_forgotten() {
        let locks = NodeLocks::new();
        for node in 0..50 {
            let _guard = locks.acquire(NodeId(node)).await;
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_is_queued() {
        let locks = NodeLocks::new();
        let guard = locks.acquire(NodeId(1)).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(NodeId(1)).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.tracked(), 1);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(locks.is_locked(NodeId(1)));

        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn different_nodes_do_not_contend() {
        let locks = NodeLocks::new();
        let _a = locks.acquire(NodeId(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(NodeId(2))).await;
        assert!(b.is_ok());
    }
}
