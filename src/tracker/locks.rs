use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::PairKey;

/// 按用户对加锁，保证同一用户对的 enter / continue / exit 串行执行
#[derive(Debug, Default)]
pub struct PairLocks {
    locks: Mutex<HashMap<PairKey, Arc<AsyncMutex<()>>>>,
}

impl PairLocks {
    pub async fn lock(&self, pair: &PairKey) -> PairGuard<'_> {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(pair.clone()).or_default().clone()
        };
        let guard = entry.clone().lock_owned().await;

        PairGuard {
            owner: self,
            pair: pair.clone(),
            entry,
            guard: Some(guard),
        }
    }

    /// 当前登记的锁数量
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct PairGuard<'a> {
    owner: &'a PairLocks,
    pair: PairKey,
    entry: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        // 只剩表内与本 guard 两个引用时说明没有等待者，可以移除
        if Arc::strong_count(&self.entry) == 2 {
            locks.remove(&self.pair);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_released_and_removed() {
        let locks = PairLocks::default();
        let pair = PairKey::new("a", "b");
        {
            let _guard = locks.lock(&pair).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_pair_is_serialized() {
        let locks = Arc::new(PairLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&PairKey::new("a", "b")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
