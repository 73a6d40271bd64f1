use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use tracing::debug;

use crate::Result;

/// Deferred work the outer build must wait for before it finalizes.
///
/// Tasks are registered from any hook and do not start until
/// [`wait_all`](Self::wait_all) drives them. Tasks may register further tasks
/// while they run; `wait_all` keeps draining until a round finishes with
/// nothing new registered.
#[derive(Default)]
pub struct PhaseBarrier {
    pending: Mutex<Vec<BoxFuture<'static, Result<()>>>>,
    rounds: AtomicUsize,
}

impl std::fmt::Debug for PhaseBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseBarrier")
            .field("pending", &self.pending.lock().len())
            .field("rounds", &self.rounds.load(Ordering::Relaxed))
            .finish()
    }
}

impl PhaseBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.pending.lock().push(Box::pin(task));
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Rounds completed by `wait_all` so far.
    pub fn rounds(&self) -> usize {
        self.rounds.load(Ordering::Relaxed)
    }

    /// Await every registered task, including tasks registered meanwhile.
    ///
    /// All tasks of a round settle before the round's first error is returned.
    pub async fn wait_all(&self) -> Result<()> {
        loop {
            let batch = std::mem::take(&mut *self.pending.lock());
            if batch.is_empty() {
                return Ok(());
            }

            let round = self.rounds.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(round, tasks = batch.len(), "waiting on deferred build tasks");

            let results = join_all(batch).await;
            if let Some(err) = results.into_iter().find_map(Result::err) {
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_barrier_completes_immediately() {
        let barrier = PhaseBarrier::new();
        barrier.wait_all().await.unwrap();
        assert_eq!(barrier.rounds(), 0);
    }

    #[tokio::test]
    async fn tasks_registered_while_waiting_are_awaited() {
        let barrier = Arc::new(PhaseBarrier::new());
        let late_ran = Arc::new(AtomicBool::new(false));

        let inner = Arc::clone(&barrier);
        let flag = Arc::clone(&late_ran);
        barrier.register(async move {
            inner.register(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        barrier.wait_all().await.unwrap();
        assert!(late_ran.load(Ordering::SeqCst));
        assert_eq!(barrier.rounds(), 2);
        assert_eq!(barrier.pending(), 0);
    }

    #[tokio::test]
    async fn a_failure_lets_the_round_settle() {
        let barrier = PhaseBarrier::new();
        let sibling_ran = Arc::new(AtomicBool::new(false));

        barrier.register(async { Err(Error::InvalidConfig("boom".to_string())) });
        let flag = Arc::clone(&sibling_ran);
        barrier.register(async move {
            tokio::task::yield_now().await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let err = barrier.wait_all().await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(sibling_ran.load(Ordering::SeqCst));
    }
}
