use crate::engine::Engine;
use log::{debug, info};
use std::sync::Arc;

/// Writes the state out whenever the engine asks for it, off the request path.
/// A burst of votes arriving during one write produces a single follow-up write.
pub async fn run_persister(engine: Arc<Engine>) {
    info!("Persister started");
    loop {
        engine.save_requested().await;
        debug!("Saving state");
        engine.persist().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{MemoryStore, StateStore};
    use crate::error::StoreError;
    use crate::models::{Direction, PersistedState};
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    // Every write takes as long as a slow disk
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl StateStore for SlowStore {
        async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
            Ok(None)
        }

        async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.save(state).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_disk_does_not_slow_voting() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(300),
        });
        let engine = Arc::new(Engine::start(Config::default(), store.clone()).await);
        let persister = tokio::spawn(run_persister(Arc::clone(&engine)));

        let started = Instant::now();
        let votes: Vec<_> = (0..10)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    let voter = format!("v{}", i);
                    engine.submit_vote(1, &voter, &voter, Direction::Up).await
                })
            })
            .collect();
        for vote in votes {
            vote.await.unwrap().unwrap();
        }
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_millis(300), "ten votes took {:?}", elapsed);

        persister.abort();
    }

    #[tokio::test]
    async fn requested_saves_reach_the_store() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(Engine::start(Config::default(), store.clone()).await);
        let persister = tokio::spawn(run_persister(Arc::clone(&engine)));

        engine.submit_vote(1, "a", "a", Direction::Up).await.unwrap();
        engine.close_round(1).await.unwrap();

        let saved = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(state) = store.saved().await {
                    if state.clock.active_round_number == 2 {
                        return state;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("the closed round was never saved");
        persister.abort();

        assert_eq!(saved.score, 80.0);
        assert_eq!(saved.history.len(), 2);
    }
}
