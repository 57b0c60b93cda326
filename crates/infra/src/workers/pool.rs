//! Polling worker pool: claim, deliver, finalize.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mailspool_core::{Job, RetryDecision, RetryPolicy};

use crate::jobs::store::JobStore;
use crate::mailer::Mailer;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of independent polling loops.
    pub worker_count: usize,
    /// Fixed wait between poll attempts per worker.
    pub poll_interval: Duration,
    /// Max jobs claimed per poll.
    pub batch_size: u32,
    /// Delivery attempt budget per job.
    pub max_retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            poll_interval: Duration::from_secs(2),
            batch_size: 10,
            max_retries: 3,
        }
    }
}

/// Handle to request shutdown of a running pool and wait for its workers.
pub struct WorkerPoolHandle {
    shutdown: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Signal all workers and wait for each loop to exit.
    ///
    /// Workers only observe the signal at their tick boundary; a worker
    /// blocked inside a delivery or storage call finishes that call first.
    /// Callers that need a hard bound should wrap this in a timeout.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for join in self.joins {
            let _ = join.await;
        }
    }
}

/// Drives delivery of claimed jobs at a steady cadence.
///
/// Workers coordinate only through the store's atomic claim; within one
/// worker, a claimed batch is processed strictly sequentially.
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    mailer: Arc<dyn Mailer>,
    cfg: PoolConfig,
    policy: RetryPolicy,
}

impl WorkerPool {
    pub fn new(store: Arc<dyn JobStore>, mailer: Arc<dyn Mailer>, cfg: PoolConfig) -> Self {
        let policy = RetryPolicy::new(cfg.max_retries);
        Self {
            store,
            mailer,
            cfg,
            policy,
        }
    }

    /// Launch the configured number of worker loops.
    pub fn start(self) -> WorkerPoolHandle {
        info!(workers = self.cfg.worker_count, "starting email workers");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = Arc::new(self);

        let joins = (0..pool.cfg.worker_count)
            .map(|worker_id| {
                let pool = pool.clone();
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    pool.worker_loop(worker_id, shutdown).await;
                })
            })
            .collect();

        WorkerPoolHandle {
            shutdown: shutdown_tx,
            joins,
        }
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id, "worker started");

        let mut ticker = tokio::time::interval(self.cfg.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(worker_id, "worker shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.process_batch(worker_id).await;
                }
            }
        }
    }

    /// One poll cycle: claim up to `batch_size` jobs and deliver them in order.
    ///
    /// Storage errors abandon the affected step only; the loop always reaches
    /// the next tick.
    async fn process_batch(&self, worker_id: usize) {
        let jobs = match self.store.claim_batch(self.cfg.batch_size).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(worker_id, error = %e, "failed claiming jobs");
                return;
            }
        };

        for job in jobs {
            self.process_job(worker_id, &job).await;
        }
    }

    async fn process_job(&self, worker_id: usize, job: &Job) {
        debug!(worker_id, job_id = %job.id, "delivering email job");

        if let Err(e) = self.mailer.deliver(&job.to, &job.subject, &job.body).await {
            self.handle_failure(worker_id, job, &e.to_string()).await;
            return;
        }

        if let Err(e) = self.store.mark_sent(job.id).await {
            error!(worker_id, job_id = %job.id, error = %e, "failed marking job sent");
            return;
        }

        debug!(worker_id, job_id = %job.id, "job sent");
    }

    async fn handle_failure(&self, worker_id: usize, job: &Job, delivery_error: &str) {
        match self.policy.on_failure(job.attempts) {
            RetryDecision::GiveUp => {
                warn!(
                    worker_id,
                    job_id = %job.id,
                    error = delivery_error,
                    "retry budget exhausted, failing job"
                );
                if let Err(e) = self.store.mark_failed(job.id, delivery_error).await {
                    error!(worker_id, job_id = %job.id, error = %e, "failed marking job failed");
                }
            }
            RetryDecision::Retry { attempts } => {
                warn!(
                    worker_id,
                    job_id = %job.id,
                    attempt = attempts,
                    error = delivery_error,
                    "delivery attempt failed"
                );
                if let Err(e) = self.store.increment_attempts(job.id).await {
                    error!(worker_id, job_id = %job.id, error = %e, "failed incrementing attempts");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use mailspool_core::{EmailMessage, JobId, JobStatus};

    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::mailer::DeliveryError;

    /// Mailer that fails the first `failures` calls, then succeeds.
    struct FlakyMailer {
        failures: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<String>>,
    }

    impl FlakyMailer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }

        fn reliable() -> Self {
            Self::new(0)
        }
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn deliver(&self, to: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(DeliveryError::Rejected(format!(
                    "451 temporary failure #{}",
                    call + 1
                )));
            }
            self.delivered.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    async fn enqueue(store: &InMemoryJobStore, to: &str) -> JobId {
        store
            .create(EmailMessage::new(to, "subject", "body").unwrap())
            .await
            .unwrap()
    }

    fn pool(
        store: Arc<InMemoryJobStore>,
        mailer: Arc<FlakyMailer>,
        max_retries: u32,
    ) -> WorkerPool {
        WorkerPool::new(
            store,
            mailer,
            PoolConfig {
                worker_count: 1,
                poll_interval: Duration::from_millis(10),
                batch_size: 10,
                max_retries,
            },
        )
    }

    #[tokio::test]
    async fn successful_delivery_marks_job_sent() {
        let store = InMemoryJobStore::arc();
        let mailer = Arc::new(FlakyMailer::reliable());
        let id = enqueue(&store, "a@example.com").await;

        pool(store.clone(), mailer.clone(), 3).process_batch(0).await;

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Sent);
        assert!(job.sent_at.is_some());
        assert_eq!(job.subject, "subject");
        assert_eq!(job.body, "body");
        assert_eq!(*mailer.delivered.lock().unwrap(), vec!["a@example.com"]);
    }

    #[tokio::test]
    async fn retryable_failure_leaves_job_processing() {
        let store = InMemoryJobStore::arc();
        let mailer = Arc::new(FlakyMailer::new(10));
        let id = enqueue(&store, "a@example.com").await;

        let pool = pool(store.clone(), mailer, 3);
        pool.process_batch(0).await;

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.attempts, 1);
        assert!(job.error_message.is_none());

        // Claims only see pending jobs, so the next cycle does not retry it.
        pool.process_batch(0).await;
        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn third_failure_is_terminal_with_last_error_message() {
        let store = InMemoryJobStore::arc();
        let mailer = Arc::new(FlakyMailer::new(10));
        let id = enqueue(&store, "a@example.com").await;

        let pool = pool(store.clone(), mailer, 3);

        // Two recorded failures, then the terminal third.
        for _ in 0..2 {
            pool.process_batch(0).await;
            let job = store.get(id).await.unwrap().unwrap();
            pool.process_job(0, &job).await;
        }

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("smtp rejected: 451 temporary failure #3")
        );
        // attempts is bumped only on the retry branch, so the stored counter
        // lags the real attempt count by one.
        assert_eq!(job.attempts, 2);

        // Terminal jobs are never claimed again.
        pool.process_batch(0).await;
        let after = store.get(id).await.unwrap().unwrap();
        assert_eq!(after, job);
    }

    #[tokio::test]
    async fn batch_continues_past_individual_failures() {
        let store = InMemoryJobStore::arc();
        // First delivery in the batch fails, the rest succeed.
        let mailer = Arc::new(FlakyMailer::new(1));
        let first = enqueue(&store, "first@example.com").await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = enqueue(&store, "second@example.com").await;

        pool(store.clone(), mailer.clone(), 3).process_batch(0).await;

        assert_eq!(
            store.get(first).await.unwrap().unwrap().status,
            JobStatus::Processing
        );
        assert_eq!(
            store.get(second).await.unwrap().unwrap().status,
            JobStatus::Sent
        );
    }

    #[tokio::test]
    async fn started_pool_drains_queue_and_shuts_down() {
        let store = InMemoryJobStore::arc();
        let mailer = Arc::new(FlakyMailer::reliable());
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(enqueue(&store, &format!("u{i}@example.com")).await);
        }

        let handle = WorkerPool::new(
            store.clone(),
            mailer.clone(),
            PoolConfig {
                worker_count: 3,
                poll_interval: Duration::from_millis(5),
                batch_size: 2,
                max_retries: 3,
            },
        )
        .start();

        // Poll until every job is finalized.
        for _ in 0..100 {
            let mut all_sent = true;
            for id in &ids {
                if store.get(*id).await.unwrap().unwrap().status != JobStatus::Sent {
                    all_sent = false;
                    break;
                }
            }
            if all_sent {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        handle.shutdown().await;

        for id in ids {
            assert_eq!(store.get(id).await.unwrap().unwrap().status, JobStatus::Sent);
        }
        // Every job delivered exactly once.
        assert_eq!(mailer.delivered.lock().unwrap().len(), 5);
    }
}
