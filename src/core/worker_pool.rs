use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use super::pipeline::ProductPipeline;
use crate::error::{ScrapeError, ScrapeResult};
use crate::log_warn;
use crate::logging::{LogContext, PerformanceLogger};
use crate::models::ProductRecord;
use crate::scraper::{Page, SessionFactory};

/// Result of one target, tagged with the worker that ran it
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: String,
    pub worker: usize,
    pub duration: Duration,
    pub result: ScrapeResult<ProductRecord>,
}

type Queue = Mutex<mpsc::UnboundedReceiver<(usize, String)>>;

/// Runs targets over one or more sessions pulling from a shared queue.
///
/// All workers are futures polled on the calling task, so sessions never
/// cross threads. With a single session targets run strictly in order.
pub struct WorkerPool<'a, F: SessionFactory> {
    factory: &'a F,
    pipeline: &'a ProductPipeline,
    workers: usize,
    dispatch_delay: Duration,
    run_id: String,
}

impl<'a, F: SessionFactory> WorkerPool<'a, F> {
    pub fn new(factory: &'a F, pipeline: &'a ProductPipeline, workers: usize) -> Self {
        Self {
            factory,
            pipeline,
            workers: workers.max(1),
            dispatch_delay: Duration::ZERO,
            run_id: String::new(),
        }
    }

    /// Pause between handing targets out; only applies with several sessions
    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Outcomes come back in input order. Fails only when no session opens.
    pub async fn run(&self, targets: &[String]) -> ScrapeResult<Vec<TargetOutcome>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let sessions = self.open_sessions().await?;
        let delay = if sessions.len() > 1 { self.dispatch_delay } else { Duration::ZERO };

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: Queue = Mutex::new(receiver);

        let dispatcher = async move {
            for (index, target) in targets.iter().enumerate() {
                if index > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if sender.send((index, target.clone())).is_err() {
                    break;
                }
            }
        };

        let workers = sessions
            .iter()
            .enumerate()
            .map(|(i, session)| self.work(i + 1, session, &queue));

        let (_, results) = futures::future::join(dispatcher, futures::future::join_all(workers)).await;

        let mut outcomes: Vec<(usize, TargetOutcome)> = results.into_iter().flatten().collect();

        // Left over when every worker stopped early
        let mut receiver = queue.into_inner();
        while let Ok((index, target)) = receiver.try_recv() {
            let context = LogContext::new("worker_pool", "drain_queue")
                .with_run_id(self.run_id.clone())
                .with_target(target.clone())
                .with_error_category("session");
            log_warn!(context, "No worker left for target");
            outcomes.push((
                index,
                TargetOutcome {
                    target,
                    worker: 0,
                    duration: Duration::ZERO,
                    result: Err(ScrapeError::session("no live session left to process target")),
                },
            ));
        }

        for (i, session) in sessions.iter().enumerate() {
            if let Err(e) = session.close().await {
                warn!("Closing session {} failed: {}", i + 1, e);
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    async fn open_sessions(&self) -> ScrapeResult<Vec<F::Session>> {
        let mut sessions = Vec::with_capacity(self.workers);
        let mut last_error = None;

        for worker in 1..=self.workers {
            match self.factory.open().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!("Worker {} could not start a {} session: {}", worker, self.factory.name(), e);
                    last_error = Some(e);
                }
            }
        }

        if sessions.is_empty() {
            return Err(last_error.unwrap_or_else(|| ScrapeError::session("no session could be started")));
        }

        info!("Started {} of {} {} sessions", sessions.len(), self.workers, self.factory.name());
        Ok(sessions)
    }

    async fn work(&self, worker: usize, session: &F::Session, queue: &Queue) -> Vec<(usize, TargetOutcome)> {
        let mut outcomes = Vec::new();

        loop {
            let Some((index, target)) = queue.lock().await.recv().await else {
                break;
            };

            let mut context = LogContext::new("worker_pool", "scrape_target")
                .with_run_id(self.run_id.clone())
                .with_target(target.clone())
                .with_worker(worker);
            if let Ok(url) = self.pipeline.navigator().product_url(&target) {
                context = context.with_url(url.as_str());
            }
            let perf = PerformanceLogger::new(context.clone());

            let result = self.pipeline.scrape(session, &target).await;
            let duration = match &result {
                Ok(record) => perf.finish_with_status(&format!("Saved {}", record.id), "saved"),
                Err(e) => perf.finish_with_error(&format!("Skipped {}", target), e),
            };

            let fatal = match &result {
                Err(e) if !e.skips_target() => Some(e.to_string()),
                _ => None,
            };
            outcomes.push((index, TargetOutcome { target, worker, duration, result }));

            if let Some(error) = fatal {
                let context = context.with_status("stopped");
                log_warn!(context, error, "Worker stopping after an unrecoverable error");
                break;
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::rate_limiter::RateLimiter;
    use crate::scraper::testing::{product_dom, test_config, FakeSessionFactory, FakeSite};

    fn site() -> FakeSite {
        FakeSite::new()
            .page("https://shop.example.com/products/IE3439/", product_dom("Sample Shoe"))
            .failing("https://shop.example.com/products/BROKEN/")
            .page("https://shop.example.com/products/IF9280/", product_dom("Second Shoe"))
    }

    fn targets(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sequential_continues_after_failed_target() {
        let pipeline = ProductPipeline::new(&test_config(), RateLimiter::default()).unwrap();
        let factory = FakeSessionFactory::new(site());

        let outcomes = WorkerPool::new(&factory, &pipeline, 1)
            .run(&targets(&["IE3439", "BROKEN", "IF9280"]))
            .await
            .unwrap();

        assert_eq!(factory.opened(), 1);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].result.as_ref().unwrap().name, "Sample Shoe");
        assert_eq!(outcomes[1].result.as_ref().unwrap_err().category(), "navigation");
        assert_eq!(outcomes[2].result.as_ref().unwrap().name, "Second Shoe");
    }

    #[tokio::test]
    async fn test_pooled_keeps_input_order() {
        let pipeline = ProductPipeline::new(&test_config(), RateLimiter::default()).unwrap();
        let factory = FakeSessionFactory::new(site());

        let ids = ["IF9280", "IE3439", "BROKEN", "IE3439", "IF9280"];
        let outcomes = WorkerPool::new(&factory, &pipeline, 3)
            .with_dispatch_delay(Duration::from_millis(5))
            .run(&targets(&ids))
            .await
            .unwrap();

        assert_eq!(factory.opened(), 3);
        let order: Vec<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(order, ids);
        assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 4);
        assert!(outcomes.iter().all(|o| (1..=3).contains(&o.worker)));
    }

    #[tokio::test]
    async fn test_worker_without_session_exits() {
        let pipeline = ProductPipeline::new(&test_config(), RateLimiter::default()).unwrap();
        let factory = FakeSessionFactory::new(site()).with_max_sessions(1);

        let outcomes = WorkerPool::new(&factory, &pipeline, 4)
            .run(&targets(&["IE3439", "IF9280"]))
            .await
            .unwrap();

        assert_eq!(factory.opened(), 1);
        assert!(outcomes.iter().all(|o| o.worker == 1 && o.result.is_ok()));
    }

    #[tokio::test]
    async fn test_targets_queued_behind_a_lost_session_are_reported() {
        let pipeline = ProductPipeline::new(&test_config(), RateLimiter::default()).unwrap();
        let site = site().session_lost("https://shop.example.com/products/CRASH1/");
        let factory = FakeSessionFactory::new(site);

        let outcomes = WorkerPool::new(&factory, &pipeline, 1)
            .run(&targets(&["IE3439", "CRASH1", "IF9280", "BROKEN"]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 4);
        let order: Vec<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(order, vec!["IE3439", "CRASH1", "IF9280", "BROKEN"]);

        assert!(outcomes[0].result.is_ok());
        assert_eq!(outcomes[1].worker, 1);
        assert_eq!(outcomes[1].result.as_ref().unwrap_err().category(), "session");
        for leftover in &outcomes[2..] {
            assert_eq!(leftover.worker, 0);
            assert_eq!(leftover.duration, Duration::ZERO);
            assert_eq!(leftover.result.as_ref().unwrap_err().category(), "session");
        }
    }

    #[tokio::test]
    async fn test_no_session_is_fatal() {
        let pipeline = ProductPipeline::new(&test_config(), RateLimiter::default()).unwrap();
        let factory = FakeSessionFactory::new(site()).with_max_sessions(0);

        let err = WorkerPool::new(&factory, &pipeline, 2)
            .run(&targets(&["IE3439"]))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "session");
    }

    #[tokio::test]
    async fn test_empty_target_list_opens_nothing() {
        let pipeline = ProductPipeline::new(&test_config(), RateLimiter::default()).unwrap();
        let factory = FakeSessionFactory::new(site());

        let outcomes = WorkerPool::new(&factory, &pipeline, 2).run(&[]).await.unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(factory.opened(), 0);
    }
}
