//! Single-consumer aggregation of collection outcomes.

use super::outcome::{CollectionOutcome, Failure};
use super::project::ProjectRecord;
use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "  pipeline";

enum Message<R> {
    Outcome(CollectionOutcome<R>),
    Done,
}

/// Everything the consumer has aggregated, in arrival order.
#[derive(Debug)]
pub struct Collected<R> {
    pub records: Vec<ProjectRecord<R>>,
    pub failures: Vec<Failure>,
}

impl<R> Default for Collected<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// The producing end of a [`ResultPipeline`].
///
/// Cheap to clone; each collection task owns one. Enqueueing never waits on the consumer.
#[derive(Debug)]
pub struct Producer<R> {
    sender: UnboundedSender<Message<R>>,
}

impl<R> Clone for Producer<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R> Producer<R> {
    /// Hand an outcome over to the consumer.
    ///
    /// Returns `false` if the consumer has already stopped, in which case the outcome is dropped.
    pub fn enqueue(&self, outcome: CollectionOutcome<R>) -> bool {
        self.sender.send(Message::Outcome(outcome)).is_ok()
    }
}

/// Decouples many concurrent producers from one sequential consumer.
///
/// Producers push outcomes onto an unbounded queue. A dedicated consumer task drains it,
/// appending successes to the record list and failures to the failure list. Since only the
/// consumer ever writes those lists, producers never contend on them; the orchestrator reads them
/// once, after the consumer has stopped.
#[derive(Debug)]
pub struct ResultPipeline<R> {
    sender: UnboundedSender<Message<R>>,
    consumer: JoinHandle<()>,
    collected: Arc<Mutex<Collected<R>>>,
}

impl<R: Send + 'static> ResultPipeline<R> {
    /// Start the consumer. `poll_interval` bounds how long it blocks on an empty queue at a time.
    #[must_use]
    pub fn start(poll_interval: Duration) -> Self {
        let (sender, receiver) = unbounded_channel();
        let collected = Arc::new(Mutex::new(Collected::default()));
        let consumer = tokio::spawn(consume(receiver, Arc::clone(&collected), poll_interval));

        Self {
            sender,
            consumer,
            collected,
        }
    }

    #[must_use]
    pub fn producer(&self) -> Producer<R> {
        Producer {
            sender: self.sender.clone(),
        }
    }

    /// Send the done marker, wait up to `join_timeout` for the consumer to drain, and return
    /// what it aggregated.
    ///
    /// Call this only once every producer has finished or been abandoned. Outcomes enqueued after
    /// the marker are dropped. If the consumer fails to stop in time it is aborted and whatever it
    /// had aggregated so far is returned.
    pub async fn finish(mut self, join_timeout: Duration) -> Collected<R> {
        if self.sender.send(Message::Done).is_err() {
            log::debug!(target: LOG_TARGET, "Consumer stopped before the done marker was sent");
        }

        match tokio::time::timeout(join_timeout, &mut self.consumer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!(target: LOG_TARGET, "Result consumer failed: {e}"),
            Err(_) => {
                log::error!(
                    target: LOG_TARGET,
                    "Result consumer did not finish within {:.1}s, returning partial results",
                    join_timeout.as_secs_f64()
                );
                self.consumer.abort();
            }
        }

        core::mem::take(&mut *self.collected.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

async fn consume<R>(mut receiver: UnboundedReceiver<Message<R>>, collected: Arc<Mutex<Collected<R>>>, poll_interval: Duration) {
    let mut received = 0usize;

    loop {
        let message = match tokio::time::timeout(poll_interval, receiver.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                log::debug!(target: LOG_TARGET, "All producers gone, consumer stopping");
                break;
            }
            Err(_) => continue,
        };

        match message {
            Message::Done => break,
            Message::Outcome(outcome) => {
                received += 1;
                let mut guard = collected.lock().unwrap_or_else(PoisonError::into_inner);
                match outcome {
                    CollectionOutcome::Success(record) => guard.records.push(record),
                    CollectionOutcome::Failure(failure) => guard.failures.push(failure),
                }
            }
        }
    }

    log::debug!(target: LOG_TARGET, "Consumer aggregated {received} outcome(s)");
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::collect::{ErrorCategory, ProjectDescriptor};

    fn project(id: u64) -> ProjectDescriptor {
        ProjectDescriptor::new(id, format!("fp-{id}"), format!("project-{id}"))
    }

    #[tokio::test]
    async fn successes_and_failures_are_split() {
        let pipeline = ResultPipeline::<u32>::start(Duration::from_millis(10));
        let producer = pipeline.producer();

        assert!(producer.enqueue(CollectionOutcome::Success(ProjectRecord::new(project(1), 10))));
        assert!(producer.enqueue(CollectionOutcome::Failure(Failure::classified(&project(2), "404"))));
        assert!(producer.enqueue(CollectionOutcome::Success(ProjectRecord::new(project(3), 30))));

        let collected = pipeline.finish(Duration::from_secs(5)).await;
        assert_eq!(collected.records.len(), 2);
        assert_eq!(collected.failures.len(), 1);
        assert_eq!(collected.failures[0].category, ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn single_producer_order_is_preserved() {
        let pipeline = ResultPipeline::<u64>::start(Duration::from_millis(10));
        let producer = pipeline.producer();

        for id in 0..50 {
            let _ = producer.enqueue(CollectionOutcome::Success(ProjectRecord::new(project(id), id)));
        }

        let collected = pipeline.finish(Duration::from_secs(5)).await;
        let ids: Vec<u64> = collected.records.iter().map(|r| r.data).collect();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn many_concurrent_producers() {
        let pipeline = ResultPipeline::<u64>::start(Duration::from_millis(10));

        let tasks: Vec<_> = (0..20u64)
            .map(|worker| {
                let producer = pipeline.producer();
                tokio::spawn(async move {
                    for i in 0..25u64 {
                        let id = worker * 100 + i;
                        let _ = producer.enqueue(CollectionOutcome::Success(ProjectRecord::new(project(id), id)));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        let collected = pipeline.finish(Duration::from_secs(5)).await;
        assert_eq!(collected.records.len(), 500);
        assert!(collected.failures.is_empty());
    }

    #[tokio::test]
    async fn consumer_survives_idle_polls() {
        let pipeline = ResultPipeline::<u8>::start(Duration::from_millis(5));
        let producer = pipeline.producer();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = producer.enqueue(CollectionOutcome::Success(ProjectRecord::new(project(1), 1)));

        let collected = pipeline.finish(Duration::from_secs(5)).await;
        assert_eq!(collected.records.len(), 1);
    }

    #[tokio::test]
    async fn outcomes_after_done_are_dropped() {
        let pipeline = ResultPipeline::<u8>::start(Duration::from_millis(5));
        let producer = pipeline.producer();

        let collected = pipeline.finish(Duration::from_secs(5)).await;
        assert!(collected.records.is_empty());
        assert!(collected.failures.is_empty());

        assert!(!producer.enqueue(CollectionOutcome::Success(ProjectRecord::new(project(1), 1))));
    }
}
