//! Fan-out/fan-in execution of independent per-element actions.
//!
//! [`run_parallel`] spawns one tokio task per element and joins every one of
//! them before returning. Workers only hand back their outcome; the tally is
//! owned by the coordinating `join_next` loop, so no lock is shared between
//! tasks. Outcomes are recorded in completion order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::obs::{emit_batch_finished, emit_batch_started};

/// Aggregate failure of a parallel batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{title}: {succeeded}/{total} succeeded\n{}", .errors.join("\n"))]
pub struct BatchError {
    /// Human readable name of the batch (e.g. `"removing containers"`).
    pub title: String,
    /// Elements whose action completed successfully.
    pub succeeded: usize,
    /// Elements submitted.
    pub total: usize,
    /// Error messages in the order they arrived.
    pub errors: Vec<String>,
}

/// Outcome counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTally {
    total: usize,
    succeeded: usize,
    errors: Vec<String>,
}

impl BatchTally {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// A batch is closed once every submitted element has reported.
    pub fn is_closed(&self) -> bool {
        self.succeeded + self.errors.len() == self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Partial success is failure: any recorded error fails the whole batch.
    pub fn into_result(self, title: &str) -> Result<(), BatchError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(BatchError {
            title: title.to_string(),
            succeeded: self.succeeded,
            total: self.total,
            errors: self.errors,
        })
    }
}

/// Results of a finished batch: the outputs of the elements that succeeded
/// plus the tally of every outcome.
#[derive(Debug)]
pub struct BatchOutcome<O> {
    pub outputs: Vec<O>,
    pub tally: BatchTally,
}

/// Run `action` for every element concurrently and wait for all of them,
/// keeping the output of each successful element.
///
/// There is no concurrency cap and no retry. A failing element never stops
/// its siblings. A task that panics is counted as a failure.
pub async fn run_parallel_collect<T, O, F, Fut, E>(
    title: &str,
    elements: Vec<T>,
    action: F,
) -> BatchOutcome<O>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let total = elements.len();
    emit_batch_started(title, total);
    let mut tally = BatchTally::new(total);
    let mut outputs = Vec::with_capacity(total);

    let action = Arc::new(action);
    let mut join_set = JoinSet::new();
    for element in elements {
        let action = Arc::clone(&action);
        join_set.spawn(async move { action(element).await.map_err(|e| e.to_string()) });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(output)) => {
                tally.record_success();
                outputs.push(output);
            }
            Ok(Err(message)) => tally.record_failure(message),
            Err(join_err) => tally.record_failure(format!("task aborted: {join_err}")),
        }
    }
    debug_assert!(tally.is_closed());

    emit_batch_finished(title, tally.succeeded(), total);
    BatchOutcome { outputs, tally }
}

/// Run `action` for every element concurrently and wait for all of them.
///
/// Partial success is failure: the batch fails if at least one element failed.
pub async fn run_parallel<T, F, Fut, E>(
    title: &str,
    elements: Vec<T>,
    action: F,
) -> Result<(), BatchError>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    run_parallel_collect(title, elements, action)
        .await
        .tally
        .into_result(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records the `event` field of every emitted event.
    #[derive(Clone, Default)]
    struct EventNames(Arc<Mutex<Vec<String>>>);

    struct EventField(Option<String>);

    impl Visit for EventField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "event" {
                self.0 = Some(value.to_string());
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
    }

    impl<S: Subscriber> Layer<S> for EventNames {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = EventField(None);
            event.record(&mut visitor);
            if let Some(name) = visitor.0 {
                self.0.lock().unwrap().push(name);
            }
        }
    }

    #[tokio::test]
    async fn empty_batch_is_success() {
        let result = run_parallel("nothing", Vec::<u32>::new(), |_| async {
            Err::<(), _>("never called")
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn empty_batch_emits_started_and_finished() {
        let names = EventNames::default();
        let subscriber = tracing_subscriber::registry().with(names.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let outcome = run_parallel_collect("nothing", Vec::<u32>::new(), |_| async {
            Ok::<_, String>(())
        })
        .await;

        assert!(outcome.tally.is_closed());
        assert_eq!(
            *names.0.lock().unwrap(),
            vec!["batch.started".to_string(), "batch.finished".to_string()]
        );
    }

    #[tokio::test]
    async fn every_element_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        run_parallel("count", (0..8).collect(), move |_: u32| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn collect_keeps_successful_outputs() {
        let outcome = run_parallel_collect("double", vec![1u32, 2, 3], |n| async move {
            if n == 2 {
                Err(format!("element {n} rejected"))
            } else {
                Ok(n * 2)
            }
        })
        .await;
        let mut outputs = outcome.outputs;
        outputs.sort_unstable();
        assert_eq!(outputs, vec![2, 6]);
        assert_eq!(outcome.tally.succeeded(), 2);
        assert_eq!(outcome.tally.errors().to_vec(), vec!["element 2 rejected".to_string()]);
    }

    #[tokio::test]
    async fn panicking_task_counts_as_failure() {
        let err = run_parallel("panics", vec![0u32, 1], |n| async move {
            if n == 1 {
                panic!("element exploded");
            }
            Ok::<(), String>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.succeeded, 1);
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].starts_with("task aborted"));
    }

    #[test]
    fn tally_closes_when_all_reported() {
        let mut tally = BatchTally::new(3);
        tally.record_success();
        tally.record_failure("x");
        assert!(!tally.is_closed());
        tally.record_success();
        assert!(tally.is_closed());
        assert_eq!(tally.failed(), 1);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn batch_error_display_has_count_and_messages() {
        let err = BatchTally {
            total: 3,
            succeeded: 1,
            errors: vec!["a failed".to_string(), "b failed".to_string()],
        }
        .into_result("removing network")
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "removing network: 1/3 succeeded\na failed\nb failed"
        );
    }
}
