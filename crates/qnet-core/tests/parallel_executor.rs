//! Fan-out/fan-in executor contract tests.

use std::time::Duration;

use qnet_core::executor::{run_parallel, run_parallel_collect};

#[tokio::test]
async fn tally_closes_for_every_batch_size() {
    for n in 0..12usize {
        let outcome = run_parallel_collect("sizes", (0..n).collect(), |i| async move {
            if i % 3 == 0 {
                Err(format!("element {i}"))
            } else {
                Ok(i)
            }
        })
        .await;
        let tally = outcome.tally;
        assert!(tally.is_closed(), "batch of {n} left open");
        assert_eq!(tally.succeeded() + tally.failed(), n);
        assert_eq!(outcome.outputs.len(), tally.succeeded());
    }
}

#[tokio::test]
async fn single_failure_fails_the_whole_batch() {
    let err = run_parallel("starting", vec![0u32, 1, 2, 3], |i| async move {
        if i == 2 {
            Err("element 2 refused".to_string())
        } else {
            Ok(())
        }
    })
    .await
    .unwrap_err();

    assert_eq!(err.succeeded, 3);
    assert_eq!(err.total, 4);
    assert_eq!(err.errors, vec!["element 2 refused".to_string()]);
    assert!(err.to_string().starts_with("starting: 3/4 succeeded"));
}

#[tokio::test(start_paused = true)]
async fn errors_are_reported_in_completion_order() {
    let err = run_parallel("ordering", vec![30u64, 10, 20], |delay| async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Err::<(), _>(format!("finished after {delay}ms"))
    })
    .await
    .unwrap_err();

    assert_eq!(
        err.errors,
        vec![
            "finished after 10ms".to_string(),
            "finished after 20ms".to_string(),
            "finished after 30ms".to_string(),
        ]
    );
    assert_eq!(err.succeeded, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_elements_are_not_abandoned_after_an_early_failure() {
    let outcome = run_parallel_collect("slow", vec![0u64, 50, 100], |delay| async move {
        if delay == 0 {
            return Err("failed immediately".to_string());
        }
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(delay)
    })
    .await;

    let mut outputs = outcome.outputs;
    outputs.sort_unstable();
    assert_eq!(outputs, vec![50, 100]);
    assert_eq!(outcome.tally.failed(), 1);
}
