//! Ordering, exclusion, drain and failure behaviour of the pipeline
//!
//! Run with: cargo test --package fryer-pipeline --test ordering_tests

use fryer_pipeline::{
    FailureCause, Pipeline, PipelineError, PipelineEvent, PipelineOptions, PipelineState, Step,
    StepName,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Debug, thiserror::Error)]
#[error("step {0} failed")]
struct StepBroke(usize);

type Log = Vec<usize>;

fn delayed_push(n: usize, delay: Duration) -> Step<Log, StepBroke> {
    Step::new(format!("push-{n}"), move |mut log: Log| async move {
        tokio::time::sleep(delay).await;
        log.push(n);
        Ok(log)
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_first_step_still_runs_first() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());

    pipeline
        .enqueue(delayed_push(0, Duration::from_millis(80)))
        .unwrap();
    for n in 1..6 {
        pipeline.enqueue(delayed_push(n, Duration::ZERO)).unwrap();
    }

    let log = pipeline.shutdown().await.unwrap();
    assert_eq!(log, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn at_most_one_step_executes_at_a_time() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for n in 0..20 {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        pipeline
            .enqueue(Step::new("guarded", move |mut log: Log| async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis((n % 3) as u64)).await;
                tokio::task::yield_now().await;
                active.fetch_sub(1, Ordering::SeqCst);
                log.push(n);
                Ok(log)
            }))
            .unwrap();
    }

    let report = pipeline.wait_idle().await.unwrap();
    assert_eq!(report.completed, 20);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn drained_fires_once_after_burst() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());
    let mut events = pipeline.subscribe();

    for n in 0..5 {
        pipeline
            .enqueue(delayed_push(n, Duration::from_millis(5)))
            .unwrap();
    }

    let mut finished = 0;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("drain signal never arrived")
            .unwrap();
        match event {
            PipelineEvent::StepFinished { .. } => finished += 1,
            PipelineEvent::Drained { completed } => {
                assert_eq!(finished, 5, "drained before every step finished");
                assert_eq!(completed, 5);
                break;
            }
            PipelineEvent::StepStarted { .. } => {}
            PipelineEvent::Failed(failure) => panic!("unexpected failure: {failure}"),
        }
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(pipeline.status().drains, 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn wait_idle_does_not_resolve_while_step_running() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());
    pipeline
        .enqueue(delayed_push(0, Duration::from_millis(100)))
        .unwrap();

    let early = tokio::time::timeout(Duration::from_millis(30), pipeline.wait_idle()).await;
    assert!(early.is_err(), "wait_idle resolved while a step was running");
    assert_eq!(pipeline.state(), PipelineState::Draining);

    assert!(pipeline.wait_idle().await.is_ok());
}

#[tokio::test]
async fn each_burst_gets_its_own_drain() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());

    pipeline.enqueue(delayed_push(0, Duration::ZERO)).unwrap();
    assert_eq!(pipeline.wait_idle().await.unwrap().drains, 1);

    pipeline.enqueue(delayed_push(1, Duration::ZERO)).unwrap();
    pipeline.enqueue(delayed_push(2, Duration::ZERO)).unwrap();
    let report = pipeline.wait_idle().await.unwrap();
    assert_eq!(report.drains, 2);
    assert_eq!(report.completed, 3);
}

#[tokio::test]
async fn failure_halts_remaining_steps() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());
    let third_ran = Arc::new(AtomicUsize::new(0));

    pipeline.enqueue(delayed_push(1, Duration::ZERO)).unwrap();
    pipeline
        .enqueue(Step::new("two", |_log: Log| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(StepBroke(2))
        }))
        .unwrap();
    let counter = Arc::clone(&third_ran);
    pipeline
        .enqueue(Step::sync("three", move |log: Log| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(log)
        }))
        .unwrap();

    let err = pipeline.wait_idle().await.unwrap_err();
    let failure = err.failure().expect("step failure");
    assert_eq!(failure.step, StepName::from("two"));
    assert_eq!(failure.seq, 1);
    assert!(matches!(failure.cause, FailureCause::Step(StepBroke(2))));
    assert_eq!(failure.abandoned, vec![StepName::from("three")]);

    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(third_ran.load(Ordering::SeqCst), 0);

    let status = pipeline.status();
    assert_eq!(status.completed, 1);
    assert_eq!(status.pending, 0);

    assert!(matches!(
        pipeline.enqueue(delayed_push(4, Duration::ZERO)),
        Err(PipelineError::Failed(_))
    ));
    assert_eq!(third_ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_event_is_broadcast() {
    let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());
    let mut events = pipeline.subscribe();

    pipeline
        .enqueue(Step::sync("bad", |_log: Log| Err(StepBroke(0))))
        .unwrap();

    loop {
        match events.recv().await.unwrap() {
            PipelineEvent::Failed(failure) => {
                assert_eq!(failure.step.as_str(), "bad");
                break;
            }
            PipelineEvent::Drained { .. } => panic!("drained after failure"),
            _ => {}
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn execution_order_matches_enqueue_order(delays in prop::collection::vec(0u64..4, 1..12)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let log = runtime.block_on(async {
            let pipeline = Pipeline::<Log, StepBroke>::spawn(Vec::new(), PipelineOptions::default());
            for (n, delay) in delays.iter().enumerate() {
                pipeline
                    .enqueue(delayed_push(n, Duration::from_millis(*delay)))
                    .unwrap();
            }
            pipeline.shutdown().await.unwrap()
        });

        let expected: Vec<usize> = (0..delays.len()).collect();
        prop_assert_eq!(log, expected);
    }
}
