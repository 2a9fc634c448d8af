//! Integration tests for the public dispatcher API.
//!
//! These run on the multi-threaded runtime with real (short) sleeps to check
//! that the active-set bound holds when completions race each other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use taskq_dispatch::{BoxError, CompletionMode, DispatchError, Dispatcher, Phase, Unit};

const TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Tracks how many units are inside their body at once.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn gauged(gauge: &Arc<Gauge>, i: usize) -> Unit<usize> {
    let gauge = Arc::clone(gauge);
    // Spread of overlapping durations between 1 and 7 ms.
    let ms = (i * 37 % 7 + 1) as u64;
    if i % 3 == 0 {
        Unit::immediate(move || {
            gauge.enter();
            std::thread::sleep(Duration::from_millis(1));
            gauge.leave();
            Ok::<_, BoxError>(i)
        })
    } else {
        Unit::deferred(move || async move {
            gauge.enter();
            tokio::time::sleep(Duration::from_millis(ms)).await;
            gauge.leave();
            Ok::<_, BoxError>(i)
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn active_units_never_exceed_limit_under_stress() {
    init_tracing();
    let gauge = Arc::new(Gauge::default());
    let total = 120;
    let limit = 5;

    let dispatcher = Dispatcher::new(limit, (0..total).map(|i| gauged(&gauge, i))).unwrap();
    let mut results = timeout(TIMEOUT, dispatcher.run()).await.unwrap().unwrap();

    assert_eq!(results.len(), total);
    assert!(gauge.peak() <= limit, "peak {} exceeded limit", gauge.peak());

    let metrics = dispatcher.metrics();
    assert!(metrics.peak_active <= limit);
    assert_eq!(metrics.units_started, total as u64);
    assert_eq!(metrics.units_succeeded, total as u64);

    results.sort_unstable();
    assert_eq!(results, (0..total).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pushers_are_all_collected() {
    init_tracing();
    let gauge = Arc::new(Gauge::default());
    let limit = 3;
    let dispatcher: Dispatcher<usize> = Dispatcher::builder()
        .limit(limit)
        .completion(CompletionMode::UntilClosed)
        .build()
        .unwrap();

    let runner = dispatcher.clone();
    let run = tokio::spawn(async move { runner.run().await });

    let mut pushers = Vec::new();
    for p in 0..4 {
        let dispatcher = dispatcher.clone();
        let gauge = Arc::clone(&gauge);
        pushers.push(tokio::spawn(async move {
            for i in 0..10 {
                dispatcher.push(gauged(&gauge, p * 10 + i)).unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for pusher in pushers {
        pusher.await.unwrap();
    }
    dispatcher.close();

    let results = timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(results.len(), 40);
    assert!(gauge.peak() <= limit);
    assert_eq!(dispatcher.phase(), Phase::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_reports_only_the_error() {
    init_tracing();
    let dispatcher = Dispatcher::new(
        2,
        vec![
            Unit::deferred(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<u32, _>(std::io::Error::new(std::io::ErrorKind::Other, "backend down"))
            })
            .with_label("fetch"),
            Unit::deferred(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<u32, BoxError>(1)
            })
            .with_label("slow"),
        ],
    )
    .unwrap();

    let err = timeout(TIMEOUT, dispatcher.run()).await.unwrap().unwrap_err();
    match &err {
        DispatchError::UnitExecution { label, source } => {
            assert_eq!(label, "fetch");
            assert_eq!(source.to_string(), "backend down");
        }
        other => panic!("unexpected error: {other}"),
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    let metrics = dispatcher.metrics();
    assert_eq!(metrics.units_discarded, 1);
    assert_eq!(metrics.units_finished(), 2);
}
