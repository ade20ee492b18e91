use keyed_async_cache::prelude::*;
use futures::{FutureExt, future::BoxFuture};
use serde::Serialize;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq)]
struct ProducerError(String);

/// Producer that counts its invocations and settles after a delay.
#[derive(Clone)]
struct CountingProducer {
    calls: Arc<AtomicU32>,
    args: Arc<Mutex<Vec<String>>>,
}

impl CountingProducer {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            args: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn resolve_after(
        &self,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, ProducerError>> {
        let calls = self.calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(200)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    fn reject_after(
        &self,
        message: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, ProducerError>> {
        let calls = self.calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(200)).await;
                Err(ProducerError(message.to_string()))
            }
            .boxed()
        }
    }

    fn with_param(
        &self,
        label: &'static str,
    ) -> impl FnOnce(Options) -> BoxFuture<'static, Result<String, ProducerError>> {
        let calls = self.calls.clone();
        let args = self.args.clone();
        move |options: Options| {
            calls.fetch_add(1, Ordering::SeqCst);
            args.lock().unwrap().push(options.param.clone());
            async move {
                sleep(Duration::from_millis(200)).await;
                Ok(format!("resolved with options {label}"))
            }
            .boxed()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Options {
    param: String,
}

fn options(param: &str) -> Options {
    Options {
        param: param.to_string(),
    }
}

/// Cache whose notifications are recorded for inspection.
fn recorded_cache() -> (AsyncCache, Arc<Mutex<Vec<AsyncCache>>>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let cache = create_cache(move |next| record.lock().unwrap().push(next));
    (cache, seen)
}

#[tokio::test(start_paused = true)]
async fn read_resolves_after_delay() {
    let (cache, seen) = recorded_cache();
    let producer = CountingProducer::new();

    assert_eq!(cache.read("n", producer.resolve_after(100)), Snapshot::Pending);
    assert_eq!(producer.calls(), 1);

    sleep(Duration::from_millis(300)).await;

    assert_eq!(seen.lock().unwrap().len(), 1, "notification fires once");
    let latest = seen.lock().unwrap()[0].clone();
    assert_eq!(
        latest.read("n", producer.resolve_after(0)),
        Snapshot::Resolved(100)
    );
    assert_eq!(producer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn read_rejects_after_delay() {
    let (cache, _) = recorded_cache();
    let producer = CountingProducer::new();

    assert!(cache.read("n", producer.reject_after("rejected")).is_pending());
    sleep(Duration::from_millis(300)).await;

    assert_eq!(
        cache.read("n", producer.reject_after("other")),
        Snapshot::Rejected(ProducerError("rejected".to_string()))
    );
    assert_eq!(producer.calls(), 1, "rejections are not retried");
}

#[tokio::test(start_paused = true)]
async fn pending_reads_are_deduplicated() {
    let (cache, seen) = recorded_cache();
    let producer = CountingProducer::new();

    for _ in 0..10 {
        assert!(cache.read("n", producer.resolve_after(1)).is_pending());
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(producer.calls(), 1);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn settled_entries_are_served_without_delay() {
    let (cache, _) = recorded_cache();
    let producer = CountingProducer::new();

    cache.read("entry1", producer.resolve_after(100));
    cache.read("entry2", producer.reject_after("rejected"));
    sleep(Duration::from_millis(300)).await;

    assert_eq!(
        (
            cache.read("entry1", producer.resolve_after(0)),
            cache.read("entry2", producer.resolve_after(0)),
        ),
        (
            Snapshot::Resolved(100),
            Snapshot::Rejected(ProducerError("rejected".to_string())),
        )
    );
    assert_eq!(producer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn param_reads_are_independent_entries() {
    let (cache, seen) = recorded_cache();
    let first = CountingProducer::new();
    let second = CountingProducer::new();

    let a = cache
        .read_with_param("entry", first.with_param("1"), options("value 1"))
        .unwrap();
    let b = cache
        .read_with_param("entry", second.with_param("2"), options("value 2"))
        .unwrap();
    assert!(a.is_pending() && b.is_pending());

    sleep(Duration::from_millis(300)).await;

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(
        cache
            .read_with_param("entry", first.with_param("x"), options("value 1"))
            .unwrap(),
        Snapshot::Resolved("resolved with options 1".to_string())
    );
    assert_eq!(
        cache
            .read_with_param("entry", second.with_param("x"), options("value 2"))
            .unwrap(),
        Snapshot::Resolved("resolved with options 2".to_string())
    );
    assert_eq!((first.calls(), second.calls()), (1, 1));
    assert_eq!(*first.args.lock().unwrap(), vec!["value 1".to_string()]);
    assert_eq!(*second.args.lock().unwrap(), vec!["value 2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn equal_encodings_share_one_entry() {
    #[derive(Serialize)]
    struct Reordered {
        param: String,
    }

    let (cache, _) = recorded_cache();
    let producer = CountingProducer::new();

    cache
        .read_with_param("entry", producer.with_param("1"), options("same"))
        .unwrap();
    let calls = producer.calls.clone();
    let aliased: Snapshot<String, ProducerError> = cache
        .read_with_param(
            "entry",
            move |_: Reordered| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("never".to_string()) }
            },
            Reordered {
                param: "same".to_string(),
            },
        )
        .unwrap();
    assert!(aliased.is_pending());

    sleep(Duration::from_millis(300)).await;
    assert_eq!(producer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_forces_a_new_run() {
    let (cache, seen) = recorded_cache();
    let count = Arc::new(AtomicU32::new(1));
    let runs = Arc::new(AtomicU32::new(0));

    let plain = |count: Arc<AtomicU32>, runs: Arc<AtomicU32>| {
        move || {
            runs.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(200)).await;
                Ok::<_, ProducerError>(format!("result {}", count.load(Ordering::SeqCst)))
            }
        }
    };
    let with_param = |count: Arc<AtomicU32>, runs: Arc<AtomicU32>| {
        move |param: String| {
            runs.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(200)).await;
                Ok::<_, ProducerError>(format!(
                    "result {} with {param}",
                    count.load(Ordering::SeqCst)
                ))
            }
        }
    };
    let read_both = |cache: &AsyncCache| {
        (
            cache.read("entry", plain(count.clone(), runs.clone())),
            cache
                .read_with_param(
                    "entry",
                    with_param(count.clone(), runs.clone()),
                    "param".to_string(),
                )
                .unwrap(),
        )
    };

    read_both(&cache);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        read_both(&cache),
        (
            Snapshot::Resolved("result 1".to_string()),
            Snapshot::Resolved("result 1 with param".to_string()),
        )
    );

    count.store(2, Ordering::SeqCst);
    cache.reset("entry");
    cache.reset_with_param("entry", &"param").unwrap();
    assert_eq!(read_both(&cache), (Snapshot::Pending, Snapshot::Pending));

    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        read_both(&cache),
        (
            Snapshot::Resolved("result 2".to_string()),
            Snapshot::Resolved("result 2 with param".to_string()),
        )
    );
    assert_eq!(runs.load(Ordering::SeqCst), 4);
    // two settlements, two resets, two settlements
    assert_eq!(seen.lock().unwrap().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn reset_during_flight_keeps_the_newer_result() {
    let (cache, _) = recorded_cache();

    let slow = || async {
        sleep(Duration::from_millis(500)).await;
        Ok::<_, ProducerError>("r1".to_string())
    };
    let fast = || async {
        sleep(Duration::from_millis(100)).await;
        Ok::<_, ProducerError>("r2".to_string())
    };

    assert!(cache.read("k", slow).is_pending());
    cache.reset("k");
    assert!(cache.read("k", fast).is_pending());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        cache.peek::<String, ProducerError>("k"),
        Snapshot::Resolved("r2".to_string())
    );

    sleep(Duration::from_millis(500)).await;
    assert_eq!(
        cache.peek::<String, ProducerError>("k"),
        Snapshot::Resolved("r2".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn default_cache_works_without_observers() {
    init();
    let cache = default_cache();
    let producer = CountingProducer::new();

    assert!(cache.read("global:n", producer.resolve_after(5)).is_pending());
    sleep(Duration::from_millis(300)).await;
    assert_eq!(
        get_global_cache()
            .unwrap()
            .read("global:n", producer.resolve_after(0)),
        Snapshot::Resolved(5)
    );
    assert_eq!(producer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn provider_drives_a_binding_loop() {
    let provider = CacheProvider::new();
    let mut changes = provider.subscribe();
    let producer = CountingProducer::new();
    let mut rendered = Vec::new();

    let render = |cache: &AsyncCache| -> Snapshot<u32, ProducerError> {
        cache.read("n", producer.resolve_after(100))
    };

    rendered.push(render(&provider.cache()));
    while rendered.last().is_some_and(Snapshot::is_pending) {
        changes.changed().await.unwrap();
        let cache = changes.borrow_and_update().clone();
        rendered.push(render(&cache));
    }

    assert_eq!(rendered, vec![Snapshot::Pending, Snapshot::Resolved(100)]);
    assert_eq!(producer.calls(), 1);
}

#[test]
fn key_recovers_after_its_runtime_shuts_down() {
    let (cache, seen) = recorded_cache();
    let producer = CountingProducer::new();
    let paused_runtime = || {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
    };

    let first = paused_runtime();
    first.block_on(async {
        assert!(cache.read("k", producer.resolve_after(1)).is_pending());
    });
    drop(first);

    assert!(!cache.is_in_flight("k"));
    assert_eq!(seen.lock().unwrap().len(), 1);

    let second = paused_runtime();
    second.block_on(async {
        assert!(cache.read("k", producer.resolve_after(2)).is_pending());
        sleep(Duration::from_millis(300)).await;
    });
    assert_eq!(producer.calls(), 2);
    assert_eq!(
        cache.peek::<u32, ProducerError>("k"),
        Snapshot::Resolved(2)
    );
}
