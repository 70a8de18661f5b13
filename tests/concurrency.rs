//! Cross-thread behaviour of the registry and the reservoirs.

use std::sync::Arc;
use std::thread;

use metrics_instruments::{
    get_or_register_counter, Histogram, Registry, Sample, UniformSample,
};

const FANOUT: usize = 16;

#[test]
fn concurrent_get_or_register_converges_on_one_counter() {
    let registry = Arc::new(Registry::new());
    let incs_per_thread = 1_000i64;

    let mut handles = Vec::new();
    for _ in 0..FANOUT {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            let counter = get_or_register_counter("requests", Some(&registry)).unwrap();
            for _ in 0..incs_per_thread {
                counter.inc(1);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let counter = registry.get_or_register_counter("requests").unwrap();
    assert_eq!(counter.count(), FANOUT as i64 * incs_per_thread);
}

#[test]
fn concurrent_sample_updates_and_reads() {
    let sample = Arc::new(UniformSample::new(100));
    for i in 0..100 {
        sample.update(i);
    }

    let writer = {
        let sample = Arc::clone(&sample);
        thread::spawn(move || {
            for i in 0..10_000 {
                sample.update(i);
            }
        })
    };

    // Read-side statistics race against the writer; they must never observe
    // torn state, only some prefix of the updates.
    for _ in 0..1_000 {
        let count = sample.count();
        assert!((100..=10_100).contains(&count));
        let _ = sample.mean();
        let _ = sample.percentile(0.5);
    }
    writer.join().unwrap();

    assert_eq!(sample.count(), 10_100);
    assert_eq!(sample.size(), 100);
}

#[test]
fn concurrent_histogram_updates() {
    let histogram = Histogram::new(UniformSample::new(1028));

    let mut handles = Vec::new();
    for t in 0..FANOUT {
        let histogram = histogram.clone();
        handles.push(thread::spawn(move || {
            for i in 0..500 {
                histogram.update((t * 500 + i) as i64);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(histogram.count(), FANOUT as u64 * 500);
    assert_eq!(histogram.sample().size(), 1028);
}

#[test]
fn registry_lifecycle_end_to_end() {
    let registry = Registry::new();

    let counter = registry.get_or_register_counter("widgets").unwrap();
    counter.inc(17);

    let gauge = registry.get_or_register_gauge("red_balloons").unwrap();
    gauge.update(99);

    registry
        .register("sizes", Histogram::new(UniformSample::new(100)))
        .unwrap();

    let meter = registry.get_or_register_meter("events").unwrap();
    meter.mark(3);

    let timer = registry.get_or_register_timer("latency").unwrap();
    timer.time(|| {});

    let all = registry.get_all();
    assert_eq!(all.len(), 5);
    assert!(all.contains_key("widgets"));
    assert!(all.contains_key("latency"));

    registry.unregister_all();
    assert!(registry.get_all().is_empty());

    // The stopped meter no longer accepts marks.
    meter.mark(10);
    assert_eq!(meter.count(), 3);
}
