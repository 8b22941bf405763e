//! Benchmarks for grok compilation and record filtering.
//!
//! These benchmarks measure pattern expansion cost and steady-state matching
//! throughput for typical log formats, single record and batched.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use grok_engine::{compile, Event, GrokConfig, GrokEngine, PatternRegistry};

const SYSLOG_LINE: &str =
    "Mar 16 00:01:25 evita postfix/smtpd[1713]: connect from camomile.cloud9.net[168.100.1.3]";

const APACHE_LINE: &str = r#"83.149.9.216 - - [17/May/2015:10:05:03 +0000] "GET /presentations/logstash-monitorama-2013/images/kibana-search.png HTTP/1.1" 200 203023 "http://semicomplete.com/presentations/logstash-monitorama-2013/" "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_9_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/32.0.1700.77 Safari/537.36""#;

/// Build an engine for `pattern` with the default timeout enabled.
fn engine_for(pattern: &str) -> GrokEngine {
    GrokEngine::new(GrokConfig::new().with_match("message", [pattern])).expect("engine builds")
}

/// Benchmark expansion and regex compilation of common patterns.
fn bench_compile(c: &mut Criterion) {
    let registry = PatternRegistry::with_builtins();
    let mut group = c.benchmark_group("compile");

    for (name, pattern) in [
        ("simple", "%{IP:client} %{WORD:method} %{NUMBER:bytes:int}"),
        ("syslog", "%{SYSLOGLINE}"),
        ("combined_apache", "%{COMBINEDAPACHELOG}"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), pattern, |b, pattern| {
            b.iter(|| compile(black_box(pattern), &registry, true).expect("pattern compiles"))
        });
    }

    group.finish();
}

/// Benchmark matching a single record, hit and miss.
fn bench_single_record(c: &mut Criterion) {
    let syslog = engine_for("%{SYSLOGLINE}");
    let apache = engine_for("%{COMBINEDAPACHELOG}");

    let mut group = c.benchmark_group("single_record");

    group.bench_function("syslog_hit", |b| {
        b.iter(|| {
            let mut event = Event::with_message(black_box(SYSLOG_LINE));
            black_box(syslog.filter(&mut event))
        })
    });

    group.bench_function("apache_hit", |b| {
        b.iter(|| {
            let mut event = Event::with_message(black_box(APACHE_LINE));
            black_box(apache.filter(&mut event))
        })
    });

    group.bench_function("apache_miss", |b| {
        b.iter(|| {
            let mut event = Event::with_message(black_box(SYSLOG_LINE));
            black_box(apache.filter(&mut event))
        })
    });

    group.finish();
}

/// Benchmark batch filtering across the rayon pool.
fn bench_batch(c: &mut Criterion) {
    let engine = engine_for("%{SYSLOGLINE}");
    let mut group = c.benchmark_group("batch");

    for batch_size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("syslog", batch_size),
            &batch_size,
            |b, &batch_size| {
                b.iter_batched(
                    || vec![Event::with_message(SYSLOG_LINE); batch_size],
                    |mut events| black_box(engine.filter_batch(&mut events)),
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_single_record, bench_batch);
criterion_main!(benches);
