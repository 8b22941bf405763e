//! Integration tests for timeout-bounded matching.
//!
//! Every timeout here is triggered by `(.*a){30}` against a run of `a`s, which
//! backtracks exponentially. Abandoned evaluations keep running on their
//! executor threads until the test process exits, so the number of
//! pathological matches is kept small.

use grok_engine::{
    Deadline, Event, FieldOutcome, GrokConfig, GrokEngine, MatchOutcome, PatternCompiler,
    PatternRegistry, TimeoutEnforcer, TimeoutScope,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const PATHOLOGICAL: &str = "(.*a){30}";
const MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// Scheduling slack allowed on top of deadline + monitor interval.
const SLACK: Duration = Duration::from_millis(750);

fn pathological_input() -> String {
    "a".repeat(70)
}

/// Route engine logs to the test harness; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine(config: GrokConfig) -> GrokEngine {
    init_tracing();
    GrokEngine::new(config.with_monitor_interval(MONITOR_INTERVAL)).expect("engine should build")
}

#[test]
fn test_timeout_tags_record() {
    let engine = engine(
        GrokConfig::new()
            .with_match("message", [PATHOLOGICAL])
            .with_timeout(Duration::from_millis(100)),
    );

    let started = Instant::now();
    let mut event = Event::with_message(pathological_input());
    let outcome = engine.filter(&mut event);

    assert!(outcome.is_timed_out());
    assert!(!outcome.is_failed());
    assert!(event.has_tag("_groktimeout"));
    assert!(!event.has_tag("_grokparsefailure"));
    assert!(started.elapsed() < Duration::from_millis(100) + MONITOR_INTERVAL + SLACK);
    assert_eq!(engine.enforcer().in_flight(), 0);
}

#[test]
fn test_custom_timeout_tag() {
    let engine = engine(
        GrokConfig::new()
            .with_match("message", [PATHOLOGICAL])
            .with_timeout(Duration::from_millis(100))
            .with_tag_on_timeout("too_slow"),
    );
    let mut event = Event::with_message(pathological_input());
    engine.filter(&mut event);
    assert_eq!(event.tags(), vec!["too_slow"]);
}

#[test]
fn test_pooled_deadline_bounds_many_patterns() {
    let patterns = vec![PATHOLOGICAL; 10];
    let engine = engine(
        GrokConfig::new()
            .with_match("message", patterns)
            .with_break_on_match(false)
            .with_timeout(Duration::from_millis(500))
            .with_timeout_scope(TimeoutScope::Field),
    );

    let started = Instant::now();
    let mut event = Event::with_message(pathological_input());
    let outcome = engine.filter(&mut event);
    let elapsed = started.elapsed();

    assert!(outcome.is_timed_out());
    assert!(
        elapsed < Duration::from_millis(500) + MONITOR_INTERVAL + SLACK,
        "took {elapsed:?}"
    );
    assert!(event.has_tag("_groktimeout"));
}

/// A failing pattern whose backtracking cost grows polynomially with the
/// input length, sized so one attempt takes at least `min` on this machine.
fn slow_but_bounded(min: Duration) -> (String, String, Duration) {
    let pattern = "^(.*a){4}$".to_string();
    let registry = PatternRegistry::with_builtins();
    let matcher = PatternCompiler::new(&registry).compile(&pattern).unwrap();

    let mut len = 40;
    loop {
        let input = format!("{}c", "a".repeat(len));
        let single = (0..3)
            .map(|_| {
                let started = Instant::now();
                assert!(matcher.execute(&input).unwrap().is_none());
                started.elapsed()
            })
            .min()
            .unwrap();
        if single >= min || len >= 4000 {
            return (pattern, input, single);
        }
        len = len * 3 / 2;
    }
}

#[test]
fn test_pattern_scope_gives_each_attempt_a_fresh_budget() {
    let (pattern, input, single) = slow_but_bounded(Duration::from_millis(25));
    let timeout = single * 5;
    let patterns = vec![pattern.as_str(); 15];

    let per_attempt = engine(
        GrokConfig::new()
            .with_match("message", patterns.clone())
            .with_timeout(timeout)
            .with_timeout_scope(TimeoutScope::Pattern),
    );
    let mut event = Event::with_message(input.clone());
    let outcome = per_attempt.filter(&mut event);

    assert_eq!(outcome.field("message"), Some(FieldOutcome::NotMatched));
    assert_eq!(event.tags(), vec!["_grokparsefailure"]);

    let pooled = engine(
        GrokConfig::new()
            .with_match("message", patterns)
            .with_timeout(timeout)
            .with_timeout_scope(TimeoutScope::Field),
    );
    let mut event = Event::with_message(input);
    let outcome = pooled.filter(&mut event);

    assert_eq!(outcome.field("message"), Some(FieldOutcome::TimedOut));
    assert_eq!(event.tags(), vec!["_groktimeout"]);
}

#[test]
fn test_no_signal_leakage_on_same_thread() {
    let engine = engine(
        GrokConfig::new()
            .with_match("message", [PATHOLOGICAL, "^%{WORD:word}$"])
            .with_timeout(Duration::from_millis(100)),
    );

    let mut slow = Event::with_message(pathological_input());
    assert!(engine.filter(&mut slow).is_timed_out());

    for _ in 0..50 {
        let mut fast = Event::with_message("hello");
        let outcome = engine.filter(&mut fast);
        assert!(outcome.is_matched(), "outcome: {outcome:?}");
        assert_eq!(fast.get("word").and_then(|v| v.as_str()), Some("hello"));
        assert!(fast.tags().is_empty());
    }
}

#[test]
fn test_field_scope_budgets_are_independent() {
    let engine = engine(
        GrokConfig::new()
            .with_match("slow", [PATHOLOGICAL])
            .with_match("fast", ["%{INT:n}"])
            .with_break_on_match(false)
            .with_timeout(Duration::from_millis(100))
            .with_timeout_scope(TimeoutScope::Field),
    );

    let mut event = Event::from_json(serde_json::json!({
        "slow": pathological_input(),
        "fast": "42",
    }))
    .unwrap();
    let outcome = engine.filter(&mut event);

    assert_eq!(outcome.field("slow"), Some(FieldOutcome::TimedOut));
    assert_eq!(outcome.field("fast"), Some(FieldOutcome::Matched));
    assert!(event.has_tag("_groktimeout"));
    assert!(!event.has_tag("_grokparsefailure"));
    assert_eq!(event.get("n").and_then(|v| v.as_str()), Some("42"));
}

#[test]
fn test_event_scope_budget_is_shared() {
    let engine = engine(
        GrokConfig::new()
            .with_match("slow", [PATHOLOGICAL])
            .with_match("fast", ["%{INT:n}"])
            .with_break_on_match(false)
            .with_timeout(Duration::from_millis(100))
            .with_timeout_scope(TimeoutScope::Event),
    );

    let mut event = Event::from_json(serde_json::json!({
        "slow": pathological_input(),
        "fast": "42",
    }))
    .unwrap();
    let outcome = engine.filter(&mut event);

    assert_eq!(outcome.field("slow"), Some(FieldOutcome::TimedOut));
    assert_eq!(outcome.field("fast"), Some(FieldOutcome::TimedOut));
    assert!(!event.contains("n"));
    assert_eq!(event.tags(), vec!["_groktimeout"]);
}

#[test]
fn test_timeout_and_failure_on_independent_fields() {
    let engine = engine(
        GrokConfig::new()
            .with_match("slow", [PATHOLOGICAL])
            .with_match("other", ["%{INT:n}"])
            .with_break_on_match(false)
            .with_timeout(Duration::from_millis(100)),
    );

    let mut event = Event::from_json(serde_json::json!({
        "slow": pathological_input(),
        "other": "no digits",
    }))
    .unwrap();
    let outcome = engine.filter(&mut event);

    assert!(outcome.is_timed_out());
    assert!(outcome.is_failed());
    assert!(event.has_tag("_groktimeout"));
    assert!(event.has_tag("_grokparsefailure"));
}

#[test]
fn test_disabled_timeout_bypasses_ledger() {
    let engine = engine(
        GrokConfig::new()
            .with_match("message", ["%{IP:client}"])
            .without_timeout(),
    );

    assert!(!engine.enforcer().is_enabled());
    assert!(!engine.enforcer().is_running());

    for _ in 0..10 {
        let mut event = Event::with_message("10.0.0.1");
        assert!(engine.filter(&mut event).is_matched());
        assert_eq!(engine.enforcer().in_flight(), 0);
    }
    assert_eq!(engine.enforcer().abandoned_executions(), 0);
}

#[test]
fn test_parallel_workers_see_their_own_outcomes() {
    let engine = engine(
        GrokConfig::new()
            .with_match("message", [PATHOLOGICAL, "^value=%{INT:n:int}$"])
            .with_timeout(Duration::from_millis(100)),
    );

    let mut events: Vec<Event> = (0..64)
        .map(|i| {
            if i % 16 == 0 {
                Event::with_message(pathological_input())
            } else {
                Event::with_message(format!("value={i}"))
            }
        })
        .collect();

    let outcomes = engine.filter_batch(&mut events);

    for (i, (event, outcome)) in events.iter().zip(&outcomes).enumerate() {
        if i % 16 == 0 {
            assert!(outcome.is_timed_out(), "event {i}: {outcome:?}");
            assert_eq!(event.tags(), vec!["_groktimeout"]);
        } else {
            assert!(outcome.is_matched(), "event {i}: {outcome:?}");
            assert!(event.tags().is_empty(), "event {i}: {:?}", event.tags());
            assert_eq!(event.get("n"), Some(&serde_json::json!(i)));
        }
    }
    assert_eq!(engine.enforcer().in_flight(), 0);
}

#[test]
fn test_shared_enforcer_across_threads() {
    let registry = PatternRegistry::with_builtins();
    let compiler = PatternCompiler::new(&registry);
    let slow = Arc::new(compiler.compile(PATHOLOGICAL).unwrap());
    let fast = Arc::new(compiler.compile("%{WORD:w}").unwrap());

    let enforcer = Arc::new(
        TimeoutEnforcer::new(Duration::from_millis(100)).with_monitor_interval(MONITOR_INTERVAL),
    );
    enforcer.start().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let enforcer = Arc::clone(&enforcer);
            let slow = Arc::clone(&slow);
            let fast = Arc::clone(&fast);
            thread::spawn(move || {
                if worker == 0 {
                    let outcome = enforcer.run(&slow, &pathological_input(), &enforcer.deadline());
                    assert!(outcome.is_timed_out());
                }
                for _ in 0..25 {
                    let outcome = enforcer.run(&fast, "hello", &enforcer.deadline());
                    assert!(outcome.is_matched(), "worker {worker}: {outcome:?}");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(enforcer.in_flight(), 0);
    assert_eq!(enforcer.abandoned_executions(), 1);
}

#[test]
fn test_pooled_deadline_already_expired() {
    let registry = PatternRegistry::with_builtins();
    let matcher = Arc::new(PatternCompiler::new(&registry).compile("%{WORD:w}").unwrap());
    let enforcer = TimeoutEnforcer::new(Duration::from_millis(100)).with_monitor_interval(MONITOR_INTERVAL);
    enforcer.start().unwrap();

    let deadline = Deadline::starting_at(
        Instant::now() - Duration::from_millis(200),
        Some(Duration::from_millis(100)),
    );
    assert_eq!(
        enforcer.run(&matcher, "hello", &deadline),
        MatchOutcome::TimedOut(Duration::ZERO)
    );
}
