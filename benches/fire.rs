//! Fan-out benchmarks for a single emitter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Bencher, Criterion};
use rand::{rngs::StdRng, seq::IteratorRandom, SeedableRng};
use tether::{CancellationToken, EventEmitter};

/// Fan-out benchmark.
///
/// Generate `n_emitters` `EventEmitter<String>`, each with `n_subscribers`
/// subscribers that count the bytes they receive. At each step fire the step
/// number formatted as a string into 10 randomly-selected emitters.
///
/// Benchmark the time required for `n_steps` steps.
fn fan_out(n_emitters: usize, n_subscribers: usize, n_steps: usize, b: &mut Bencher<'_>) {
    let bytes = Arc::new(AtomicUsize::new(0));
    let emitters: Vec<EventEmitter<String>> = (0..n_emitters).map(|_| EventEmitter::new()).collect();
    for emitter in &emitters {
        for _ in 0..n_subscribers {
            let bytes = bytes.clone();
            emitter.subscribe(move |s: &String| { bytes.fetch_add(s.len(), Ordering::Relaxed); });
        }
    }

    let mut rng = StdRng::from_entropy();
    b.iter(|| {
        for k in 0..n_steps {
            let s = format!("{}", k);
            for emitter in emitters.iter().choose_multiple(&mut rng, 10) {
                emitter.fire(s.clone());
            }
        }
    });
}

/// Subscribe and cancel through a token while firing.
///
/// Every step adds `n_subscribers` scoped subscriptions, fires once and
/// cancels the token again.
fn churn(n_subscribers: usize, n_steps: usize, b: &mut Bencher<'_>) {
    let emitter: EventEmitter<usize> = EventEmitter::new();
    b.iter(|| {
        for k in 0..n_steps {
            let token = CancellationToken::new();
            for _ in 0..n_subscribers {
                emitter.subscribe_scoped(&token, |_| ());
            }
            let mut next = emitter.subscribe_once();
            emitter.fire(k);
            let _ = next.try_take();
            token.cancel();
        }
    });
}

fn bench_fn(c: &mut Criterion) {
    c.bench_function("fan out 1 subscriber", |b| fan_out(1_000, 1, 1_000, b));
    c.bench_function("fan out 10 subscribers", |b| fan_out(1_000, 10, 1_000, b));
    c.bench_function("fan out 100 subscribers", |b| fan_out(100, 100, 1_000, b));
    c.bench_function("churn 10", |b| churn(10, 1_000, b));
    c.bench_function("churn 100", |b| churn(100, 100, b));
}

criterion_group!(benches, bench_fn);
criterion_main!(benches);
