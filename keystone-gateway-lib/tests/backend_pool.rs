use keystone_gateway_lib::balancer::BackendPool;
use keystone_gateway_lib::config::Service;

fn services(n: usize) -> Vec<Service> {
    (0..n)
        .map(|i| Service {
            name: format!("backend-{i}"),
            url: format!("http://backend-{i}:9000"),
            health: Some("/healthz".to_string()),
        })
        .collect()
}

#[test]
fn rotates_fairly_over_all_backends() {
    let pool = BackendPool::new(&services(3)).expect("build pool");

    // K * N picks return each backend exactly K times, in rotation.
    let mut picks = Vec::new();
    for _ in 0..12 {
        picks.push(pool.next().expect("live backend").name().to_string());
    }

    for i in 0..3 {
        let count = picks.iter().filter(|n| **n == format!("backend-{i}")).count();
        assert_eq!(count, 4, "backend-{i} picked {count} times");
    }
    // Consistent rotation: every window of 3 contains all backends.
    for window in picks.chunks(3) {
        let mut names: Vec<_> = window.to_vec();
        names.sort();
        assert_eq!(names, vec!["backend-0", "backend-1", "backend-2"]);
    }
}

#[test]
fn skips_dead_backends_and_continues_rotation() {
    let pool = BackendPool::new(&services(3)).expect("build pool");

    assert_eq!(pool.next().expect("pick").name(), "backend-0");
    pool.backends()[1].set_alive(false);

    // backend-1 is skipped; rotation continues from the next position.
    assert_eq!(pool.next().expect("pick").name(), "backend-2");
    assert_eq!(pool.next().expect("pick").name(), "backend-0");
    assert_eq!(pool.next().expect("pick").name(), "backend-2");

    pool.backends()[1].set_alive(true);
    assert_eq!(pool.next().expect("pick").name(), "backend-0");
    assert_eq!(pool.next().expect("pick").name(), "backend-1");
}

#[test]
fn does_not_skip_live_backend_before_cursor() {
    let pool = BackendPool::new(&services(3)).expect("build pool");

    // Advance the cursor to the last backend, then kill everything after
    // the first: the scan must wrap and still find backend-0.
    assert_eq!(pool.next().expect("pick").name(), "backend-0");
    assert_eq!(pool.next().expect("pick").name(), "backend-1");
    assert_eq!(pool.next().expect("pick").name(), "backend-2");
    pool.backends()[1].set_alive(false);
    pool.backends()[2].set_alive(false);

    assert_eq!(pool.next().expect("pick").name(), "backend-0");
    assert_eq!(pool.next().expect("pick").name(), "backend-0");
}

#[test]
fn returns_none_only_when_all_dead() {
    let pool = BackendPool::new(&services(2)).expect("build pool");

    pool.backends()[0].set_alive(false);
    assert_eq!(pool.next().expect("pick").name(), "backend-1");

    pool.backends()[1].set_alive(false);
    assert!(pool.next().is_none());
    assert_eq!(pool.alive_count(), 0);

    pool.backends()[0].set_alive(true);
    assert_eq!(pool.next().expect("pick").name(), "backend-0");
}

#[test]
fn marking_is_idempotent() {
    let pool = BackendPool::new(&services(2)).expect("build pool");

    pool.backends()[0].set_alive(false);
    pool.backends()[0].set_alive(false);
    assert!(!pool.backends()[0].is_alive());

    pool.backends()[0].set_alive(true);
    pool.backends()[0].set_alive(true);
    assert!(pool.backends()[0].is_alive());
}

#[test]
fn single_backend_is_always_picked() {
    let pool = BackendPool::new(&services(1)).expect("build pool");
    for _ in 0..5 {
        assert_eq!(pool.next().expect("pick").name(), "backend-0");
    }
}

#[test]
fn health_uri_includes_base_path() {
    let svc = Service {
        name: "backend".to_string(),
        url: "http://backend:9000/base".to_string(),
        health: Some("/healthz".to_string()),
    };
    let pool = BackendPool::new(&[svc]).expect("build pool");
    let uri = pool.backends()[0].health_uri().expect("health uri");
    assert_eq!(uri.to_string(), "http://backend:9000/base/healthz");
}

#[test]
fn concurrent_picks_stay_in_bounds() {
    use std::sync::Arc;
    use std::thread;

    let pool = Arc::new(BackendPool::new(&services(4)).expect("build pool"));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut counts = vec![0usize; 4];
                for _ in 0..100 {
                    let name = pool.next().expect("pick").name().to_string();
                    let idx: usize = name
                        .strip_prefix("backend-")
                        .and_then(|s| s.parse().ok())
                        .expect("backend index");
                    counts[idx] += 1;
                }
                counts
            })
        })
        .collect();

    let mut totals = vec![0usize; 4];
    for handle in handles {
        for (i, c) in handle.join().expect("join").into_iter().enumerate() {
            totals[i] += c;
        }
    }

    // Picks are serialised by the cursor lock, so the distribution is
    // exactly even regardless of interleaving.
    assert_eq!(totals, vec![100, 100, 100, 100]);
}
