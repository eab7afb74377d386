use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::time::{Duration, Instant};

use qos_monitor::Monitor;

// ─── Synthetic routes ────────────────────────────────────────────

/// (entry, typical latency ms, failure probability)
const ROUTES: &[(&str, u32, f64)] = &[
    ("GET /api/users/:id", 80, 0.01),
    ("GET /api/products/:id", 150, 0.02),
    ("POST /api/sessions", 320, 0.08),
];

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that report synthetic outcomes
/// until the deadline passes.
pub async fn run(monitor: Monitor, concurrency: u32, duration: Duration) {
    let deadline = Instant::now() + duration;

    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let monitor = monitor.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, monitor, deadline).await;
        }));
    }

    // Wait for all workers to finish
    for h in handles {
        let _ = h.await;
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(id: u32, monitor: Monitor, deadline: Instant) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while Instant::now() < deadline {
        let (entry, typical_ms, fail_p) = ROUTES[rng.gen_range(0..ROUTES.len())];

        // Mostly near the typical latency, with an occasional slow tail
        let ms = if rng.gen_bool(0.05) {
            rng.gen_range(typical_ms * 3..=typical_ms * 8)
        } else {
            rng.gen_range(typical_ms / 2..=typical_ms * 2)
        };
        let code = if rng.gen_bool(fail_p) {
            [500, 503, 404][rng.gen_range(0..3)]
        } else {
            [200, 201][rng.gen_range(0..2)]
        };

        if let Err(e) = monitor.report(entry, ms, code).await {
            tracing::error!(worker = id, error = %e, "report rejected, worker stopping");
            return;
        }

        tokio::time::sleep(Duration::from_millis(rng.gen_range(5..25))).await;
    }
}
