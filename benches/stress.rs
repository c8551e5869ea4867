use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use ulid::Ulid;

use slotbook::clock::SystemClock;
use slotbook::durable::WalStore;
use slotbook::engine::{Engine, EngineError};
use slotbook::model::*;
use slotbook::publisher::EventPublisher;
use slotbook::store::InMemoryStore;
use slotbook::transport::BroadcastTransport;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2027, 1, 4)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn slot(org: i64, emp: i64, hour: i64) -> AppointmentInput {
    let start = base() + TimeDelta::hours(hour);
    AppointmentInput {
        start_at: Some(start),
        end_at: Some(start + TimeDelta::hours(1)),
        organization_id: Some(org),
        employee_id: Some(emp),
        ..Default::default()
    }
}

fn memory_engine() -> Arc<Engine> {
    let store = Arc::new(InMemoryStore::new());
    let publisher = EventPublisher::new(
        Arc::new(BroadcastTransport::default()),
        Arc::new(SystemClock),
    );
    Arc::new(Engine::new(store.clone(), store, publisher))
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

async fn phase1_sequential(engine: &Engine) {
    let n = 5000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    // back-to-back slots on one calendar: every check scans a full day
    for i in 0..n {
        let t = Instant::now();
        engine
            .create_appointment(slot(1, 1, i as i64))
            .await
            .expect("sequential booking rejected");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create latency", &mut latencies);
}

async fn phase2_concurrent_calendars(engine: Arc<Engine>) {
    let n_tasks = 16;
    let n_per_task = 500;

    let start = Instant::now();
    let mut handles = Vec::new();
    for task in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                // each task owns an employee, so none of these collide
                engine
                    .create_appointment(slot(2, task, j))
                    .await
                    .expect("independent calendar booking rejected");
            }
        }));
    }
    for h in handles {
        h.await.expect("task panicked");
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended_slot(engine: Arc<Engine>) {
    let rounds = 200;
    let contenders = 8;
    let mut admitted = 0;
    let mut rejected = 0;

    let start = Instant::now();
    for round in 0..rounds {
        let mut handles = Vec::new();
        for _ in 0..contenders {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.create_appointment(slot(3, 1, round)).await
            }));
        }
        for h in handles {
            match h.await.expect("task panicked") {
                Ok(_) => admitted += 1,
                Err(EngineError::ResourceConflict(_) | EngineError::ConstraintViolation(_)) => {
                    rejected += 1
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    println!(
        "  {rounds} slots x {contenders} contenders: {admitted} admitted, {rejected} rejected in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    assert_eq!(admitted, rounds as usize, "a slot was double-booked or lost");
}

async fn phase4_read_under_load(engine: Arc<Engine>) {
    for i in 0..500 {
        engine
            .create_appointment(slot(4, i % 10, i / 10))
            .await
            .expect("prefill rejected");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let writes = Arc::new(AtomicUsize::new(0));
    let mut writers = Vec::new();
    for w in 0..4 {
        let engine = engine.clone();
        let stop = stop.clone();
        let writes = writes.clone();
        writers.push(tokio::spawn(async move {
            let mut i = 0i64;
            while !stop.load(Ordering::Relaxed) {
                if engine.create_appointment(slot(5, w, i)).await.is_ok() {
                    writes.fetch_add(1, Ordering::Relaxed);
                }
                i += 1;
            }
        }));
    }

    let n_readers = 8;
    let reads_per_reader = 500;
    let mut readers = Vec::new();
    for r in 0..n_readers {
        let engine = engine.clone();
        readers.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let from = base() + TimeDelta::hours((i % 48) as i64);
                let t = Instant::now();
                engine
                    .list_appointments_for(4, Some(r % 10), from, from + TimeDelta::days(1))
                    .await
                    .expect("range query failed");
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in readers {
        all.extend(h.await.expect("reader panicked"));
    }
    stop.store(true, Ordering::Relaxed);
    for h in writers {
        let _ = h.await;
    }

    println!("  background writes: {}", writes.load(Ordering::Relaxed));
    print_latency("range query", &mut all);
}

async fn phase5_durable_writes() {
    let dir = std::env::temp_dir().join(format!("slotbook_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).expect("create bench dir");
    let store = Arc::new(
        WalStore::open(&dir.join("bench.wal"))
            .await
            .expect("open WAL"),
    );
    let publisher = EventPublisher::new(
        Arc::new(BroadcastTransport::default()),
        Arc::new(SystemClock),
    );
    let engine = Engine::new(store.clone(), store, publisher);

    let n = 500;
    let mut latencies = Vec::with_capacity(n);
    for i in 0..n {
        let t = Instant::now();
        engine
            .create_appointment(slot(6, 1, i as i64))
            .await
            .expect("durable booking rejected");
        latencies.push(t.elapsed());
    }
    print_latency("fsynced create", &mut latencies);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::main]
async fn main() {
    println!("=== slotbook stress benchmark ===\n");

    println!("[phase 1] sequential create throughput");
    phase1_sequential(&memory_engine()).await;

    println!("\n[phase 2] concurrent creates on independent calendars");
    phase2_concurrent_calendars(memory_engine()).await;

    println!("\n[phase 3] contended slot");
    phase3_contended_slot(memory_engine()).await;

    println!("\n[phase 4] range query latency under write load");
    phase4_read_under_load(memory_engine()).await;

    println!("\n[phase 5] durable create latency");
    phase5_durable_writes().await;

    println!("\n=== done ===");
}
