//! shmlock - Latency Benchmark
//!
//! Mengukur biaya protokol lock:
//! - Uncontended: try_acquire + release (satu CAS masing-masing)
//! - Shared Memory: sama, tapi flag di region mmap
//! - Contended: dua thread berebut flag yang sama per backoff policy

use shmlock::core::{BackoffPolicy, ExponentialBackoff, PureSpin, SpinLock, YieldingBackoff};
use shmlock::segment::{self, ShmRegion};
use shmlock::SharedRegion;
use std::sync::atomic::AtomicU8;
use std::thread;
use std::time::Instant;

const ITERATIONS: usize = 1_000_000;
const CONTENDED_ITERATIONS: usize = 100_000;

fn main() {
    println!("🔒 shmlock - Inter-Process Spin Lock v0.1");
    println!("=========================================\n");

    let region = [AtomicU8::new(0)];
    benchmark_uncontended("In-Process Byte", &region);

    let path = std::env::temp_dir().join("shmlock_bench.ipcflag");
    match ShmRegion::open(&path, 1) {
        Ok(shm) => benchmark_uncontended("Shared Memory (mmap)", &shm),
        Err(e) => eprintln!("⚠️  Skipping mmap benchmark: {}", e),
    }
    segment::unlink(&path).ok();

    benchmark_contended("PureSpin", PureSpin);
    benchmark_contended("YieldingBackoff", YieldingBackoff::default());
    benchmark_contended("ExponentialBackoff", ExponentialBackoff::default());

    println!("\n✅ All benchmarks complete!");
    println!("\nTo run the two-process demo: cargo run --release --bin shmlock_demo");
}

fn benchmark_uncontended<R: SharedRegion + ?Sized>(label: &str, region: &R) {
    println!("📊 Uncontended Benchmark ({})", label);
    println!("-----------------------------------------");

    let lock = match SpinLock::pure_spin(region, 0) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("  ⚠️  {}", e);
            return;
        }
    };

    // Warm up
    for _ in 0..1000 {
        lock.try_acquire();
        lock.release().ok();
    }

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        lock.try_acquire();
        lock.release().ok();
    }
    let cycle_duration = start.elapsed();

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        drop(lock.lock(None));
    }
    let guard_duration = start.elapsed();

    let cycle_ns = cycle_duration.as_nanos() as f64 / ITERATIONS as f64;
    let guard_ns = guard_duration.as_nanos() as f64 / ITERATIONS as f64;

    println!("  Operations: {}", ITERATIONS);
    println!("  Acquire+release: {:.2} ns/op", cycle_ns);
    println!("  Guard cycle:     {:.2} ns/op", guard_ns);
    println!(
        "  Throughput:      {:.2} M ops/sec\n",
        ITERATIONS as f64 / cycle_duration.as_secs_f64() / 1_000_000.0
    );
}

fn benchmark_contended<B: BackoffPolicy + Sync>(label: &str, backoff: B) {
    println!("📊 Contended Benchmark (2 threads, {})", label);
    println!("-----------------------------------------");

    let region = [AtomicU8::new(0)];
    let start = Instant::now();

    let worst_ns = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let backoff = &backoff;
                let region = &region;
                s.spawn(move || {
                    let mut worst = 0u128;
                    let lock = match SpinLock::new(region, 0, backoff) {
                        Ok(lock) => lock,
                        Err(_) => return worst,
                    };
                    for _ in 0..CONTENDED_ITERATIONS {
                        let t = Instant::now();
                        if lock.acquire(None).is_err() {
                            break;
                        }
                        worst = worst.max(t.elapsed().as_nanos());
                        lock.release().ok();
                    }
                    worst
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(0))
            .max()
            .unwrap_or(0)
    });

    let duration = start.elapsed();
    let total = 2 * CONTENDED_ITERATIONS;
    let avg_ns = duration.as_nanos() as f64 / total as f64;

    println!("  Acquisitions: {}", total);
    println!("  Avg cycle:    {:.2} ns/op", avg_ns);
    println!("  Worst wait:   {:.3} μs", worst_ns as f64 / 1000.0);
    println!("  Total time:   {:.2} ms\n", duration.as_secs_f64() * 1000.0);
}
