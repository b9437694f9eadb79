//! shmlock Demo - dua proses berebut satu flag
//!
//! Proses utama membuat region, meng-inisialisasi flag ke `0`, lalu
//! menjalankan dua worker (binary ini sendiri dengan subcommand `worker`).
//! Worker pertama memegang lock lebih lama sehingga worker kedua harus
//! spin/backoff sampai lock dilepas.
//!
//! Usage:
//!   cargo run --release --bin shmlock_demo [OPTIONS]
//!   cargo run --release --bin shmlock_demo -- worker <ID> [OPTIONS]

use log::{info, warn};
use std::process::{Child, Command, ExitCode};
use std::thread;
use std::time::{Duration, Instant};

use shmlock::config::LockConfig;
use shmlock::core::{SharedFlag, SpinLock};
use shmlock::segment::{self, ShmRegion};
use shmlock::{Error, Result};

/// Exit code worker yang gagal acquire karena timeout
const EXIT_TIMEOUT: u8 = 3;

/// Jeda start antar worker supaya contention hampir pasti terjadi
const STAGGER: Duration = Duration::from_millis(100);

fn print_usage() {
    println!("shmlock Demo - Inter-Process Spin Lock\n");
    println!("Usage: shmlock_demo [worker <ID>] [OPTIONS]\n");
    println!("Options:");
    println!("  -p, --path <PATH>       Region file (default: /dev/shm/shmlock_demo.ipcflag)");
    println!("  -n, --name <NAME>       Region name under /dev/shm");
    println!("      --len <BYTES>       Region length (default: offset + 1)");
    println!("  -o, --offset <N>        Flag offset (default: 0)");
    println!("  -t, --timeout-ms <MS>   Acquire timeout (default: 10000)");
    println!("      --no-timeout        Wait forever");
    println!("      --hold-ms <MS>      Hold time of the second worker (default: 1000)");
    println!("  -b, --backoff <KIND>    spin | yield | exp (default: exp)");
    println!("  -v, --verbose           Debug logging");
    println!("  -h, --help              Show this help");
}

/// Satu worker: acquire, tahan selama `hold`, release
///
/// Region harus sudah dibuat oleh proses utama.
fn run_worker(config: &LockConfig, id: u32) -> Result<()> {
    let region = ShmRegion::open_existing(&config.region_path, config.mapped_len())?;
    let lock = SpinLock::new(&region, config.offset, config.backoff.build())?;

    info!("[worker {}] trying to acquire", id);
    let start = Instant::now();
    let guard = match config.timeout {
        Some(timeout) => lock.lock_for(timeout),
        None => lock.lock(None),
    };

    let guard = match guard {
        Ok(guard) => guard,
        Err(e) => {
            warn!("[worker {}] failed to acquire: {}", id, e);
            return Err(e);
        }
    };

    info!(
        "[worker {}] acquired after {:.2}ms, doing work for {:.2}s",
        id,
        start.elapsed().as_secs_f64() * 1000.0,
        config.hold.as_secs_f64()
    );
    thread::sleep(config.hold);
    guard.unlock()?;
    info!("[worker {}] released", id);

    Ok(())
}

fn spawn_worker(config: &LockConfig, id: u32) -> Result<Child> {
    let exe = std::env::current_exe()?;
    let child = Command::new(exe)
        .arg("worker")
        .arg(id.to_string())
        .args(config.to_args())
        .spawn()?;
    Ok(child)
}

/// Proses utama: siapkan region lalu jalankan dua worker yang berebut lock
fn run_demo(config: &LockConfig) -> Result<()> {
    println!("🔒 shmlock Demo - Inter-Process Spin Lock");
    println!("=========================================\n");
    println!("  Region:  {}", config.region_path.display());
    println!("  Offset:  {}", config.offset);
    println!("  Backoff: {}\n", config.backoff);

    // Region baru, flag di-inisialisasi sekali oleh pembuat region
    segment::unlink(&config.region_path)?;
    let region = ShmRegion::open(&config.region_path, config.mapped_len())?;
    SharedFlag::init(&region, config.offset)?;

    // Worker 1 memegang lock dua kali lebih lama dari worker 2
    let mut first = config.clone();
    first.hold = config.hold * 2;

    let start = Instant::now();
    let mut workers = vec![(1, spawn_worker(&first, 1)?)];
    thread::sleep(STAGGER);
    workers.push((2, spawn_worker(config, 2)?));

    let mut timeouts = 0;
    for (id, mut child) in workers {
        let status = child.wait()?;
        match status.code() {
            Some(0) => println!("  ✅ worker {} finished", id),
            Some(code) if code == EXIT_TIMEOUT as i32 => {
                println!("  ⏱️  worker {} timed out", id);
                timeouts += 1;
            }
            _ => println!("  ❌ worker {} failed: {}", id, status),
        }
    }

    let lock = SpinLock::pure_spin(&region, config.offset)?;
    println!("\n📊 Demo finished in {:.2}s", start.elapsed().as_secs_f64());
    println!("  Final state: {}", if lock.is_locked() { "locked ⚠️" } else { "unlocked" });
    if timeouts > 0 {
        println!("  Timeouts:    {}", timeouts);
    }

    drop(region);
    segment::unlink(&config.region_path)?;
    Ok(())
}

fn main() -> ExitCode {
    let (config, positional) = match LockConfig::load(std::env::args().skip(1)) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ {}", e);
            print_usage();
            return ExitCode::from(2);
        }
    };

    if config.help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    config.init_logging();

    let result = match positional.first().map(String::as_str) {
        None | Some("run") => run_demo(&config),
        Some("worker") => match positional.get(1).map(|id| id.parse::<u32>()) {
            Some(Ok(id)) => run_worker(&config, id),
            _ => Err(Error::InvalidConfig("worker needs a numeric id".into())),
        },
        Some(other) => Err(Error::InvalidConfig(format!("unknown command '{}'", other))),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_timeout() => ExitCode::from(EXIT_TIMEOUT),
        Err(e) => {
            eprintln!("❌ Demo error: {}", e);
            ExitCode::FAILURE
        }
    }
}
