//! shmlock Probe - inspeksi dan manipulasi flag dari luar
//!
//! Commands:
//!   status   Tampilkan state flag (diagnostik, langsung basi)
//!   init     Buat region jika belum ada, store `0` ke flag. Hanya untuk
//!            pembuat region!
//!   acquire  Acquire lalu release (exit 3 jika timeout)
//!   hold     Acquire lalu mati tanpa release (simulasi crash holder)
//!   release  Release manual (exit 4 jika flag tidak dipegang)
//!
//! Semua command selain `init` butuh region yang sudah ada.
//!
//! Usage:
//!   cargo run --release --bin shmlock_probe -- <COMMAND> [OPTIONS]

use log::{info, warn};
use std::process::ExitCode;
use std::thread;

use shmlock::config::LockConfig;
use shmlock::core::{SharedFlag, SpinLock};
use shmlock::segment::ShmRegion;
use shmlock::{Error, Result};

const EXIT_TIMEOUT: u8 = 3;
const EXIT_NOT_HELD: u8 = 4;

fn print_usage() {
    println!("shmlock Probe - Inspect a shared lock flag\n");
    println!("Usage: shmlock_probe <status|init|acquire|hold|release> [OPTIONS]\n");
    println!("Options:");
    println!("  -p, --path <PATH>       Region file (default: /dev/shm/shmlock_demo.ipcflag)");
    println!("  -n, --name <NAME>       Region name under /dev/shm");
    println!("      --len <BYTES>       Region length (default: offset + 1)");
    println!("  -o, --offset <N>        Flag offset (default: 0)");
    println!("  -t, --timeout-ms <MS>   Acquire timeout (default: 10000)");
    println!("      --no-timeout        Wait forever");
    println!("      --hold-ms <MS>      Time to hold before release/crash (default: 1000)");
    println!("  -b, --backoff <KIND>    spin | yield | exp (default: exp)");
    println!("  -v, --verbose           Debug logging");
    println!("  -h, --help              Show this help");
}

/// Mati mendadak: tidak ada destructor, tidak ada guard yang berjalan
fn crash() -> ! {
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGKILL);
    }
    std::process::abort()
}

fn status(region: &ShmRegion, config: &LockConfig) -> Result<()> {
    let flag = SharedFlag::new(region, config.offset)?;
    let value = flag.load();
    let state = if value == 0 { "unlocked" } else { "locked" };
    println!("state: {} ({})", state, value);
    Ok(())
}

fn acquire(region: &ShmRegion, config: &LockConfig, release: bool) -> Result<()> {
    let lock = SpinLock::new(region, config.offset, config.backoff.build())?;

    match config.timeout {
        Some(timeout) => lock.acquire_timeout(timeout)?,
        None => lock.acquire(None)?,
    }
    println!("acquired offset {}", config.offset);

    if !release {
        info!("holding for {:?}, then terminating without release", config.hold);
        thread::sleep(config.hold);
        crash();
    }

    lock.release()?;
    println!("released offset {}", config.offset);
    Ok(())
}

fn release(region: &ShmRegion, config: &LockConfig) -> Result<()> {
    let lock = SpinLock::pure_spin(region, config.offset)?;
    lock.release()?;
    println!("released offset {}", config.offset);
    Ok(())
}

fn init(config: &LockConfig) -> Result<()> {
    let region = ShmRegion::open(&config.region_path, config.mapped_len())?;
    warn!("storing 0 at offset {}: only safe before any actor acquires", config.offset);
    SharedFlag::init(&region, config.offset)?;
    println!("initialized offset {}", config.offset);
    Ok(())
}

fn run(command: &str, config: &LockConfig) -> Result<()> {
    if command == "init" {
        return init(config);
    }
    if !matches!(command, "status" | "acquire" | "hold" | "release") {
        return Err(Error::InvalidConfig(format!("unknown command '{}'", command)));
    }

    let region = ShmRegion::open_existing(&config.region_path, config.mapped_len())?;

    match command {
        "status" => status(&region, config),
        "acquire" => acquire(&region, config, true),
        "hold" => acquire(&region, config, false),
        _ => release(&region, config),
    }
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

    if config.help || positional.is_empty() {
        print_usage();
        return ExitCode::SUCCESS;
    }

    config.init_logging();

    match run(&positional[0], &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            match e {
                Error::AcquireTimeout { .. } => ExitCode::from(EXIT_TIMEOUT),
                Error::ReleaseNotHeld => ExitCode::from(EXIT_NOT_HELD),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
