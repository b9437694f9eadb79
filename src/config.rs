//! Konfigurasi untuk binary `shmlock_demo` dan `shmlock_probe`
//!
//! Sumber konfigurasi, urutan prioritas naik:
//! 1. `LockConfig::default()`
//! 2. Environment: `SHMLOCK_PATH`, `SHMLOCK_OFFSET`, `SHMLOCK_TIMEOUT_MS`
//! 3. Argumen command line
//!
//! Core lock tidak membaca konfigurasi apa pun; module ini hanya dipakai
//! oleh proses yang membuat region dan lock.

use log::LevelFilter;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::{BackoffPolicy, ExponentialBackoff, PureSpin, YieldingBackoff};
use crate::error::{Error, Result};
use crate::segment::named_path;

pub const ENV_PATH: &str = "SHMLOCK_PATH";
pub const ENV_OFFSET: &str = "SHMLOCK_OFFSET";
pub const ENV_TIMEOUT_MS: &str = "SHMLOCK_TIMEOUT_MS";

/// Pilihan backoff dari command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Spin,
    Yielding,
    Exponential,
}

impl BackoffKind {
    /// Policy siap pakai, bisa dibagi antar thread
    pub fn build(self) -> Box<dyn BackoffPolicy + Send + Sync> {
        match self {
            BackoffKind::Spin => Box::new(PureSpin),
            BackoffKind::Yielding => Box::new(YieldingBackoff::default()),
            BackoffKind::Exponential => Box::new(ExponentialBackoff::default().with_pid_jitter()),
        }
    }
}

impl fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackoffKind::Spin => "spin",
            BackoffKind::Yielding => "yield",
            BackoffKind::Exponential => "exp",
        };
        f.write_str(name)
    }
}

impl FromStr for BackoffKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spin" => Ok(BackoffKind::Spin),
            "yield" | "yielding" => Ok(BackoffKind::Yielding),
            "exp" | "exponential" => Ok(BackoffKind::Exponential),
            other => Err(Error::InvalidConfig(format!("unknown backoff '{}'", other))),
        }
    }
}

/// Konfigurasi lock dan region
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub region_path: PathBuf,
    /// `None` berarti cukup sampai byte flag: `offset + 1`
    pub region_len: Option<usize>,
    pub offset: usize,
    /// `None` berarti tunggu selamanya
    pub timeout: Option<Duration>,
    /// Lama lock dipegang oleh worker demo
    pub hold: Duration,
    pub backoff: BackoffKind,
    pub verbose: bool,
    pub help: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            region_path: named_path("shmlock_demo"),
            region_len: None,
            offset: 0,
            timeout: Some(Duration::from_secs(10)),
            hold: Duration::from_secs(1),
            backoff: BackoffKind::Exponential,
            verbose: false,
            help: false,
        }
    }
}

impl LockConfig {
    /// Default + environment + argumen
    ///
    /// `args` tidak termasuk nama program. Argumen tanpa `-` dikembalikan
    /// sebagai positional (misalnya subcommand).
    pub fn load<I>(args: I) -> Result<(Self, Vec<String>)>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        let positional = config.apply_args(args)?;
        config.validate()?;
        Ok((config, positional))
    }

    /// Override dari environment. `lookup` dipisah supaya bisa di-test.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_PATH) {
            self.region_path = PathBuf::from(path);
        }
        if let Some(offset) = lookup(ENV_OFFSET) {
            self.offset = parse_number(ENV_OFFSET, &offset)?;
        }
        if let Some(ms) = lookup(ENV_TIMEOUT_MS) {
            self.timeout = Some(Duration::from_millis(parse_number(ENV_TIMEOUT_MS, &ms)?));
        }
        Ok(())
    }

    /// Override dari argumen command line
    pub fn apply_args<I>(&mut self, args: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--path" | "-p" => {
                    self.region_path = PathBuf::from(next_value(&arg, &mut args)?);
                }
                "--name" | "-n" => {
                    self.region_path = named_path(&next_value(&arg, &mut args)?);
                }
                "--len" => {
                    self.region_len = Some(parse_number(&arg, &next_value(&arg, &mut args)?)?);
                }
                "--offset" | "-o" => {
                    self.offset = parse_number(&arg, &next_value(&arg, &mut args)?)?;
                }
                "--timeout-ms" | "-t" => {
                    let ms = parse_number(&arg, &next_value(&arg, &mut args)?)?;
                    self.timeout = Some(Duration::from_millis(ms));
                }
                "--no-timeout" => {
                    self.timeout = None;
                }
                "--hold-ms" => {
                    let ms = parse_number(&arg, &next_value(&arg, &mut args)?)?;
                    self.hold = Duration::from_millis(ms);
                }
                "--backoff" | "-b" => {
                    self.backoff = next_value(&arg, &mut args)?.parse()?;
                }
                "--verbose" | "-v" => {
                    self.verbose = true;
                }
                "--help" | "-h" => {
                    self.help = true;
                }
                flag if flag.starts_with('-') => {
                    return Err(Error::InvalidConfig(format!("unknown option '{}'", flag)));
                }
                _ => positional.push(arg.clone()),
            }
        }

        Ok(positional)
    }

    /// Argumen yang menghasilkan konfigurasi ini lagi, untuk proses anak
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--path".to_string(),
            self.region_path.display().to_string(),
            "--offset".to_string(),
            self.offset.to_string(),
            "--hold-ms".to_string(),
            self.hold.as_millis().to_string(),
            "--backoff".to_string(),
            self.backoff.to_string(),
        ];
        if let Some(len) = self.region_len {
            args.push("--len".to_string());
            args.push(len.to_string());
        }
        match self.timeout {
            Some(timeout) => {
                args.push("--timeout-ms".to_string());
                args.push(timeout.as_millis().to_string());
            }
            None => args.push("--no-timeout".to_string()),
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        args
    }

    /// Panjang region yang di-map: `--len` jika ada, selain itu `offset + 1`
    pub fn mapped_len(&self) -> usize {
        self.region_len.unwrap_or_else(|| self.offset.saturating_add(1))
    }

    /// Region minimal harus memuat byte flag
    pub fn validate(&self) -> Result<()> {
        let len = self.mapped_len();
        if len == 0 {
            return Err(Error::InvalidConfig("region length must be > 0".into()));
        }
        if self.offset >= len {
            return Err(Error::InvalidConfig(format!(
                "offset {} does not fit in region of {} bytes",
                self.offset, len
            )));
        }
        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// Pasang simple_logger dengan timestamp UTC
    pub fn init_logging(&self) {
        simple_logger::SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(self.log_level())
            .init()
            .unwrap_or_else(|_| eprintln!("--> LOGGER WAS ALREADY STARTED"));
    }
}

fn next_value<I: Iterator<Item = String>>(flag: &str, args: &mut I) -> Result<String> {
    args.next()
        .ok_or_else(|| Error::InvalidConfig(format!("missing value for '{}'", flag)))
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid number '{}' for {}", value, name)))
}
