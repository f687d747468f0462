//! Process-wide logger.
//!
//! `env_logger` handles console output and filtering (`RUST_LOG`, default
//! `info`).  [`FeederLogger`] wraps it and copies every record the console
//! filter lets through into two files under the log directory:
//!
//! | File        | Contents         | Rotation                   |
//! |-------------|------------------|----------------------------|
//! | `all.log`   | every record     | 5 MiB, 7 numbered backups  |
//! | `error.log` | `Error` only     | truncated at startup       |
//!
//! With logging disabled no logger is installed and the max level is `Off`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use env_logger::Env;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::Error;

/// Rotate `all.log` once it would grow past this.
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

/// Numbered backups kept (`all.log.1` … `all.log.7`).
pub const LOG_BACKUPS: usize = 7;

/// Size-capped log file with numbered backups.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self { path, max_bytes, backups, file, written })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64 + 1;
        if self.written > 0 && self.written + len > self.max_bytes {
            self.rotate()?;
        }
        writeln!(self.file, "{line}")?;
        self.written += len;
        Ok(())
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups > 0 {
            for n in (1..self.backups).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

struct LogFiles {
    all: RotatingFile,
    errors: File,
}

/// `env_logger` on the console, teed into the log files.
pub struct FeederLogger {
    console: env_logger::Logger,
    files: Option<Mutex<LogFiles>>,
}

impl FeederLogger {
    /// Build the logger.  If the log directory cannot be prepared the
    /// logger runs console-only and the error is returned alongside.
    pub fn new(log_dir: &Path) -> (Self, Option<io::Error>) {
        let console = env_logger::Builder::from_env(Env::default().default_filter_or("info")).build();
        match open_files(log_dir) {
            Ok(files) => (Self { console, files: Some(Mutex::new(files)) }, None),
            Err(e) => (Self { console, files: None }, Some(e)),
        }
    }

    pub fn filter(&self) -> LevelFilter {
        self.console.filter()
    }
}

fn open_files(log_dir: &Path) -> io::Result<LogFiles> {
    fs::create_dir_all(log_dir)?;
    let all = RotatingFile::open(log_dir.join("all.log"), MAX_LOG_BYTES, LOG_BACKUPS)?;
    let errors = File::create(log_dir.join("error.log"))?;
    Ok(LogFiles { all, errors })
}

fn format_line(record: &Record) -> String {
    format!(
        "{}, {} {} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.target(),
        record.level(),
        record.args()
    )
}

impl Log for FeederLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.console.matches(record) {
            return;
        }
        self.console.log(record);

        let Some(files) = &self.files else { return };
        let line = format_line(record);
        // A poisoned lock only means another thread panicked mid-write.
        let mut files = files.lock().unwrap_or_else(|p| p.into_inner());
        let _ = files.all.write_line(&line);
        if record.level() == Level::Error {
            let _ = writeln!(files.errors, "{line}");
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(files) = &self.files {
            let mut files = files.lock().unwrap_or_else(|p| p.into_inner());
            let _ = files.all.flush();
            let _ = files.errors.flush();
        }
    }
}

/// Install the process-wide logger.
pub fn init(log_dir: &Path, enabled: bool) -> Result<(), Error> {
    if !enabled {
        log::set_max_level(LevelFilter::Off);
        return Ok(());
    }

    let (logger, file_err) = FeederLogger::new(log_dir);
    let level = logger.filter();
    log::set_boxed_logger(Box::new(logger)).map_err(|_| Error::Init("logger already installed"))?;
    log::set_max_level(level);

    if let Some(e) = file_err {
        log::warn!("Logger: file logging disabled, {}: {}", log_dir.display(), e);
    }
    Ok(())
}
