//! Session log for RefPaint.
//!
//! One file, `refpaint.log`, next to the settings file in the config
//! directory. It is truncated when a session opens it, so it only describes
//! the latest run. Slot changes, generation start/finish and store failures
//! are logged through `log_info!` / `log_warn!` / `log_err!`.
//!
//! The macros are no-ops until [`init`] or [`init_at`] runs, so library
//! hosts and tests that never open a log pay nothing. [`set_echo`] mirrors
//! every line to stderr (the CLI's `--verbose`).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const LOG_FILE_NAME: &str = "refpaint.log";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

struct Sink {
    path: PathBuf,
    file: Mutex<File>,
}

static SINK: OnceLock<Sink> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

/// Path of the open session log, if one was opened.
pub fn log_path() -> Option<&'static Path> {
    SINK.get().map(|s| s.path.as_path())
}

pub fn set_echo(on: bool) {
    ECHO.store(on, Ordering::Relaxed);
}

/// Log one message. Write failures are swallowed.
pub fn write(level: Level, msg: &str) {
    let Some(sink) = SINK.get() else { return };
    let line = format_line(level, msg, since_epoch());
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Ok(mut file) = sink.file.lock() {
        let _ = writeln!(file, "{}", line);
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

/// Open the session log in the config directory (or the temp directory when
/// there is none).
pub fn init() {
    let dir = crate::settings::config_dir().unwrap_or_else(std::env::temp_dir);
    init_at(&dir.join(LOG_FILE_NAME));
}

/// Open (truncating) the session log at `path` and route panics into it.
/// Later calls in the same process do nothing.
pub fn init_at(path: &Path) {
    if SINK.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let sink = Sink {
        path: path.to_path_buf(),
        file: Mutex::new(file),
    };
    if SINK.set(sink).is_err() {
        return;
    }

    let started = since_epoch().as_secs();
    write(
        Level::Info,
        &format!(
            "RefPaint {} session opened (unix {})",
            env!("CARGO_PKG_VERSION"),
            started
        ),
    );

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// `HH:MM:SS.mmm LEVEL message`, clock in UTC.
fn format_line(level: Level, msg: &str, now: Duration) -> String {
    let secs = now.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03} {:<5} {}",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        now.subsec_millis(),
        level.tag(),
        msg
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_clock_and_level() {
        let now = Duration::from_millis(((13 * 60 + 5) * 60 + 9) * 1000 + 42);
        assert_eq!(
            format_line(Level::Warn, "slot 2 sent without annotations", now),
            "13:05:09.042 WARN  slot 2 sent without annotations"
        );
        assert_eq!(
            format_line(Level::Error, "x", Duration::from_secs(86_400 + 1)),
            "00:00:01.000 ERROR x"
        );
    }
}
