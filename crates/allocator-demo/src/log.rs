use std::{
    fmt,
    sync::{
        OnceLock,
        atomic::{AtomicU8, Ordering},
    },
    time::Instant,
};

use ansi_term::Color;

macro_rules! log {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::log($level, format_args!($($arg)*));
    };
}

macro_rules! trace {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Trace, $($arg)*);
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Debug, $($arg)*);
    };
}

macro_rules! info {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Info, $($arg)*);
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Warn, $($arg)*);
    };
}

#[expect(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Error, $($arg)*);
    };
}

static START: OnceLock<Instant> = OnceLock::new();
static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Starts the log clock and drops every message below `max_level`.
pub fn init(max_level: LogLevel) {
    START.get_or_init(Instant::now);
    MAX_LEVEL.store(max_level as u8, Ordering::Relaxed);
}

pub fn log(level: LogLevel, message: fmt::Arguments) {
    if (level as u8) < MAX_LEVEL.load(Ordering::Relaxed) {
        return;
    }
    let now = START.get_or_init(Instant::now).elapsed();
    eprintln!("{now:.6?} {} {}", LevelFormat(level), message);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

struct LevelFormat(LogLevel);

impl fmt::Display for LevelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (color, msg) = match self.0 {
            LogLevel::Trace => (Color::Magenta, "TRACE"),
            LogLevel::Debug => (Color::Blue, "DEBUG"),
            LogLevel::Info => (Color::Green, " INFO"),
            LogLevel::Warn => (Color::Yellow, " WARN"),
            LogLevel::Error => (Color::Red, "ERROR"),
        };
        write!(f, "{}", color.paint(msg).bold())
    }
}
