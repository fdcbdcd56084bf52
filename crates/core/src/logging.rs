//! Diagnostic logging configuration for the emulator.
//!
//! A [`LogConfig`] is owned by whoever builds the machine and is shared with
//! the components that need to report something. There is no process-wide
//! instance: two machines in the same process can log at different levels.
//!
//! # Architecture
//!
//! - **LogConfig**: thread-safe configuration using atomic operations
//! - **LogLevel**: hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: emulator areas (CPU, Bus, Cartridge, Timer, Display, Interrupts)
//! - **LogConfig::log()**: lazily formats a message and forwards it to the `log` facade
//!
//! Messages are emitted with the category name as the `log` target, so a
//! frontend that installs `env_logger` can filter them with `RUST_LOG`.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{LogCategory, LogConfig, LogLevel};
//!
//! let config = LogConfig::new();
//! config.set_global_level(LogLevel::Debug);
//! config.log(LogCategory::CPU, LogLevel::Debug, || {
//!     format!("HALT at PC={:04X}", 0x1234)
//! });
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 6;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    /// Matching `log` crate level, `None` for `Off`
    pub fn to_log_level(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction execution, stuck detection
    CPU,
    /// Memory map, IO registers, DMA
    Bus,
    /// Header parsing, bank switching, RTC, save RAM
    Cartridge,
    /// DIV/TIMA
    Timer,
    /// LCD mode sequencing and frame swaps
    Display,
    /// Interrupt requests and dispatch
    Interrupts,
}

impl LogCategory {
    fn index(self) -> usize {
        match self {
            LogCategory::CPU => 0,
            LogCategory::Bus => 1,
            LogCategory::Cartridge => 2,
            LogCategory::Timer => 3,
            LogCategory::Display => 4,
            LogCategory::Interrupts => 5,
        }
    }

    /// Target name used when forwarding to the `log` facade
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::CPU => "cpu",
            LogCategory::Bus => "bus",
            LogCategory::Cartridge => "cartridge",
            LogCategory::Timer => "timer",
            LogCategory::Display => "display",
            LogCategory::Interrupts => "interrupts",
        }
    }
}

/// Rate limiter for controlling log output frequency per category
///
/// Uses a sliding window of timestamps to enforce a maximum number of
/// messages per second.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    timestamps: Mutex<[VecDeque<Instant>; CATEGORY_COUNT]>,
    dropped_counts: Mutex<[usize; CATEGORY_COUNT]>,
    last_drop_report: Mutex<[Option<Instant>; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            timestamps: Mutex::new(Default::default()),
            dropped_counts: Mutex::new([0; CATEGORY_COUNT]),
            last_drop_report: Mutex::new([None; CATEGORY_COUNT]),
        }
    }

    fn set_max_logs_per_second(&self, max: usize) {
        self.max_logs_per_second.store(max, Ordering::Relaxed);
    }

    fn get_max_logs_per_second(&self) -> usize {
        self.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Returns (allowed, dropped_count) where dropped_count is Some(n) when
    /// a summary of dropped messages is due.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();

        // A poisoned lock only means another thread panicked mid-log; the
        // counters are still usable.
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        let mut dropped_counts = self
            .dropped_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut last_drop_report = self
            .last_drop_report
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let window = &mut timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window_duration {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.get_max_logs_per_second() {
            window.push_back(now);

            let dropped = dropped_counts[idx];
            if dropped > 0 {
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }

            (true, None)
        } else {
            dropped_counts[idx] += 1;

            let should_report = match last_drop_report[idx] {
                None => true,
                Some(last) => now.duration_since(last) >= Duration::from_secs(1),
            };

            if should_report {
                let dropped = dropped_counts[idx];
                dropped_counts[idx] = 0;
                last_drop_report[idx] = Some(now);
                (false, Some(dropped))
            } else {
                (false, None)
            }
        }
    }
}

/// Logging configuration shared by the components of one machine
pub struct LogConfig {
    /// Applies to every category without its own override
    global_level: AtomicU8,
    /// Per-category overrides, `Off` means "use the global level"
    category_levels: [AtomicU8; CATEGORY_COUNT],
    rate_limiter: RateLimiter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogConfig")
            .field("global_level", &self.get_global_level())
            .field("rate_limit", &self.get_rate_limit())
            .finish()
    }
}

impl LogConfig {
    /// Create a new LogConfig with all logging disabled and a rate limit of 60 logs/second
    pub fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Create a config with the given global level
    pub fn with_level(level: LogLevel) -> Self {
        let config = Self::new();
        config.set_global_level(level);
        config
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// Check if a message should be logged for the given category and level
    ///
    /// A category override wins when set; otherwise the global level decides.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for level in &self.category_levels {
            level.store(LogLevel::Off as u8, Ordering::Relaxed);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .set_max_logs_per_second(max_logs_per_second);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.get_max_logs_per_second()
    }

    /// Log a message with the specified category and level
    ///
    /// The closure only runs when the message passes both the level check and
    /// the rate limiter. Returns whether the message was emitted.
    pub fn log<F>(&self, category: LogCategory, level: LogLevel, message_fn: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if !self.should_log(category, level) {
            return false;
        }
        let Some(log_level) = level.to_log_level() else {
            return false;
        };

        let (allowed, dropped_count) = self.rate_limiter.should_allow(category);
        if let Some(count) = dropped_count.filter(|&c| c > 0) {
            log::log!(
                target: category.target(),
                log::Level::Warn,
                "rate limit exceeded, {} message(s) dropped in the last second",
                count
            );
        }

        if allowed {
            log::log!(target: category.target(), log_level, "{}", message_fn());
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("OFF"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("verbose"), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_configs_are_independent() {
        let a = LogConfig::with_level(LogLevel::Trace);
        let b = LogConfig::new();
        assert!(a.should_log(LogCategory::CPU, LogLevel::Trace));
        assert!(!b.should_log(LogCategory::CPU, LogLevel::Error));
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Cartridge, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Cartridge, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
    }

    #[test]
    fn test_off_is_never_logged() {
        let config = LogConfig::with_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::Timer, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Display, LogLevel::Debug);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Display), LogLevel::Off);
    }

    #[test]
    fn test_log_skips_closure_when_disabled() {
        let config = LogConfig::new();
        let mut called = false;
        let emitted = config.log(LogCategory::CPU, LogLevel::Debug, || {
            called = true;
            String::new()
        });
        assert!(!emitted);
        assert!(!called);
    }

    #[test]
    fn test_log_respects_rate_limit() {
        let config = LogConfig::with_level(LogLevel::Info);
        config.set_rate_limit(3);
        let emitted = (0..5)
            .filter(|_| config.log(LogCategory::Interrupts, LogLevel::Info, || "x".into()))
            .count();
        assert_eq!(emitted, 3);
    }

    #[test]
    fn test_rate_limiter_per_category() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            limiter.should_allow(LogCategory::CPU);
        }

        let (allowed, _) = limiter.should_allow(LogCategory::CPU);
        assert!(!allowed, "CPU category should be blocked");

        let (allowed, _) = limiter.should_allow(LogCategory::Bus);
        assert!(allowed, "Bus category should still be allowed");
    }

    #[test]
    fn test_rate_limiter_reports_dropped_count() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            limiter.should_allow(LogCategory::CPU);
        }
        for _ in 0..10 {
            limiter.should_allow(LogCategory::CPU);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::CPU);
        assert!(allowed);
        let dropped = dropped.unwrap();
        // The first overflow reports immediately, so 9 or 10 remain
        assert!((9..=10).contains(&dropped), "got {}", dropped);
    }
}
