//! Misuse-check configuration.
//!
//! The check level is set via the `BRICKALLOC_CHECKS` environment variable:
//! - `debug` (default): contract checks run only in builds with
//!   `debug_assertions`. Release builds pay nothing per call.
//! - `always`: contract checks run in every build; misuse halts.
//! - `never`: checks are skipped; a malformed request degrades to the
//!   failure sentinel and a bad deallocation is undefined.

use std::sync::atomic::{AtomicU8, Ordering};

/// When contract checks run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckLevel {
    /// Checks follow `debug_assertions`.
    #[default]
    Debug,
    /// Checks run in every build.
    Always,
    /// Checks never run.
    Never,
}

impl CheckLevel {
    /// Parse from string (case-insensitive). Unknown values map to `Debug`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "strict" | "on" | "1" => Self::Always,
            "never" | "off" | "none" | "0" => Self::Never,
            _ => Self::Debug,
        }
    }

    /// Returns true if checks run under this level in the current build.
    #[must_use]
    pub const fn enabled(self) -> bool {
        match self {
            Self::Debug => cfg!(debug_assertions),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

// Atomic cache: 0=unresolved, 1=Debug, 2=Always, 3=Never, 255=resolving.
// Reading the environment allocates; when an allocator from this crate is
// the process allocator that read re-enters us, so resolution must not
// block or recurse.
static CACHED_LEVEL: AtomicU8 = AtomicU8::new(0);

const LEVEL_UNRESOLVED: u8 = 0;
const LEVEL_DEBUG: u8 = 1;
const LEVEL_ALWAYS: u8 = 2;
const LEVEL_NEVER: u8 = 3;
const LEVEL_RESOLVING: u8 = 255;

fn level_to_u8(level: CheckLevel) -> u8 {
    match level {
        CheckLevel::Debug => LEVEL_DEBUG,
        CheckLevel::Always => LEVEL_ALWAYS,
        CheckLevel::Never => LEVEL_NEVER,
    }
}

fn u8_to_level(v: u8) -> CheckLevel {
    match v {
        LEVEL_ALWAYS => CheckLevel::Always,
        LEVEL_NEVER => CheckLevel::Never,
        _ => CheckLevel::Debug,
    }
}

/// Get the configured check level (reads the env var once, caches thereafter).
///
/// A call that arrives while another call is resolving the variable gets
/// the default level instead of waiting.
#[must_use]
pub fn check_level() -> CheckLevel {
    let mut cached = CACHED_LEVEL.load(Ordering::Acquire);
    if cached == LEVEL_UNRESOLVED {
        match CACHED_LEVEL.compare_exchange(
            LEVEL_UNRESOLVED,
            LEVEL_RESOLVING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return resolve_from_env(),
            Err(current) => cached = current,
        }
    }
    if cached == LEVEL_RESOLVING {
        CheckLevel::default()
    } else {
        u8_to_level(cached)
    }
}

fn resolve_from_env() -> CheckLevel {
    let level = std::env::var("BRICKALLOC_CHECKS")
        .map(|v| CheckLevel::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
    level
}

/// Returns true if contract checks run for this process.
#[inline]
#[must_use]
pub fn misuse_checks_enabled() -> bool {
    check_level().enabled()
}
