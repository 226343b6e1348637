#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! One flat struct with documented defaults. Subsystems copy the fields
//! they care about at boot; nothing re-reads configuration mid-flight.

use tracing::warn;

use crate::error::{SysError, SysResult};

/// Default concurrent-app cap.
pub const DEFAULT_MAX_CONCURRENT_APPS: usize = 4;

/// Default idle-to-light-sleep deadline (ms). 0 disables auto-sleep.
pub const DEFAULT_SLEEP_TIMEOUT_MS: u32 = 30_000;

/// Default scheduler frame budget (ms).
pub const DEFAULT_FRAME_BUDGET_MS: u32 = 16;

/// Default async event queue capacity.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 128;

/// Default materialized non-persistent screen cap.
pub const DEFAULT_MAX_SCREENS: usize = 3;

/// Default UI refresh cadence (frames per second).
pub const DEFAULT_REFRESH_RATE_FPS: u32 = 30;

/// Default per-task run budget (ms).
pub const DEFAULT_MAX_RUN_MS: u32 = 50;

/// Default navigation history depth.
pub const DEFAULT_HISTORY_DEPTH: usize = 16;

/// Default touch movement threshold (px).
pub const DEFAULT_TOUCH_MOVE_THRESHOLD_PX: i32 = 5;

/// Runtime configuration for the whole core.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OsConfig {
    /// Concurrency cap for the app manager. Must be ≥ 1.
    pub max_concurrent_apps: usize,

    /// Idle time before auto light-sleep (ms). 0 disables auto-sleep.
    pub sleep_timeout_ms: u32,

    /// Scheduler per-frame budget (ms). Must be ≥ 1.
    pub frame_budget_ms: u32,

    /// Async event queue capacity. Must be ≥ 1.
    pub event_queue_capacity: usize,

    /// Materialized non-persistent screen cap. Must be ≥ 1; the current
    /// screen is exempt.
    pub max_screens: usize,

    /// UI refresh cadence. Must be within 10–60.
    pub refresh_rate_fps: u32,

    /// Per-task overrun threshold (ms). Must be ≥ 1.
    pub default_max_run_ms: u32,

    /// Navigation history depth. Must be ≥ 1; oldest entries drop.
    pub history_depth: usize,

    /// Touch movement threshold (px). Must be ≥ 1.
    pub touch_move_threshold_px: i32,

    /// Advisory tracked-memory ceiling (bytes). 0 disables the check.
    pub memory_ceiling_bytes: usize,
}

impl Default for OsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_apps: DEFAULT_MAX_CONCURRENT_APPS,
            sleep_timeout_ms: DEFAULT_SLEEP_TIMEOUT_MS,
            frame_budget_ms: DEFAULT_FRAME_BUDGET_MS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            max_screens: DEFAULT_MAX_SCREENS,
            refresh_rate_fps: DEFAULT_REFRESH_RATE_FPS,
            default_max_run_ms: DEFAULT_MAX_RUN_MS,
            history_depth: DEFAULT_HISTORY_DEPTH,
            touch_move_threshold_px: DEFAULT_TOUCH_MOVE_THRESHOLD_PX,
            memory_ceiling_bytes: 0,
        }
    }
}

impl OsConfig {
    /// Check every field against its documented range.
    ///
    /// Returns [`SysError::InvalidParam`] on the first violation; the
    /// offending key is named in the log.
    pub fn validate(&self) -> SysResult<()> {
        let reject = |key: &str| {
            warn!(key, "configuration value out of range");
            Err(SysError::InvalidParam)
        };
        if self.max_concurrent_apps == 0 {
            return reject("max_concurrent_apps");
        }
        if self.frame_budget_ms == 0 {
            return reject("frame_budget_ms");
        }
        if self.event_queue_capacity == 0 {
            return reject("event_queue_capacity");
        }
        if self.max_screens == 0 {
            return reject("max_screens");
        }
        if !(10..=60).contains(&self.refresh_rate_fps) {
            return reject("refresh_rate_fps");
        }
        if self.default_max_run_ms == 0 {
            return reject("default_max_run_ms");
        }
        if self.history_depth == 0 {
            return reject("history_depth");
        }
        if self.touch_move_threshold_px < 1 {
            return reject("touch_move_threshold_px");
        }
        Ok(())
    }

    /// Frame interval implied by the refresh rate, in milliseconds.
    #[must_use]
    pub const fn frame_interval_ms(&self) -> u32 {
        1000 / self.refresh_rate_fps
    }
}
