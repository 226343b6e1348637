#![forbid(unsafe_code)]

//! Slate OS public facade.
//!
//! This crate provides the stable, ergonomic surface for application and
//! HAL authors. It re-exports the common types from the internal crates
//! and offers a lightweight prelude for day-to-day usage.

// --- Core re-exports -------------------------------------------------------

pub use slate_core::bus::{BusSender, BusStats, EventBus, ListenerId};
pub use slate_core::config::OsConfig;
pub use slate_core::error::{SysError, SysResult};
pub use slate_core::event::{EventEnvelope, EventType};
pub use slate_core::geometry::{DISPLAY, DisplayExtent, Point};
pub use slate_core::time::{Clock, HostClock, SimClock, Ticks};

// --- HAL re-exports --------------------------------------------------------

pub use slate_hal::module::HalModule;
pub use slate_hal::power::{
    BatteryStatus, ButtonLatch, ChargeState, OutputChannel, PowerHal, WakeCause, WakeSources,
};
pub use slate_hal::storage::{DirEntry, StorageHal};
pub use slate_hal::touch::{MAX_TOUCH_POINTS, TouchHal, TouchPoint};

// --- Input re-exports ------------------------------------------------------

pub use slate_input::gesture::{Gesture, GestureConfig, GestureRecognizer};
pub use slate_input::pipeline::{TouchEvent, TouchEventKind, TouchPipeline};

// --- App re-exports --------------------------------------------------------

pub use slate_apps::app::{AppDescriptor, AppFactory, AppPriority, AppState, SlateApp};
pub use slate_apps::manager::{AppInfo, AppManager, AppManagerStats};

// --- UI re-exports ---------------------------------------------------------

pub use slate_ui::manager::{ScreenManager, ScreenManagerStats};
pub use slate_ui::transition::{Transition, TransitionProgress};
pub use slate_ui::tree::UiRoot;

// --- Runtime re-exports ----------------------------------------------------

pub use slate_runtime::kernel::Kernel;
pub use slate_runtime::memory::{AllocId, FixedPool, MemoryTracker};
pub use slate_runtime::power::{ButtonEvent, PowerManager, PowerManagerConfig, PowerState};
pub use slate_runtime::scheduler::{Scheduler, SchedulerConfig, SchedulerStats, TaskId, TaskState};

/// Convenience imports for app authors.
pub mod prelude {
    pub use crate::{
        AppDescriptor, AppPriority, EventEnvelope, EventType, OsConfig, SlateApp, SysError,
        SysResult, Ticks, UiRoot,
    };
}
