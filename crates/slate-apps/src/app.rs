#![forbid(unsafe_code)]

//! The contract every application implements.
//!
//! Apps are opaque to the core: a factory produces a boxed instance, the
//! manager drives it through the lifecycle hooks, and the instance owns
//! its UI subtree exclusively. There is no base-class hierarchy: the
//! trait is the whole capability record.

use slate_core::error::SysResult;
use slate_core::event::EventEnvelope;
use slate_ui::tree::UiRoot;

/// Scheduling/eviction priority class of an app.
///
/// Ordering matters: eviction picks the lowest class first, and
/// `System` apps are never evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AppPriority {
    /// Background utilities, first to be evicted.
    Low,
    /// Ordinary user apps.
    #[default]
    Normal,
    /// Latency-sensitive apps.
    High,
    /// Core services; exempt from eviction.
    System,
}

/// Lifecycle state of a live app instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Registered but not instantiated, or fully stopped.
    Stopped,
    /// `initialize` in progress.
    Starting,
    /// Receiving updates and events.
    Running,
    /// Retained but not updated.
    Paused,
    /// `shutdown` in progress.
    Stopping,
    /// A lifecycle hook failed fatally.
    Error,
}

impl AppState {
    /// Whether this state counts against the concurrency cap.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Paused | Self::Stopping)
    }
}

/// Static identity of an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    /// Stable id, unique within the registry.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Semver-ish version string.
    pub version: String,
    /// Priority class.
    pub priority: AppPriority,
    /// Estimated resident footprint in bytes, for the memory ceiling.
    pub memory_estimate: usize,
}

impl AppDescriptor {
    /// Descriptor with `Normal` priority and no footprint estimate.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            priority: AppPriority::Normal,
            memory_estimate: 0,
        }
    }

    /// Set the priority class.
    #[must_use]
    pub fn with_priority(mut self, priority: AppPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the footprint estimate.
    #[must_use]
    pub fn with_memory_estimate(mut self, bytes: usize) -> Self {
        self.memory_estimate = bytes;
        self
    }
}

/// The application contract.
///
/// The manager guarantees hook ordering: `initialize` before anything
/// else, `update`/`handle_event` only between `initialize` and
/// `shutdown`, `destroy_ui` before `shutdown` when UI was created.
pub trait SlateApp {
    /// Static identity. Must be stable across calls.
    fn descriptor(&self) -> &AppDescriptor;

    /// One-time setup. Failure faults the launch.
    fn initialize(&mut self) -> SysResult<()>;

    /// Periodic work while `Running`. `delta_ms` is the time since the
    /// previous update.
    fn update(&mut self, delta_ms: u32) -> SysResult<()>;

    /// Final teardown. The instance is dropped afterwards.
    fn shutdown(&mut self) -> SysResult<()>;

    /// Build the app's UI under `parent`. Called when the app is given
    /// a screen to composite onto.
    fn create_ui(&mut self, parent: &mut UiRoot) -> SysResult<()>;

    /// Tear the UI back down. Called before eviction and shutdown.
    fn destroy_ui(&mut self) -> SysResult<()>;

    /// A bus event forwarded to this app. Default: ignore.
    fn handle_event(&mut self, _event: &EventEnvelope) -> SysResult<()> {
        Ok(())
    }
}

/// Produces a fresh instance of an app. Must be pure: every call returns
/// a new instance in its initial state.
pub type AppFactory = Box<dyn Fn() -> Box<dyn SlateApp>>;
