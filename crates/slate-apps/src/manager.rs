#![forbid(unsafe_code)]

//! App registry, lifecycle state machine, and eviction.
//!
//! # Lifecycle
//!
//! ```text
//! STOPPED ──start──▶ STARTING ──ok──▶ RUNNING
//! RUNNING ──pause──▶ PAUSED ──resume──▶ RUNNING
//! RUNNING / PAUSED ──stop──▶ STOPPING ──ok──▶ STOPPED
//! (any) ──fatal──▶ ERROR
//! ```
//!
//! Every transition publishes its lifecycle event on the bus with the app
//! id as payload. Start on a running app is idempotent (no second launch
//! event); start on a paused app resumes it; stop on a stopped app is a
//! no-op.
//!
//! # Invariants
//!
//! 1. At most one live instance per registered id
//! 2. Live instances (Starting ∪ Running ∪ Paused ∪ Stopping) never
//!    exceed the concurrency cap
//! 3. Zero or one foreground app
//! 4. System-priority apps are never evicted; if every candidate is
//!    exempt, the incoming launch fails with `Busy`

use std::collections::BTreeMap;

use slate_core::bus::EventBus;
use slate_core::error::{SysError, SysResult};
use slate_core::event::{EventEnvelope, EventType};
use slate_core::time::Ticks;
use slate_ui::tree::UiRoot;
use tracing::{debug, info, warn};

use crate::app::{AppDescriptor, AppFactory, AppPriority, AppState, SlateApp};

/// Launch/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppManagerStats {
    /// Successful launches (fresh instances only).
    pub launches: u64,
    /// Instances evicted to make room.
    pub evictions: u64,
    /// Explicit kills.
    pub kills: u64,
    /// Instances that entered the error state.
    pub faults: u64,
}

/// Snapshot of one app's runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Stable id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Priority class.
    pub priority: AppPriority,
    /// Current lifecycle state.
    pub state: AppState,
    /// When the instance was launched.
    pub started_at: Ticks,
    /// Last time the app held foreground focus.
    pub last_focus: Ticks,
    /// Estimated resident footprint in bytes.
    pub memory_estimate: usize,
}

struct LiveApp {
    app: Box<dyn SlateApp>,
    state: AppState,
    started_at: Ticks,
    last_focus: Ticks,
    has_ui: bool,
}

impl LiveApp {
    fn descriptor(&self) -> &AppDescriptor {
        self.app.descriptor()
    }
}

/// Registry of factories and fleet of live instances.
pub struct AppManager {
    factories: BTreeMap<String, AppFactory>,
    live: BTreeMap<String, LiveApp>,
    foreground: Option<String>,
    max_concurrent: usize,
    memory_ceiling: usize,
    stats: AppManagerStats,
}

impl AppManager {
    /// Create a manager. `memory_ceiling` of 0 disables the footprint
    /// check.
    #[must_use]
    pub fn new(max_concurrent: usize, memory_ceiling: usize) -> Self {
        Self {
            factories: BTreeMap::new(),
            live: BTreeMap::new(),
            foreground: None,
            max_concurrent: max_concurrent.max(1),
            memory_ceiling,
            stats: AppManagerStats::default(),
        }
    }

    // --- Registry ----------------------------------------------------------

    /// Register a factory for an app id.
    pub fn register_app(&mut self, id: &str, factory: AppFactory) -> SysResult<()> {
        if id.is_empty() {
            return Err(SysError::InvalidParam);
        }
        if self.factories.contains_key(id) {
            return Err(SysError::Busy);
        }
        self.factories.insert(id.to_owned(), factory);
        Ok(())
    }

    /// Remove a factory. Refused while an instance is live.
    pub fn unregister_app(&mut self, id: &str) -> SysResult<()> {
        if self.live.contains_key(id) {
            return Err(SysError::Busy);
        }
        self.factories.remove(id).map(|_| ()).ok_or(SysError::NotFound)
    }

    /// Registered app ids.
    #[must_use]
    pub fn registered_apps(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Ids of live instances.
    #[must_use]
    pub fn running_apps(&self) -> Vec<&str> {
        self.live
            .iter()
            .filter(|(_, a)| a.state.is_live())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Snapshot of one app's runtime state.
    #[must_use]
    pub fn app_info(&self, id: &str) -> Option<AppInfo> {
        let live = self.live.get(id)?;
        let desc = live.descriptor();
        Some(AppInfo {
            id: desc.id.clone(),
            name: desc.name.clone(),
            version: desc.version.clone(),
            priority: desc.priority,
            state: live.state,
            started_at: live.started_at,
            last_focus: live.last_focus,
            memory_estimate: desc.memory_estimate,
        })
    }

    /// The foreground app id, if one is designated.
    #[must_use]
    pub fn foreground_app(&self) -> Option<&str> {
        self.foreground.as_deref()
    }

    /// Number of instances counting against the cap.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.values().filter(|a| a.state.is_live()).count()
    }

    /// Launch/eviction counters.
    #[must_use]
    pub fn stats(&self) -> AppManagerStats {
        self.stats
    }

    // --- Lifecycle ---------------------------------------------------------

    /// Launch an app.
    ///
    /// Running is idempotent; Paused resumes; a fresh launch evicts to
    /// make room if the cap is reached. An errored instance is discarded
    /// and relaunched fresh.
    pub fn launch_app(&mut self, id: &str, now: Ticks, bus: &mut EventBus) -> SysResult<()> {
        if !self.factories.contains_key(id) {
            return Err(SysError::NotFound);
        }

        if let Some(live) = self.live.get_mut(id) {
            match live.state {
                AppState::Running | AppState::Starting => return Ok(()),
                AppState::Paused => return self.resume_app(id, now, bus),
                AppState::Stopping => return Err(SysError::Busy),
                AppState::Error => {
                    // A faulted instance blocks its slot until relaunch.
                    self.discard(id);
                }
                AppState::Stopped => {
                    self.live.remove(id);
                }
            }
        }

        if self.live_count() >= self.max_concurrent {
            let victim = self.eviction_candidate().ok_or(SysError::Busy)?;
            self.evict(&victim, now, bus);
        }

        let factory = self.factories.get(id).ok_or(SysError::NotFound)?;
        let mut app = factory();
        if app.descriptor().id != id {
            warn!(id, reported = %app.descriptor().id, "factory produced mismatched id");
            return Err(SysError::InvalidParam);
        }

        debug!(id, "app starting");
        if let Err(err) = app.initialize() {
            warn!(id, %err, "app initialize failed");
            publish_lifecycle(bus, EventType::APP_FAULTED, id, now);
            self.stats.faults += 1;
            return Err(err);
        }

        self.live.insert(
            id.to_owned(),
            LiveApp {
                app,
                state: AppState::Running,
                started_at: now,
                last_focus: now,
                has_ui: false,
            },
        );
        self.stats.launches += 1;
        info!(id, "app launched");
        publish_lifecycle(bus, EventType::APP_LAUNCHED, id, now);
        Ok(())
    }

    /// Stop and destroy an instance. A registered id with no live
    /// instance is a no-op; an unknown id is `NotFound`.
    pub fn kill_app(&mut self, id: &str, now: Ticks, bus: &mut EventBus) -> SysResult<()> {
        if !self.live.contains_key(id) {
            return if self.factories.contains_key(id) {
                Ok(())
            } else {
                Err(SysError::NotFound)
            };
        }
        self.stop_instance(id, now, bus);
        self.stats.kills += 1;
        Ok(())
    }

    /// Stop every live instance.
    pub fn kill_all_apps(&mut self, now: Ticks, bus: &mut EventBus) {
        let ids: Vec<String> = self.live.keys().cloned().collect();
        for id in ids {
            self.stop_instance(&id, now, bus);
        }
    }

    /// Pause a running app.
    pub fn pause_app(&mut self, id: &str, now: Ticks, bus: &mut EventBus) -> SysResult<()> {
        let live = self.live.get_mut(id).ok_or(SysError::NotFound)?;
        if live.state != AppState::Running {
            return Err(SysError::InvalidState);
        }
        live.state = AppState::Paused;
        publish_lifecycle(bus, EventType::APP_SUSPENDED, id, now);
        Ok(())
    }

    /// Resume a paused app.
    pub fn resume_app(&mut self, id: &str, now: Ticks, bus: &mut EventBus) -> SysResult<()> {
        let live = self.live.get_mut(id).ok_or(SysError::NotFound)?;
        if live.state != AppState::Paused {
            return Err(SysError::InvalidState);
        }
        live.state = AppState::Running;
        publish_lifecycle(bus, EventType::APP_RESUMED, id, now);
        Ok(())
    }

    /// Designate the foreground app, pausing the previous one.
    ///
    /// The target must be live; a paused target resumes.
    pub fn switch_to_app(&mut self, id: &str, now: Ticks, bus: &mut EventBus) -> SysResult<()> {
        let state = self.live.get(id).map(|a| a.state).ok_or(SysError::NotFound)?;
        match state {
            AppState::Paused => self.resume_app(id, now, bus)?,
            AppState::Running => {}
            _ => return Err(SysError::InvalidState),
        }

        if self.foreground.as_deref() == Some(id) {
            if let Some(live) = self.live.get_mut(id) {
                live.last_focus = now;
            }
            return Ok(());
        }

        if let Some(prev) = self.foreground.take()
            && prev != id
            && let Some(live) = self.live.get_mut(&prev)
            && live.state == AppState::Running
        {
            live.state = AppState::Paused;
            publish_lifecycle(bus, EventType::APP_SUSPENDED, &prev, now);
        }

        if let Some(live) = self.live.get_mut(id) {
            live.last_focus = now;
        }
        self.foreground = Some(id.to_owned());
        debug!(id, "foreground switched");
        Ok(())
    }

    /// Forward a bus event to one app.
    ///
    /// Only Running and Paused instances accept events; anything else is
    /// [`SysError::InvalidState`].
    pub fn deliver_event(&mut self, id: &str, event: &EventEnvelope) -> SysResult<()> {
        let live = self.live.get_mut(id).ok_or(SysError::NotFound)?;
        match live.state {
            AppState::Running | AppState::Paused => live.app.handle_event(event),
            _ => Err(SysError::InvalidState),
        }
    }

    /// Attach an app's UI under a parent root.
    pub fn attach_ui(&mut self, id: &str, parent: &mut UiRoot) -> SysResult<()> {
        let live = self.live.get_mut(id).ok_or(SysError::NotFound)?;
        if live.has_ui {
            return Ok(());
        }
        live.app.create_ui(parent)?;
        live.has_ui = true;
        Ok(())
    }

    /// Tear an app's UI back down.
    pub fn detach_ui(&mut self, id: &str) -> SysResult<()> {
        let live = self.live.get_mut(id).ok_or(SysError::NotFound)?;
        if !live.has_ui {
            return Ok(());
        }
        live.app.destroy_ui()?;
        live.has_ui = false;
        Ok(())
    }

    // --- Periodic update ---------------------------------------------------

    /// Drive every running instance, sweep stopped ones, and enforce the
    /// memory ceiling.
    pub fn update(&mut self, delta_ms: u32, now: Ticks, bus: &mut EventBus) {
        let ids: Vec<String> = self.live.keys().cloned().collect();
        for id in &ids {
            let Some(live) = self.live.get_mut(id) else { continue };
            if live.state != AppState::Running {
                continue;
            }
            if let Err(err) = live.app.update(delta_ms) {
                warn!(app = %id, %err, "app update failed; faulting");
                live.state = AppState::Error;
                self.stats.faults += 1;
                if self.foreground.as_deref() == Some(id.as_str()) {
                    self.foreground = None;
                }
                publish_lifecycle(bus, EventType::APP_FAULTED, id, now);
            }
        }

        self.live.retain(|_, a| a.state != AppState::Stopped);

        if self.memory_ceiling > 0 {
            self.enforce_memory_ceiling(now, bus);
        }
    }

    // --- Internals ---------------------------------------------------------

    /// Pick the instance a fresh launch may displace: lowest priority
    /// class, oldest focus, never foreground or System.
    fn eviction_candidate(&self) -> Option<String> {
        self.live
            .iter()
            .filter(|(id, a)| {
                matches!(a.state, AppState::Running | AppState::Paused)
                    && self.foreground.as_deref() != Some(id.as_str())
                    && a.descriptor().priority != AppPriority::System
            })
            .min_by_key(|(id, a)| {
                (a.descriptor().priority, a.last_focus.as_millis(), id.as_str())
            })
            .map(|(id, _)| id.clone())
    }

    fn evict(&mut self, id: &str, now: Ticks, bus: &mut EventBus) {
        info!(id, "app evicted");
        self.stop_instance(id, now, bus);
        self.stats.evictions += 1;
    }

    /// Full stop path: STOPPING, UI teardown, shutdown, STOPPED, exit
    /// event, instance dropped. Hook failures are logged, never fatal.
    fn stop_instance(&mut self, id: &str, now: Ticks, bus: &mut EventBus) {
        let Some(mut live) = self.live.remove(id) else { return };
        live.state = AppState::Stopping;
        if live.has_ui
            && let Err(err) = live.app.destroy_ui()
        {
            warn!(id, %err, "destroy_ui failed during stop");
        }
        if let Err(err) = live.app.shutdown() {
            warn!(id, %err, "shutdown hook failed");
        }
        live.state = AppState::Stopped;
        if self.foreground.as_deref() == Some(id) {
            self.foreground = None;
        }
        publish_lifecycle(bus, EventType::APP_EXITED, id, now);
        debug!(id, "app stopped");
    }

    /// Drop a faulted instance without the stop ceremony.
    fn discard(&mut self, id: &str) {
        if let Some(mut live) = self.live.remove(id) {
            if live.has_ui {
                let _ = live.app.destroy_ui();
            }
            if self.foreground.as_deref() == Some(id) {
                self.foreground = None;
            }
        }
    }

    fn enforce_memory_ceiling(&mut self, now: Ticks, bus: &mut EventBus) {
        loop {
            let total: usize = self
                .live
                .values()
                .filter(|a| a.state.is_live())
                .map(|a| a.descriptor().memory_estimate)
                .sum();
            if total <= self.memory_ceiling {
                return;
            }
            let Some(victim) = self.eviction_candidate() else {
                warn!(total, ceiling = self.memory_ceiling, "over memory ceiling with no eviction candidate");
                return;
            };
            self.evict(&victim, now, bus);
        }
    }
}

impl std::fmt::Debug for AppManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppManager")
            .field("registered", &self.factories.len())
            .field("live", &self.live.len())
            .field("foreground", &self.foreground)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn publish_lifecycle(bus: &mut EventBus, event_type: EventType, id: &str, now: Ticks) {
    let event = EventEnvelope::new(event_type, now, "apps").with_payload(id.as_bytes().to_vec());
    bus.publish_sync(&event);
}
