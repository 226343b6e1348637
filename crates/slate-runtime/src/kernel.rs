#![forbid(unsafe_code)]

//! The OS coordinator.
//!
//! One [`Kernel`] owns every subsystem and drives the whole core from
//! [`tick`](Kernel::tick). There are no global singletons: the kernel is
//! constructed once at boot, subsystems are reached through explicit
//! accessors, and everything runs on the thread that calls `tick`.
//!
//! # Boot
//!
//! Boot is a staged pipeline. Configuration validation failure is fatal;
//! a HAL module that fails init or self-test only degrades its own
//! surface (operations on it return `NotAvailable`) while the rest of
//! the system keeps running.
//!
//! # Tick order
//!
//! Stable across ticks, observable by subscribers:
//!
//! 1. clock advance
//! 2. HAL poll (touch, power, storage)
//! 3. input pipeline (raw touches → semantic events, published async)
//! 4. event-bus drain (bounded)
//! 5. scheduler frame
//! 6. screen manager upkeep
//! 7. app manager update
//! 8. power manager update (button, battery, faults, sleep timers)

use slate_apps::manager::AppManager;
use slate_core::bus::EventBus;
use slate_core::config::OsConfig;
use slate_core::error::{SysError, SysResult};
use slate_core::event::{EventEnvelope, EventType};
use slate_core::time::{Clock, Ticks};
use slate_hal::module::HalModule;
use slate_hal::power::{PowerHal, WakeCause};
use slate_hal::storage::StorageHal;
use slate_hal::touch::TouchHal;
use slate_input::gesture::GestureConfig;
use slate_input::pipeline::TouchPipeline;
use slate_ui::manager::ScreenManager;
use tracing::{info, warn};

use crate::memory::MemoryTracker;
use crate::power::{PowerManager, PowerManagerConfig, PowerState};
use crate::scheduler::{Scheduler, SchedulerConfig};

/// The singleton-by-construction coordinator.
pub struct Kernel<C: Clock> {
    clock: C,
    config: OsConfig,
    bus: EventBus,
    memory: MemoryTracker,
    scheduler: Scheduler,
    power: PowerManager,
    input: TouchPipeline,
    screens: ScreenManager,
    apps: AppManager,
    touch_hal: Box<dyn TouchHal>,
    power_hal: Box<dyn PowerHal>,
    storage_hal: Option<Box<dyn StorageHal>>,
    touch_available: bool,
    power_available: bool,
    storage_available: bool,
    booted: bool,
    last_tick: Option<Ticks>,
    ticks: u64,
}

impl<C: Clock> Kernel<C> {
    /// Assemble a kernel. Fails fast on invalid configuration.
    pub fn new(
        config: OsConfig,
        clock: C,
        touch_hal: Box<dyn TouchHal>,
        power_hal: Box<dyn PowerHal>,
        storage_hal: Option<Box<dyn StorageHal>>,
    ) -> SysResult<Self> {
        config.validate()?;
        let now = clock.now();
        let bus = EventBus::new(config.event_queue_capacity);
        let scheduler = Scheduler::new(SchedulerConfig {
            frame_budget_ms: config.frame_budget_ms,
            default_max_run_ms: config.default_max_run_ms,
            ..SchedulerConfig::default()
        });
        let power = PowerManager::new(
            PowerManagerConfig {
                sleep_timeout_ms: config.sleep_timeout_ms,
                ..PowerManagerConfig::default()
            },
            now,
        );
        let input = TouchPipeline::new(config.touch_move_threshold_px, GestureConfig::default());
        let screens = ScreenManager::new(config.max_screens, config.history_depth);
        let apps = AppManager::new(config.max_concurrent_apps, config.memory_ceiling_bytes);
        let memory = MemoryTracker::new(config.memory_ceiling_bytes);

        Ok(Self {
            clock,
            config,
            bus,
            memory,
            scheduler,
            power,
            input,
            screens,
            apps,
            touch_hal,
            power_hal,
            storage_hal,
            touch_available: false,
            power_available: false,
            storage_available: false,
            booted: false,
            last_tick: None,
            ticks: 0,
        })
    }

    /// Run the staged boot pipeline.
    ///
    /// HAL stages degrade on failure rather than aborting; the
    /// completion event fires either way.
    pub fn boot(&mut self) -> SysResult<()> {
        if self.booted {
            return Ok(());
        }
        let now = self.clock.now();

        self.touch_available = bring_up(self.touch_hal.as_mut());
        self.power_available = bring_up(self.power_hal.as_mut());
        self.storage_available = match &mut self.storage_hal {
            Some(storage) => {
                let up = bring_up(storage.as_mut());
                if up && let Err(err) = storage.mount() {
                    warn!(%err, "storage mount failed; degraded");
                    false
                } else {
                    up
                }
            }
            None => false,
        };

        self.booted = true;
        info!(
            touch = self.touch_available,
            power = self.power_available,
            storage = self.storage_available,
            "boot complete"
        );
        self.bus
            .publish_sync(&EventEnvelope::new(EventType::SYS_BOOT_COMPLETE, now, "kernel"));
        Ok(())
    }

    /// Drive one tick. See the module docs for the stage order.
    pub fn tick(&mut self) -> SysResult<()> {
        if !self.booted {
            return Err(SysError::InvalidState);
        }
        let now = self.clock.now();
        let delta = self.last_tick.map_or(0, |t| now.since(t));
        self.last_tick = Some(now);

        // HAL poll.
        if self.touch_available && let Err(err) = self.touch_hal.update(now) {
            warn!(%err, "touch poll failed");
        }
        if self.power_available && let Err(err) = self.power_hal.update(now) {
            warn!(%err, "power poll failed");
        }
        if self.storage_available
            && let Some(storage) = &mut self.storage_hal
            && let Err(err) = storage.update(now)
        {
            warn!(%err, "storage poll failed");
        }

        // Input pipeline. Contacts are copied out so the HAL borrow ends
        // before events are published.
        if self.touch_available {
            let frame: Vec<_> = self.touch_hal.touches().to_vec();
            let events: Vec<_> = self.input.update(&frame, now).to_vec();
            if !events.is_empty() {
                self.power.note_activity(now);
                if self.power.state().is_sleeping() {
                    self.power.wake(WakeCause::Touch, now, &mut self.bus);
                }
            }
            for event in &events {
                if !self.bus.publish_async(event.to_envelope("input")) {
                    warn!(kind = ?event.kind, "input event dropped; queue full");
                }
            }
        }

        // Bounded bus drain, then the scheduler frame.
        self.bus.process_events();
        self.scheduler.update(now);

        // Managers.
        self.screens.update(now);
        self.screens.cleanup_screens();
        self.apps.update(delta, now, &mut self.bus);
        if self.power_available {
            self.power.update(self.power_hal.as_mut(), now, &mut self.bus);
        }

        self.ticks += 1;
        Ok(())
    }

    /// Orderly shutdown: apps stopped, peripherals gated and released.
    pub fn shutdown(&mut self) {
        let now = self.clock.now();
        self.apps.kill_all_apps(now, &mut self.bus);
        self.scheduler.clear();
        if self.power_available
            && let Err(err) = self.power.request_shutdown(self.power_hal.as_mut(), now, &mut self.bus)
        {
            warn!(%err, "power shutdown failed");
        }
        if let Some(storage) = &mut self.storage_hal {
            let _ = storage.unmount();
            let _ = storage.shutdown();
        }
        let _ = self.touch_hal.shutdown();
        let _ = self.power_hal.shutdown();
        self.booted = false;
        info!("kernel shut down");
    }

    // --- Accessors ---------------------------------------------------------

    /// Current monotonic time.
    pub fn now(&self) -> Ticks {
        self.clock.now()
    }

    /// The configuration the kernel booted with.
    #[must_use]
    pub fn config(&self) -> &OsConfig {
        &self.config
    }

    /// Ticks driven since boot.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// The event bus.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// The task scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The screen manager.
    pub fn screens_mut(&mut self) -> &mut ScreenManager {
        &mut self.screens
    }

    /// The app manager together with the bus, for lifecycle calls that
    /// publish events.
    pub fn apps_mut(&mut self) -> (&mut AppManager, &mut EventBus) {
        (&mut self.apps, &mut self.bus)
    }

    /// The power governor together with its HAL and the bus.
    pub fn power_mut(&mut self) -> (&mut PowerManager, &mut dyn PowerHal, &mut EventBus) {
        (&mut self.power, self.power_hal.as_mut(), &mut self.bus)
    }

    /// The memory tracker.
    pub fn memory_mut(&mut self) -> &mut MemoryTracker {
        &mut self.memory
    }

    /// Current power state.
    #[must_use]
    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    /// Storage access. `NotSupported` when the device has no storage
    /// fitted, `NotAvailable` when it failed bring-up.
    pub fn storage_mut(&mut self) -> SysResult<&mut dyn StorageHal> {
        match &mut self.storage_hal {
            None => Err(SysError::NotSupported),
            Some(_) if !self.storage_available => Err(SysError::NotAvailable),
            Some(storage) => Ok(storage.as_mut()),
        }
    }

    /// Touch sensitivity passthrough; `NotAvailable` when degraded.
    pub fn set_touch_sensitivity(&mut self, level: u8) -> SysResult<()> {
        if !self.touch_available {
            return Err(SysError::NotAvailable);
        }
        self.touch_hal.set_sensitivity(level)
    }
}

impl<C: Clock> std::fmt::Debug for Kernel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("booted", &self.booted)
            .field("ticks", &self.ticks)
            .field("power_state", &self.power.state())
            .finish_non_exhaustive()
    }
}

/// Initialize one HAL module and self-test it. Failures degrade.
fn bring_up(module: &mut (impl HalModule + ?Sized)) -> bool {
    if let Err(err) = module.initialize() {
        warn!(module = module.name(), %err, "HAL init failed; degraded");
        return false;
    }
    if !module.self_test() {
        warn!(module = module.name(), "HAL self-test failed; degraded");
        return false;
    }
    true
}
