#![forbid(unsafe_code)]

//! Power governance: sleep state machine, button classification, wake
//! locks, battery and fault monitoring.
//!
//! # State machine
//!
//! ```text
//! ACTIVE ──half timeout──▶ IDLE ──timeout──▶ LIGHT_SLEEP
//! IDLE / LIGHT_SLEEP ──activity / button / touch──▶ ACTIVE
//! ACTIVE ──explicit──▶ DEEP_SLEEP   (radios off, wake sources armed)
//! any ──explicit──▶ SHUTDOWN        (outputs and radios off)
//! ```
//!
//! Auto-sleep is held off while any wake lock is outstanding. Button
//! edges come from the ISR latch; classification happens here, on the
//! single consumer side, never in interrupt context.

use std::collections::BTreeMap;

use slate_core::bus::EventBus;
use slate_core::error::{SysError, SysResult};
use slate_core::event::{EventEnvelope, EventType};
use slate_core::time::Ticks;
use slate_hal::power::{OutputChannel, PowerHal, WakeCause, WakeSources};
use tracing::{debug, info, warn};

/// Sleep and peripheral-gating states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Fully on.
    #[default]
    Active,
    /// Inactivity past half the sleep timeout; display may dim.
    Idle,
    /// Display off, peripherals clocked down, wake on timer/button/touch.
    LightSleep,
    /// Radios off, only armed wake sources can rouse the system.
    DeepSleep,
    /// Switched outputs and radios disabled; requires re-init.
    Shutdown,
}

impl PowerState {
    /// Stable payload byte for `SYS_SLEEP_ENTER` events.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Idle => 1,
            Self::LightSleep => 2,
            Self::DeepSleep => 3,
            Self::Shutdown => 4,
        }
    }

    /// Whether this is a sleep state.
    #[must_use]
    pub const fn is_sleeping(self) -> bool {
        matches!(self, Self::LightSleep | Self::DeepSleep)
    }
}

/// Classified power-button events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Debounced press shorter than the long-press floor.
    ShortPress,
    /// Press arriving within the double-press gap of the previous release.
    DoublePress,
    /// Press held past the long-press floor.
    LongPress,
}

impl ButtonEvent {
    /// Stable payload byte for `SYS_BUTTON` events.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::ShortPress => 0,
            Self::DoublePress => 1,
            Self::LongPress => 2,
        }
    }
}

/// Power manager tuning.
#[derive(Debug, Clone)]
pub struct PowerManagerConfig {
    /// Idle time before light sleep (ms). 0 disables auto-sleep.
    pub sleep_timeout_ms: u32,

    /// Minimum press duration to register at all (ms). Default: 50.
    pub debounce_ms: u32,

    /// Maximum release-to-press gap for a double press (ms). Default: 200.
    pub double_press_gap_ms: u32,

    /// Minimum hold for a long press (ms). Default: 2000.
    pub long_press_ms: u32,

    /// Battery percentage that triggers the low-battery event. Default: 15.
    pub low_battery_percent: u8,
}

impl Default for PowerManagerConfig {
    fn default() -> Self {
        Self {
            sleep_timeout_ms: 30_000,
            debounce_ms: 50,
            double_press_gap_ms: 200,
            long_press_ms: 2000,
            low_battery_percent: 15,
        }
    }
}

/// Sleep/wake counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerStats {
    /// Sleep entries (light and deep).
    pub sleeps: u64,
    /// Wakes.
    pub wakes: u64,
    /// Classified button events.
    pub button_events: u64,
    /// Bounces discarded by the debounce floor.
    pub bounces: u64,
}

/// The power governor.
pub struct PowerManager {
    config: PowerManagerConfig,
    state: PowerState,
    last_activity: Ticks,
    last_wake_cause: WakeCause,
    wake_locks: BTreeMap<String, u32>,
    pending_press: Option<Ticks>,
    last_release: Option<Ticks>,
    low_battery_signaled: bool,
    fault_signaled: [bool; 2],
    stats: PowerStats,
}

impl PowerManager {
    /// Create a governor in the Active state.
    #[must_use]
    pub fn new(config: PowerManagerConfig, now: Ticks) -> Self {
        Self {
            config,
            state: PowerState::Active,
            last_activity: now,
            last_wake_cause: WakeCause::Unknown,
            wake_locks: BTreeMap::new(),
            pending_press: None,
            last_release: None,
            low_battery_signaled: false,
            fault_signaled: [false; 2],
            stats: PowerStats::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Why the last sleep ended.
    #[must_use]
    pub fn wake_cause(&self) -> WakeCause {
        self.last_wake_cause
    }

    /// Record user/system activity, deferring auto-sleep.
    pub fn note_activity(&mut self, now: Ticks) {
        self.last_activity = now;
        if self.state == PowerState::Idle {
            self.state = PowerState::Active;
        }
    }

    /// Milliseconds since the last recorded activity.
    #[must_use]
    pub fn idle_ms(&self, now: Ticks) -> u32 {
        now.since(self.last_activity)
    }

    // --- Wake locks --------------------------------------------------------

    /// Hold off auto-sleep. Locks are counted per holder tag.
    pub fn acquire_wake_lock(&mut self, tag: &str) {
        *self.wake_locks.entry(tag.to_owned()).or_insert(0) += 1;
    }

    /// Release one count of a holder's lock. Returns whether a lock was
    /// held under the tag.
    pub fn release_wake_lock(&mut self, tag: &str) -> bool {
        match self.wake_locks.get_mut(tag) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.wake_locks.remove(tag);
                }
                true
            }
            None => false,
        }
    }

    /// Whether any wake lock is outstanding.
    #[must_use]
    pub fn has_wake_lock(&self) -> bool {
        !self.wake_locks.is_empty()
    }

    // --- Transitions -------------------------------------------------------

    /// Explicit deep-sleep request. Radios go down first, then the wake
    /// sources are armed.
    pub fn request_deep_sleep<P: PowerHal + ?Sized>(
        &mut self,
        hal: &mut P,
        sources: WakeSources,
        now: Ticks,
        bus: &mut EventBus,
    ) -> SysResult<()> {
        if self.state == PowerState::Shutdown {
            return Err(SysError::InvalidState);
        }
        hal.set_wifi(false)?;
        hal.set_bluetooth(false)?;
        hal.arm_wake_sources(sources)?;
        self.enter_sleep(PowerState::DeepSleep, now, bus);
        Ok(())
    }

    /// Explicit shutdown. Outputs and radios are disabled.
    pub fn request_shutdown<P: PowerHal + ?Sized>(
        &mut self,
        hal: &mut P,
        now: Ticks,
        bus: &mut EventBus,
    ) -> SysResult<()> {
        hal.set_output(OutputChannel::Ch1, false)?;
        hal.set_output(OutputChannel::Ch2, false)?;
        hal.set_wifi(false)?;
        hal.set_bluetooth(false)?;
        self.state = PowerState::Shutdown;
        info!("shutdown requested");
        bus.publish_sync(
            &EventEnvelope::new(EventType::SYS_SHUTDOWN, now, "power"),
        );
        Ok(())
    }

    /// Wake from a sleep state. No-op when not sleeping.
    pub fn wake(&mut self, cause: WakeCause, now: Ticks, bus: &mut EventBus) {
        if !self.state.is_sleeping() {
            return;
        }
        self.state = PowerState::Active;
        self.last_activity = now;
        self.last_wake_cause = cause;
        self.stats.wakes += 1;
        info!(?cause, "woke from sleep");
        bus.publish_sync(
            &EventEnvelope::new(EventType::SYS_WAKE, now, "power")
                .with_payload(vec![cause.as_byte()]),
        );
    }

    /// Whether either switched output reports a fault.
    pub fn has_5v_output_fault<P: PowerHal + ?Sized>(&self, hal: &P) -> bool {
        hal.output_fault(OutputChannel::Ch1) || hal.output_fault(OutputChannel::Ch2)
    }

    // --- Per-tick update ---------------------------------------------------

    /// Poll the button latch, battery, and fault lines; run the sleep
    /// timers.
    pub fn update<P: PowerHal + ?Sized>(&mut self, hal: &mut P, now: Ticks, bus: &mut EventBus) {
        if self.state == PowerState::Shutdown {
            return;
        }

        self.poll_button(hal, now, bus);
        self.poll_battery(hal, now, bus);
        self.poll_faults(hal, now, bus);

        // Auto-sleep timers.
        if self.config.sleep_timeout_ms > 0
            && !self.has_wake_lock()
            && matches!(self.state, PowerState::Active | PowerState::Idle)
        {
            let idle = self.idle_ms(now);
            if idle >= self.config.sleep_timeout_ms {
                self.enter_sleep(PowerState::LightSleep, now, bus);
            } else if idle >= self.config.sleep_timeout_ms / 2 && self.state == PowerState::Active {
                self.state = PowerState::Idle;
                debug!("idle");
            }
        }
    }

    /// Sleep/wake counters.
    #[must_use]
    pub fn stats(&self) -> PowerStats {
        self.stats
    }

    // --- Internals ---------------------------------------------------------

    fn enter_sleep(&mut self, state: PowerState, now: Ticks, bus: &mut EventBus) {
        self.state = state;
        self.stats.sleeps += 1;
        info!(?state, "entering sleep");
        bus.publish_sync(
            &EventEnvelope::new(EventType::SYS_SLEEP_ENTER, now, "power")
                .with_payload(vec![state.as_byte()]),
        );
    }

    fn poll_button<P: PowerHal + ?Sized>(&mut self, hal: &mut P, now: Ticks, bus: &mut EventBus) {
        if let Some(press) = hal.button_latch().take_press() {
            if self.state.is_sleeping() {
                self.wake(WakeCause::PowerButton, now, bus);
            }
            self.pending_press = Some(press);
            self.note_activity(now);
        }

        if let Some(release) = hal.button_latch().take_release()
            && let Some(press) = self.pending_press.take()
        {
            let held = release.since(press);
            if held < self.config.debounce_ms {
                self.stats.bounces += 1;
                return;
            }
            let event = if held >= self.config.long_press_ms {
                ButtonEvent::LongPress
            } else if self
                .last_release
                .is_some_and(|prev| press.since(prev) <= self.config.double_press_gap_ms)
            {
                ButtonEvent::DoublePress
            } else {
                ButtonEvent::ShortPress
            };
            self.last_release = Some(release);
            self.stats.button_events += 1;
            self.note_activity(now);
            debug!(?event, held, "button classified");
            bus.publish_sync(
                &EventEnvelope::new(EventType::SYS_BUTTON, now, "power")
                    .with_payload(vec![event.as_byte()]),
            );
        }
    }

    fn poll_battery<P: PowerHal + ?Sized>(&mut self, hal: &P, now: Ticks, bus: &mut EventBus) {
        let battery = hal.battery();
        if battery.percent <= self.config.low_battery_percent {
            if !self.low_battery_signaled {
                self.low_battery_signaled = true;
                warn!(percent = battery.percent, "battery low");
                bus.publish_sync(
                    &EventEnvelope::new(EventType::SYS_LOW_BATTERY, now, "power")
                        .with_payload(vec![battery.percent]),
                );
            }
        } else {
            self.low_battery_signaled = false;
        }
    }

    fn poll_faults<P: PowerHal + ?Sized>(&mut self, hal: &P, now: Ticks, bus: &mut EventBus) {
        for (idx, channel) in [OutputChannel::Ch1, OutputChannel::Ch2].into_iter().enumerate() {
            let faulted = hal.output_fault(channel);
            if faulted && !self.fault_signaled[idx] {
                warn!(?channel, "switched output fault");
                bus.publish_sync(
                    &EventEnvelope::new(EventType::HAL_OUTPUT_FAULT, now, "power")
                        .with_payload(vec![idx as u8]),
                );
            }
            self.fault_signaled[idx] = faulted;
        }
    }
}

impl std::fmt::Debug for PowerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerManager")
            .field("state", &self.state)
            .field("wake_locks", &self.wake_locks.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_hal::module::HalModule;
    use slate_hal::sim::SimPower;

    fn fixture(sleep_timeout_ms: u32) -> (PowerManager, SimPower, EventBus) {
        let mut hal = SimPower::new();
        hal.initialize().unwrap();
        let config = PowerManagerConfig {
            sleep_timeout_ms,
            ..PowerManagerConfig::default()
        };
        (PowerManager::new(config, Ticks(0)), hal, EventBus::new(16))
    }

    #[test]
    fn idles_then_sleeps_on_timeout() {
        let (mut pm, mut hal, mut bus) = fixture(1000);
        pm.update(&mut hal, Ticks(400), &mut bus);
        assert_eq!(pm.state(), PowerState::Active);

        pm.update(&mut hal, Ticks(600), &mut bus);
        assert_eq!(pm.state(), PowerState::Idle);

        pm.update(&mut hal, Ticks(1100), &mut bus);
        assert_eq!(pm.state(), PowerState::LightSleep);
        assert_eq!(pm.stats().sleeps, 1);
    }

    #[test]
    fn zero_timeout_disables_auto_sleep() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        pm.update(&mut hal, Ticks(1_000_000), &mut bus);
        assert_eq!(pm.state(), PowerState::Active);
    }

    #[test]
    fn wake_lock_defers_sleep() {
        let (mut pm, mut hal, mut bus) = fixture(1000);
        pm.acquire_wake_lock("sync");
        pm.update(&mut hal, Ticks(5000), &mut bus);
        assert_eq!(pm.state(), PowerState::Active);

        assert!(pm.release_wake_lock("sync"));
        assert!(!pm.release_wake_lock("sync"));
        pm.update(&mut hal, Ticks(5001), &mut bus);
        assert_eq!(pm.state(), PowerState::LightSleep);
    }

    #[test]
    fn activity_resets_the_idle_timer() {
        let (mut pm, mut hal, mut bus) = fixture(1000);
        pm.update(&mut hal, Ticks(600), &mut bus);
        assert_eq!(pm.state(), PowerState::Idle);

        pm.note_activity(Ticks(700));
        assert_eq!(pm.state(), PowerState::Active);
        pm.update(&mut hal, Ticks(1500), &mut bus);
        assert_eq!(pm.state(), PowerState::Idle);
        pm.update(&mut hal, Ticks(1800), &mut bus);
        assert_eq!(pm.state(), PowerState::LightSleep);
    }

    #[test]
    fn button_press_wakes_and_reports_cause() {
        let (mut pm, mut hal, mut bus) = fixture(1000);
        pm.update(&mut hal, Ticks(1100), &mut bus);
        assert_eq!(pm.state(), PowerState::LightSleep);

        hal.button_latch().record_press(Ticks(1200));
        pm.update(&mut hal, Ticks(1205), &mut bus);
        assert_eq!(pm.state(), PowerState::Active);
        assert_eq!(pm.wake_cause(), WakeCause::PowerButton);
        assert_eq!(pm.idle_ms(Ticks(1205)), 0);
    }

    #[test]
    fn short_press_classification() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        hal.button_latch().record_press(Ticks(100));
        hal.button_latch().record_release(Ticks(250));
        pm.update(&mut hal, Ticks(260), &mut bus);
        assert_eq!(pm.stats().button_events, 1);
    }

    #[test]
    fn bounce_is_discarded() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        hal.button_latch().record_press(Ticks(100));
        hal.button_latch().record_release(Ticks(120));
        pm.update(&mut hal, Ticks(130), &mut bus);
        assert_eq!(pm.stats().button_events, 0);
        assert_eq!(pm.stats().bounces, 1);
    }

    #[test]
    fn long_press_classification() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        {
            let events = std::rc::Rc::clone(&events);
            bus.subscribe(
                EventType::SYS_BUTTON,
                Box::new(move |e| {
                    events.borrow_mut().push(e.payload[0]);
                    Ok(())
                }),
            );
        }
        hal.button_latch().record_press(Ticks(100));
        hal.button_latch().record_release(Ticks(2300));
        pm.update(&mut hal, Ticks(2310), &mut bus);
        assert_eq!(*events.borrow(), vec![ButtonEvent::LongPress.as_byte()]);
    }

    #[test]
    fn quick_second_press_is_a_double() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        hal.button_latch().record_press(Ticks(100));
        hal.button_latch().record_release(Ticks(200));
        pm.update(&mut hal, Ticks(210), &mut bus);

        // Second press 150 ms after the first release.
        hal.button_latch().record_press(Ticks(350));
        hal.button_latch().record_release(Ticks(450));
        pm.update(&mut hal, Ticks(460), &mut bus);

        assert_eq!(pm.stats().button_events, 2);
        // Third press well outside the gap is short again.
        hal.button_latch().record_press(Ticks(2000));
        hal.button_latch().record_release(Ticks(2100));
        pm.update(&mut hal, Ticks(2110), &mut bus);
        assert_eq!(pm.stats().button_events, 3);
    }

    #[test]
    fn deep_sleep_gates_radios_and_arms_sources() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        hal.set_wifi(true).unwrap();
        hal.set_bluetooth(true).unwrap();

        pm.request_deep_sleep(
            &mut hal,
            WakeSources::TIMER | WakeSources::POWER_BUTTON,
            Ticks(100),
            &mut bus,
        )
        .unwrap();

        assert_eq!(pm.state(), PowerState::DeepSleep);
        assert!(!hal.wifi_enabled());
        assert!(!hal.bluetooth_enabled());
        assert!(hal.armed_sources().contains(WakeSources::TIMER));
    }

    #[test]
    fn shutdown_disables_outputs() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        hal.set_output(OutputChannel::Ch1, true).unwrap();

        pm.request_shutdown(&mut hal, Ticks(100), &mut bus).unwrap();
        assert_eq!(pm.state(), PowerState::Shutdown);
        assert!(!hal.output_enabled(OutputChannel::Ch1));

        // Shutdown is terminal for the governor.
        pm.update(&mut hal, Ticks(10_000), &mut bus);
        assert_eq!(pm.state(), PowerState::Shutdown);
    }

    #[test]
    fn fault_event_fires_once_per_edge() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        let faults = std::rc::Rc::new(std::cell::Cell::new(0));
        {
            let faults = std::rc::Rc::clone(&faults);
            bus.subscribe(
                EventType::HAL_OUTPUT_FAULT,
                Box::new(move |_| {
                    faults.set(faults.get() + 1);
                    Ok(())
                }),
            );
        }
        hal.inject_fault(OutputChannel::Ch1, true);
        pm.update(&mut hal, Ticks(10), &mut bus);
        pm.update(&mut hal, Ticks(20), &mut bus);
        assert_eq!(faults.get(), 1);
        assert!(pm.has_5v_output_fault(&hal));

        hal.inject_fault(OutputChannel::Ch1, false);
        pm.update(&mut hal, Ticks(30), &mut bus);
        hal.inject_fault(OutputChannel::Ch1, true);
        pm.update(&mut hal, Ticks(40), &mut bus);
        assert_eq!(faults.get(), 2);
    }

    #[test]
    fn low_battery_fires_once_per_crossing() {
        let (mut pm, mut hal, mut bus) = fixture(0);
        hal.set_battery(10, 3500, slate_hal::power::ChargeState::Discharging);
        pm.update(&mut hal, Ticks(10), &mut bus);
        pm.update(&mut hal, Ticks(20), &mut bus);
        // Edge-triggered: only the crossing emits.
        let stats_before = bus.stats().published_sync;
        hal.set_battery(80, 4100, slate_hal::power::ChargeState::Charging);
        pm.update(&mut hal, Ticks(30), &mut bus);
        hal.set_battery(12, 3400, slate_hal::power::ChargeState::Discharging);
        pm.update(&mut hal, Ticks(40), &mut bus);
        assert!(bus.stats().published_sync > stats_before);
    }
}
