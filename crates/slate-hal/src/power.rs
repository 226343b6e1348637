#![forbid(unsafe_code)]

//! Power peripherals: battery, power button, switched outputs, radios.
//!
//! The power-button ISR is the only interrupt context that touches this
//! module. It writes raw press/release timestamps into [`ButtonLatch`]'s
//! single-slot atomics and does nothing else: no allocation, no locks.
//! The main loop is the single consumer; it takes the slots and runs
//! classification (see the power manager).

use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use slate_core::error::SysResult;
use slate_core::time::Ticks;

use crate::module::HalModule;

/// Battery charge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargeState {
    /// Running from the battery.
    #[default]
    Discharging,
    /// Charger attached, charging.
    Charging,
    /// Charger attached, battery full.
    Full,
    /// Fuel gauge unreadable.
    Unknown,
}

/// A battery sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    /// State of charge, 0–100.
    pub percent: u8,
    /// Pack voltage in millivolts.
    pub millivolts: u16,
    /// Charge direction.
    pub charge: ChargeState,
}

/// Switched 5 V output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    /// First switched output.
    Ch1,
    /// Second switched output.
    Ch2,
}

/// Why the system last left a sleep state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeCause {
    /// Armed timer expired.
    Timer,
    /// Power button pressed.
    PowerButton,
    /// Touch controller interrupt.
    Touch,
    /// Cause not recorded by the platform.
    #[default]
    Unknown,
}

impl WakeCause {
    /// Stable payload byte for `SYS_WAKE` events.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Timer => 0,
            Self::PowerButton => 1,
            Self::Touch => 2,
            Self::Unknown => 3,
        }
    }
}

bitflags! {
    /// Wake sources that may be armed before entering sleep.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WakeSources: u8 {
        /// Wake on an armed timer.
        const TIMER = 1;
        /// Wake on the power button.
        const POWER_BUTTON = 1 << 1;
        /// Wake on touch activity.
        const TOUCH = 1 << 2;
        /// Wake on an external interrupt line.
        const EXTERNAL = 1 << 3;
    }
}

/// Sentinel meaning "slot empty". Tick value `u32::MAX` is unreachable in
/// practice (it is one ms before wrap) and reserved here.
const LATCH_EMPTY: u32 = u32::MAX;

/// Single-producer single-consumer latch for raw button edge timestamps.
///
/// The ISR stores; the main loop swaps out. A second edge before the
/// consumer runs overwrites the first; acceptable, since classification
/// only needs the most recent edge pair.
#[derive(Debug)]
pub struct ButtonLatch {
    press_ms: AtomicU32,
    release_ms: AtomicU32,
}

impl Default for ButtonLatch {
    fn default() -> Self {
        Self {
            press_ms: AtomicU32::new(LATCH_EMPTY),
            release_ms: AtomicU32::new(LATCH_EMPTY),
        }
    }
}

impl ButtonLatch {
    /// Create an empty latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ISR side: record a press edge.
    pub fn record_press(&self, now: Ticks) {
        self.press_ms.store(now.as_millis(), Ordering::Release);
    }

    /// ISR side: record a release edge.
    pub fn record_release(&self, now: Ticks) {
        self.release_ms.store(now.as_millis(), Ordering::Release);
    }

    /// Consumer side: take the pending press edge, if any.
    pub fn take_press(&self) -> Option<Ticks> {
        let raw = self.press_ms.swap(LATCH_EMPTY, Ordering::AcqRel);
        (raw != LATCH_EMPTY).then_some(Ticks(raw))
    }

    /// Consumer side: take the pending release edge, if any.
    pub fn take_release(&self) -> Option<Ticks> {
        let raw = self.release_ms.swap(LATCH_EMPTY, Ordering::AcqRel);
        (raw != LATCH_EMPTY).then_some(Ticks(raw))
    }
}

/// Power peripheral contract.
pub trait PowerHal: HalModule {
    /// Latest battery sample.
    fn battery(&self) -> BatteryStatus;

    /// The button latch the platform's ISR writes into.
    fn button_latch(&self) -> &ButtonLatch;

    /// Drive a switched 5 V output. Implementations assert the enable
    /// line and wait ~10 ms for the rail to settle before returning.
    fn set_output(&mut self, channel: OutputChannel, enabled: bool) -> SysResult<()>;

    /// Whether a channel's enable line is asserted.
    fn output_enabled(&self, channel: OutputChannel) -> bool;

    /// Whether a channel's active-low fault input is asserted. Polled;
    /// faults do not interrupt.
    fn output_fault(&self, channel: OutputChannel) -> bool;

    /// Gate the WiFi radio.
    fn set_wifi(&mut self, enabled: bool) -> SysResult<()>;

    /// Gate the Bluetooth radio.
    fn set_bluetooth(&mut self, enabled: bool) -> SysResult<()>;

    /// WiFi radio power state.
    fn wifi_enabled(&self) -> bool;

    /// Bluetooth radio power state.
    fn bluetooth_enabled(&self) -> bool;

    /// Arm wake sources for the next sleep entry.
    fn arm_wake_sources(&mut self, sources: WakeSources) -> SysResult<()>;

    /// Why the last sleep ended.
    fn wake_cause(&self) -> WakeCause;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_is_take_once() {
        let latch = ButtonLatch::new();
        assert_eq!(latch.take_press(), None);

        latch.record_press(Ticks(120));
        assert_eq!(latch.take_press(), Some(Ticks(120)));
        assert_eq!(latch.take_press(), None);
    }

    #[test]
    fn latest_edge_wins() {
        let latch = ButtonLatch::new();
        latch.record_release(Ticks(10));
        latch.record_release(Ticks(90));
        assert_eq!(latch.take_release(), Some(Ticks(90)));
    }

    #[test]
    fn wake_cause_bytes_are_stable() {
        assert_eq!(WakeCause::Timer.as_byte(), 0);
        assert_eq!(WakeCause::PowerButton.as_byte(), 1);
        assert_eq!(WakeCause::Touch.as_byte(), 2);
        assert_eq!(WakeCause::Unknown.as_byte(), 3);
    }
}
