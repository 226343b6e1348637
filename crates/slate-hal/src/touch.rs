#![forbid(unsafe_code)]

//! Touch controller interface.

use slate_core::geometry::Point;
use slate_core::time::Ticks;

use crate::module::HalModule;

/// Maximum simultaneous touch points the controller reports.
pub const MAX_TOUCH_POINTS: usize = 5;

/// One raw sample from the touch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    /// Horizontal position in display pixels.
    pub x: i32,
    /// Vertical position in display pixels.
    pub y: i32,
    /// Contact pressure, controller units (0 = unknown).
    pub pressure: u16,
    /// Controller-assigned id, stable for the lifetime of one contact.
    pub tracking_id: u8,
    /// Whether the controller considers this slot a live contact.
    pub valid: bool,
    /// Sample time.
    pub timestamp: Ticks,
}

impl TouchPoint {
    /// A valid contact at the given position.
    #[must_use]
    pub const fn new(tracking_id: u8, x: i32, y: i32, timestamp: Ticks) -> Self {
        Self {
            x,
            y,
            pressure: 0,
            tracking_id,
            valid: true,
            timestamp,
        }
    }

    /// Position as a [`Point`].
    #[must_use]
    pub const fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Touch controller contract.
pub trait TouchHal: HalModule {
    /// Currently valid contacts, at most [`MAX_TOUCH_POINTS`].
    fn touches(&self) -> &[TouchPoint];

    /// Controller sensitivity level (0–255, controller-defined scale).
    fn sensitivity(&self) -> u8;

    /// Set the sensitivity level.
    fn set_sensitivity(&mut self, level: u8) -> slate_core::error::SysResult<()>;
}
