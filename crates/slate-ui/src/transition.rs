#![forbid(unsafe_code)]

//! Screen transition kinds and time-based progress.
//!
//! The core does not composite; it only guarantees that the target screen
//! is visible and input-eligible once the animation duration elapses.
//! [`TransitionProgress`] gives the view layer a normalized eased value
//! to drive whatever animation it wants in the meantime.

use slate_core::time::Ticks;

/// Conceptual screen transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    /// Instant cut.
    #[default]
    None,
    /// New screen slides in from the right.
    SlideLeft,
    /// New screen slides in from the left.
    SlideRight,
    /// New screen slides in from the bottom.
    SlideUp,
    /// New screen slides in from the top.
    SlideDown,
    /// Cross-fade.
    Fade,
    /// New screen scales up from the center.
    ZoomIn,
    /// New screen scales down onto the panel.
    ZoomOut,
}

/// Quadratic ease-in-out, the one easing the core ships.
#[inline]
#[must_use]
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// An in-flight transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionProgress {
    transition: Transition,
    started: Ticks,
    duration_ms: u32,
}

impl TransitionProgress {
    /// Begin a transition at `now`.
    #[must_use]
    pub fn new(transition: Transition, duration_ms: u32, now: Ticks) -> Self {
        Self {
            transition,
            started: now,
            duration_ms,
        }
    }

    /// The transition kind.
    #[must_use]
    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Eased progress in [0, 1]. `Transition::None` and zero durations
    /// complete immediately.
    #[must_use]
    pub fn value(&self, now: Ticks) -> f32 {
        if self.duration_ms == 0 || matches!(self.transition, Transition::None) {
            return 1.0;
        }
        let elapsed = now.since(self.started).min(self.duration_ms);
        ease_in_out(elapsed as f32 / self.duration_ms as f32)
    }

    /// Whether the animation window has elapsed.
    #[must_use]
    pub fn is_complete(&self, now: Ticks) -> bool {
        matches!(self.transition, Transition::None)
            || now.since(self.started) >= self.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_completes_immediately() {
        let t = TransitionProgress::new(Transition::None, 250, Ticks(0));
        assert!(t.is_complete(Ticks(0)));
        assert_eq!(t.value(Ticks(0)), 1.0);
    }

    #[test]
    fn eased_progress_reaches_one() {
        let t = TransitionProgress::new(Transition::Fade, 200, Ticks(100));
        assert!(!t.is_complete(Ticks(150)));
        assert!(t.value(Ticks(150)) > 0.0);
        assert!(t.value(Ticks(150)) < 1.0);
        assert!(t.is_complete(Ticks(300)));
        assert_eq!(t.value(Ticks(300)), 1.0);
    }

    #[test]
    fn easing_is_symmetric_around_midpoint() {
        let early = ease_in_out(0.25);
        let late = ease_in_out(0.75);
        assert!((early + late - 1.0).abs() < 1e-6);
    }
}
