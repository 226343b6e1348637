#![forbid(unsafe_code)]

//! Single-touch gesture recognition.
//!
//! A gesture begins on the first press with no contact active and ends on
//! its release. Classification looks at (duration, total displacement):
//!
//! | Condition | Gesture |
//! |---|---|
//! | duration < tap window, displacement < tap radius | Tap (promoted to DoubleTap if a tap landed nearby within the double-tap window) |
//! | duration > long-press floor, displacement < tap radius | LongPress |
//! | displacement ≥ swipe threshold | Swipe in the dominant axis |
//!
//! Multi-touch gestures (pinch, rotate) exist in the taxonomy but this
//! recognizer is single-touch: while a contact is tracked, presses from
//! other tracking ids are ignored.

use slate_core::geometry::Point;
use slate_core::time::Ticks;

/// Recognized gesture tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Short press-and-release in place.
    Tap,
    /// Second tap near the first, inside the double-tap window.
    DoubleTap,
    /// Held press in place.
    LongPress,
    /// Swipe toward the top of the panel.
    SwipeUp,
    /// Swipe toward the bottom.
    SwipeDown,
    /// Swipe toward the left edge.
    SwipeLeft,
    /// Swipe toward the right edge.
    SwipeRight,
    /// Two contacts closing in (reserved; not emitted by this recognizer).
    PinchIn,
    /// Two contacts spreading out (reserved; not emitted).
    PinchOut,
    /// Two contacts rotating (reserved; not emitted).
    Rotate,
}

impl Gesture {
    /// Stable payload byte for `UI_GESTURE` events.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Tap => 0,
            Self::DoubleTap => 1,
            Self::LongPress => 2,
            Self::SwipeUp => 3,
            Self::SwipeDown => 4,
            Self::SwipeLeft => 5,
            Self::SwipeRight => 6,
            Self::PinchIn => 7,
            Self::PinchOut => 8,
            Self::Rotate => 9,
        }
    }

    /// Reverse of [`as_byte`](Self::as_byte).
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Tap),
            1 => Some(Self::DoubleTap),
            2 => Some(Self::LongPress),
            3 => Some(Self::SwipeUp),
            4 => Some(Self::SwipeDown),
            5 => Some(Self::SwipeLeft),
            6 => Some(Self::SwipeRight),
            7 => Some(Self::PinchIn),
            8 => Some(Self::PinchOut),
            9 => Some(Self::Rotate),
            _ => None,
        }
    }
}

/// Recognition thresholds.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Maximum tap duration (ms). Default: 200.
    pub tap_max_ms: u32,

    /// Minimum long-press duration (ms). Default: 1000.
    pub long_press_min_ms: u32,

    /// Maximum in-place displacement for tap/long-press (px). Default: 10.
    pub tap_radius_px: i32,

    /// Minimum total displacement for a swipe (px). Default: 50.
    pub swipe_threshold_px: i32,

    /// Window after a tap in which a nearby tap promotes to double-tap
    /// (ms). Default: 400.
    pub double_tap_window_ms: u32,

    /// Maximum distance between the two taps of a double-tap (px).
    /// Default: 30.
    pub double_tap_radius_px: i32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_max_ms: 200,
            long_press_min_ms: 1000,
            tap_radius_px: 10,
            swipe_threshold_px: 50,
            double_tap_window_ms: 400,
            double_tap_radius_px: 30,
        }
    }
}

/// State for the contact currently being tracked.
#[derive(Debug, Clone, Copy)]
struct ActiveContact {
    tracking_id: u8,
    start: Point,
    start_time: Ticks,
    last: Point,
}

/// Stateful single-touch gesture recognizer.
#[derive(Debug)]
pub struct GestureRecognizer {
    config: GestureConfig,
    active: Option<ActiveContact>,
    last_tap: Option<(Point, Ticks)>,
}

impl GestureRecognizer {
    /// Create a recognizer with the given thresholds.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: None,
            last_tap: None,
        }
    }

    /// Begin tracking on a press. Ignored while another contact is active.
    pub fn on_press(&mut self, tracking_id: u8, at: Point, now: Ticks) {
        if self.active.is_none() {
            self.active = Some(ActiveContact {
                tracking_id,
                start: at,
                start_time: now,
                last: at,
            });
        }
    }

    /// Track movement of the active contact.
    pub fn on_move(&mut self, tracking_id: u8, at: Point) {
        if let Some(active) = &mut self.active
            && active.tracking_id == tracking_id
        {
            active.last = at;
        }
    }

    /// End tracking and classify. Returns the recognized gesture, if any.
    pub fn on_release(&mut self, tracking_id: u8, at: Point, now: Ticks) -> Option<Gesture> {
        let active = self.active?;
        if active.tracking_id != tracking_id {
            return None;
        }
        self.active = None;

        let duration = now.since(active.start_time);
        let (dx, dy) = active.start.delta(at);
        let displacement_sq = active.start.distance_sq(at);
        let tap_radius_sq = i64::from(self.config.tap_radius_px).pow(2);
        let in_place = displacement_sq < tap_radius_sq;

        if i64::from(dx).pow(2) + i64::from(dy).pow(2)
            >= i64::from(self.config.swipe_threshold_px).pow(2)
        {
            return Some(if dx.abs() >= dy.abs() {
                if dx > 0 { Gesture::SwipeRight } else { Gesture::SwipeLeft }
            } else if dy > 0 {
                Gesture::SwipeDown
            } else {
                Gesture::SwipeUp
            });
        }

        if in_place && duration < self.config.tap_max_ms {
            return Some(self.classify_tap(at, now));
        }

        if in_place && duration > self.config.long_press_min_ms {
            return Some(Gesture::LongPress);
        }

        None
    }

    /// Drop any active contact, e.g. on sleep entry.
    pub fn reset(&mut self) {
        self.active = None;
        self.last_tap = None;
    }

    fn classify_tap(&mut self, at: Point, now: Ticks) -> Gesture {
        let promoted = self.last_tap.is_some_and(|(prev_at, prev_time)| {
            now.since(prev_time) <= self.config.double_tap_window_ms
                && prev_at.distance_sq(at) <= i64::from(self.config.double_tap_radius_px).pow(2)
        });
        if promoted {
            self.last_tap = None;
            Gesture::DoubleTap
        } else {
            self.last_tap = Some((at, now));
            Gesture::Tap
        }
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
