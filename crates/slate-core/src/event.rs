#![forbid(unsafe_code)]

//! Canonical event types and the envelope they travel in.
//!
//! Event tags form an open 32-bit namespace with reserved windows:
//!
//! | Range | Owner |
//! |---|---|
//! | 1000–1999 | system |
//! | 2000–2999 | UI / input |
//! | 3000–3999 | app lifecycle |
//! | 4000–4999 | HAL |
//! | 5000–5999 | services |
//! | ≥ 10000 | user-defined |
//!
//! The bus is agnostic to tag values; the windows exist so applications
//! never collide with the core.

use crate::time::Ticks;

/// An opaque 32-bit event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventType(pub u32);

impl EventType {
    // --- System (1000–1999) ------------------------------------------------

    /// Boot pipeline finished; payload empty.
    pub const SYS_BOOT_COMPLETE: Self = Self(1000);
    /// Orderly shutdown requested.
    pub const SYS_SHUTDOWN: Self = Self(1001);
    /// Entering a sleep state; payload = sleep state discriminant byte.
    pub const SYS_SLEEP_ENTER: Self = Self(1002);
    /// Woke from sleep; payload = wake cause discriminant byte.
    pub const SYS_WAKE: Self = Self(1003);
    /// Power button classified; payload = button event discriminant byte.
    pub const SYS_BUTTON: Self = Self(1004);
    /// Battery below the warning threshold; payload = percent byte.
    pub const SYS_LOW_BATTERY: Self = Self(1005);

    // --- UI / input (2000–2999) --------------------------------------------

    /// Touch press; payload = encoded touch event.
    pub const UI_TOUCH_PRESS: Self = Self(2000);
    /// Touch release; payload = encoded touch event.
    pub const UI_TOUCH_RELEASE: Self = Self(2001);
    /// Touch move; payload = encoded touch event.
    pub const UI_TOUCH_MOVE: Self = Self(2002);
    /// Recognized gesture; payload = encoded touch event + gesture tag.
    pub const UI_GESTURE: Self = Self(2003);
    /// Current screen changed; payload = screen name bytes.
    pub const UI_SCREEN_CHANGED: Self = Self(2010);

    // --- App lifecycle (3000–3999) -----------------------------------------

    /// App launched; payload = app id bytes.
    pub const APP_LAUNCHED: Self = Self(3000);
    /// App suspended (paused); payload = app id bytes.
    pub const APP_SUSPENDED: Self = Self(3001);
    /// App resumed; payload = app id bytes.
    pub const APP_RESUMED: Self = Self(3002);
    /// App exited; payload = app id bytes.
    pub const APP_EXITED: Self = Self(3003);
    /// App entered the error state; payload = app id bytes.
    pub const APP_FAULTED: Self = Self(3004);

    // --- HAL (4000–4999) ---------------------------------------------------

    /// Periodic battery sample; payload = [percent, charging] bytes.
    pub const HAL_BATTERY_SAMPLE: Self = Self(4000);
    /// Switched-output fault line asserted; payload = channel byte.
    pub const HAL_OUTPUT_FAULT: Self = Self(4001);
    /// Bytes arrived on the UART; payload = raw bytes.
    pub const HAL_UART_RX: Self = Self(4002);

    // --- Services (5000–5999) ----------------------------------------------

    /// Network connectivity changed; payload = [up] byte.
    pub const SVC_NETWORK_STATE: Self = Self(5000);

    /// First tag available to applications.
    pub const USER_BASE: Self = Self(10_000);

    /// Whether this tag falls inside any core-reserved window.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 >= 1000 && self.0 < 6000
    }
}

/// A published event: tag, payload bytes, capture time, and sender.
///
/// Synchronous delivery hands listeners a `&EventEnvelope` valid for the
/// duration of the call; asynchronous publication clones the envelope
/// (payload included) into the bounded queue, so the publisher's buffer
/// is never referenced after `publish_async` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    /// The event tag.
    pub event_type: EventType,
    /// Opaque payload bytes. Empty for pure notifications.
    pub payload: Vec<u8>,
    /// Monotonic capture time.
    pub timestamp: Ticks,
    /// Short sender tag for diagnostics ("power", "input", app id, ...).
    pub sender: String,
}

impl EventEnvelope {
    /// Create an empty-payload envelope.
    #[must_use]
    pub fn new(event_type: EventType, timestamp: Ticks, sender: impl Into<String>) -> Self {
        Self {
            event_type,
            payload: Vec::new(),
            timestamp,
            sender: sender.into(),
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Payload interpreted as UTF-8, if it is.
    #[must_use]
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
