#![forbid(unsafe_code)]

//! Raw touch frames lifted to semantic press/move/release events.
//!
//! Each update compares the controller's current contact set against the
//! previous one by tracking id:
//!
//! - new id → Press
//! - matched id whose raw delta reaches the movement threshold → Move
//! - vanished id → Release
//!
//! Matched coordinates pass through an n=2 moving-average filter (midpoint
//! of stored and current position) before being emitted, and every emitted
//! position is clipped to the panel. The threshold comparison uses the raw
//! delta so smoothing cannot swallow a legitimate move.
//!
//! Releases feed the [`GestureRecognizer`]; a recognized gesture is
//! appended after its Release event.

use slate_core::event::{EventEnvelope, EventType};
use slate_core::geometry::{DISPLAY, DisplayExtent, Point};
use slate_core::time::Ticks;
use slate_hal::touch::TouchPoint;
use tracing::trace;

use crate::gesture::{Gesture, GestureConfig, GestureRecognizer};

/// Semantic touch event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEventKind {
    /// A new contact appeared.
    Press,
    /// A contact vanished.
    Release,
    /// A contact moved past the movement threshold.
    Move,
    /// A gesture was recognized on release.
    Gesture(Gesture),
}

/// A semantic touch event as published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    /// What happened.
    pub kind: TouchEventKind,
    /// The contact's tracking id.
    pub tracking_id: u8,
    /// Filtered, clipped position.
    pub position: Point,
    /// Contact pressure from the raw sample (0 on release).
    pub pressure: u16,
    /// Event time.
    pub timestamp: Ticks,
}

/// Encoded payload length of a [`TouchEvent`].
pub const TOUCH_EVENT_WIRE_LEN: usize = 15;

/// Payload byte meaning "no gesture".
const NO_GESTURE: u8 = 0xFF;

impl TouchEvent {
    /// The bus tag this event publishes under.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self.kind {
            TouchEventKind::Press => EventType::UI_TOUCH_PRESS,
            TouchEventKind::Release => EventType::UI_TOUCH_RELEASE,
            TouchEventKind::Move => EventType::UI_TOUCH_MOVE,
            TouchEventKind::Gesture(_) => EventType::UI_GESTURE,
        }
    }

    /// Fixed-layout little-endian payload:
    /// `[kind, gesture, tracking_id, x:i32, y:i32, timestamp:u32]`.
    #[must_use]
    pub fn encode(&self) -> [u8; TOUCH_EVENT_WIRE_LEN] {
        let (kind, gesture) = match self.kind {
            TouchEventKind::Press => (0, NO_GESTURE),
            TouchEventKind::Release => (1, NO_GESTURE),
            TouchEventKind::Move => (2, NO_GESTURE),
            TouchEventKind::Gesture(g) => (3, g.as_byte()),
        };
        let mut out = [0u8; TOUCH_EVENT_WIRE_LEN];
        out[0] = kind;
        out[1] = gesture;
        out[2] = self.tracking_id;
        out[3..7].copy_from_slice(&self.position.x.to_le_bytes());
        out[7..11].copy_from_slice(&self.position.y.to_le_bytes());
        out[11..15].copy_from_slice(&self.timestamp.as_millis().to_le_bytes());
        out
    }

    /// Decode a payload produced by [`encode`](Self::encode).
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != TOUCH_EVENT_WIRE_LEN {
            return None;
        }
        let kind = match (payload[0], payload[1]) {
            (0, _) => TouchEventKind::Press,
            (1, _) => TouchEventKind::Release,
            (2, _) => TouchEventKind::Move,
            (3, g) => TouchEventKind::Gesture(Gesture::from_byte(g)?),
            _ => return None,
        };
        Some(Self {
            kind,
            tracking_id: payload[2],
            position: Point::new(
                i32::from_le_bytes(payload[3..7].try_into().ok()?),
                i32::from_le_bytes(payload[7..11].try_into().ok()?),
            ),
            pressure: 0,
            timestamp: Ticks(u32::from_le_bytes(payload[11..15].try_into().ok()?)),
        })
    }

    /// Wrap in a bus envelope.
    #[must_use]
    pub fn to_envelope(&self, sender: &str) -> EventEnvelope {
        EventEnvelope::new(self.event_type(), self.timestamp, sender)
            .with_payload(self.encode().to_vec())
    }
}

/// Per-kind emission counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Press events emitted.
    pub presses: u64,
    /// Move events emitted.
    pub moves: u64,
    /// Release events emitted.
    pub releases: u64,
    /// Gestures recognized.
    pub gestures: u64,
}

/// A tracked contact between frames.
#[derive(Debug, Clone, Copy)]
struct TrackedContact {
    tracking_id: u8,
    position: Point,
    seen: bool,
}

/// The raw-to-semantic touch pipeline.
pub struct TouchPipeline {
    extent: DisplayExtent,
    move_threshold_px: i32,
    tracked: Vec<TrackedContact>,
    recognizer: GestureRecognizer,
    events: Vec<TouchEvent>,
    stats: PipelineStats,
}

impl TouchPipeline {
    /// Pipeline over the standard panel with the given thresholds.
    #[must_use]
    pub fn new(move_threshold_px: i32, gestures: GestureConfig) -> Self {
        Self {
            extent: DISPLAY,
            move_threshold_px: move_threshold_px.max(1),
            tracked: Vec::new(),
            recognizer: GestureRecognizer::new(gestures),
            events: Vec::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Override the panel extent (tests, alternate panels).
    pub fn set_extent(&mut self, extent: DisplayExtent) {
        self.extent = extent;
    }

    /// Process one controller frame. Returns the semantic events emitted,
    /// in order: presses and moves as encountered, then releases, each
    /// release followed by any gesture it completed.
    pub fn update(&mut self, frame: &[TouchPoint], now: Ticks) -> &[TouchEvent] {
        self.events.clear();
        for contact in &mut self.tracked {
            contact.seen = false;
        }

        for raw in frame.iter().filter(|p| p.valid) {
            match self
                .tracked
                .iter_mut()
                .position(|c| c.tracking_id == raw.tracking_id)
            {
                Some(idx) => {
                    self.tracked[idx].seen = true;
                    let stored = self.tracked[idx].position;
                    let (dx, dy) = stored.delta(Point::new(raw.x, raw.y));
                    if dx.abs() >= self.move_threshold_px || dy.abs() >= self.move_threshold_px {
                        // n=2 moving average, then clip.
                        let filtered = self.extent.clamp(Point::new(
                            (stored.x + raw.x) / 2,
                            (stored.y + raw.y) / 2,
                        ));
                        self.tracked[idx].position = filtered;
                        self.recognizer.on_move(raw.tracking_id, filtered);
                        self.push(TouchEvent {
                            kind: TouchEventKind::Move,
                            tracking_id: raw.tracking_id,
                            position: filtered,
                            pressure: raw.pressure,
                            timestamp: raw.timestamp,
                        });
                    }
                }
                None => {
                    let position = self.extent.clamp(raw.position());
                    self.tracked.push(TrackedContact {
                        tracking_id: raw.tracking_id,
                        position,
                        seen: true,
                    });
                    self.recognizer.on_press(raw.tracking_id, position, raw.timestamp);
                    self.push(TouchEvent {
                        kind: TouchEventKind::Press,
                        tracking_id: raw.tracking_id,
                        position,
                        pressure: raw.pressure,
                        timestamp: raw.timestamp,
                    });
                }
            }
        }

        // Vanished contacts release at their last known position.
        let mut idx = 0;
        while idx < self.tracked.len() {
            if self.tracked[idx].seen {
                idx += 1;
                continue;
            }
            let contact = self.tracked.remove(idx);
            self.push(TouchEvent {
                kind: TouchEventKind::Release,
                tracking_id: contact.tracking_id,
                position: contact.position,
                pressure: 0,
                timestamp: now,
            });
            if let Some(gesture) =
                self.recognizer
                    .on_release(contact.tracking_id, contact.position, now)
            {
                self.push(TouchEvent {
                    kind: TouchEventKind::Gesture(gesture),
                    tracking_id: contact.tracking_id,
                    position: contact.position,
                    pressure: 0,
                    timestamp: now,
                });
            }
        }

        trace!(events = self.events.len(), "touch frame processed");
        &self.events
    }

    /// Drop all tracked contacts, e.g. on sleep entry.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.events.clear();
        self.recognizer.reset();
    }

    /// Whether any contact is currently down.
    #[must_use]
    pub fn has_contact(&self) -> bool {
        !self.tracked.is_empty()
    }

    /// Cumulative emission counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    fn push(&mut self, event: TouchEvent) {
        match event.kind {
            TouchEventKind::Press => self.stats.presses += 1,
            TouchEventKind::Move => self.stats.moves += 1,
            TouchEventKind::Release => self.stats.releases += 1,
            TouchEventKind::Gesture(_) => self.stats.gestures += 1,
        }
        self.events.push(event);
    }
}

impl std::fmt::Debug for TouchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TouchPipeline")
            .field("tracked", &self.tracked.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
