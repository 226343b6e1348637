//! Property-based invariants for the touch pipeline.
//!
//! 1. Every emitted position lies inside the panel, whatever the
//!    controller reports.
//! 2. Between a press and its release, move timestamps are strictly
//!    monotonic.
//! 3. A press for a tracking id is always balanced by a release once
//!    the contact vanishes.

use proptest::prelude::*;
use slate_core::geometry::DISPLAY;
use slate_core::time::Ticks;
use slate_hal::touch::TouchPoint;
use slate_input::gesture::GestureConfig;
use slate_input::pipeline::{TouchEvent, TouchEventKind, TouchPipeline};

fn drag_path(max_len: usize) -> impl Strategy<Value = Vec<(i32, i32)>> {
    proptest::collection::vec((-200i32..1500, -200i32..900), 1..=max_len)
}

fn run_drag(path: &[(i32, i32)]) -> Vec<TouchEvent> {
    let mut pipe = TouchPipeline::new(5, GestureConfig::default());
    let mut all = Vec::new();
    let mut t = 0u32;
    for (x, y) in path {
        t += 16;
        all.extend_from_slice(pipe.update(
            &[TouchPoint::new(0, *x, *y, Ticks(t))],
            Ticks(t),
        ));
    }
    t += 16;
    all.extend_from_slice(pipe.update(&[], Ticks(t)));
    all
}

proptest! {
    #[test]
    fn emitted_positions_stay_on_the_panel(path in drag_path(24)) {
        for event in run_drag(&path) {
            prop_assert!(
                DISPLAY.contains(event.position),
                "event {:?} left the panel",
                event
            );
        }
    }

    #[test]
    fn move_timestamps_are_strictly_monotonic(path in drag_path(24)) {
        let events = run_drag(&path);
        let moves: Vec<_> = events
            .iter()
            .filter(|e| e.kind == TouchEventKind::Move)
            .collect();
        for pair in moves.windows(2) {
            prop_assert!(pair[1].timestamp.since(pair[0].timestamp) > 0);
        }
    }

    #[test]
    fn press_is_balanced_by_release(path in drag_path(24)) {
        let events = run_drag(&path);
        let presses = events.iter().filter(|e| e.kind == TouchEventKind::Press).count();
        let releases = events.iter().filter(|e| e.kind == TouchEventKind::Release).count();
        prop_assert_eq!(presses, 1);
        prop_assert_eq!(releases, 1);
    }
}
