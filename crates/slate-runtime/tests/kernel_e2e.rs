//! Whole-core smoke test: boot, screens, apps, touch, tasks, events.
//!
//! A scripted tap flows HAL → pipeline → bus → subscriber while an app
//! runs under the manager, a periodic task runs under the scheduler, and
//! the home screen stays current. Everything is driven by a manually
//! advanced clock and simulated peripherals.

use slate_apps::app::{AppDescriptor, AppPriority, SlateApp};
use slate_core::config::OsConfig;
use slate_core::error::SysResult;
use slate_core::event::EventType;
use slate_core::time::{SimClock, Ticks};
use slate_hal::sim::{SimPower, SimStorage, SimTouch};
use slate_hal::touch::TouchPoint;
use slate_input::gesture::Gesture;
use slate_input::pipeline::TouchEvent;
use slate_runtime::kernel::Kernel;
use slate_ui::transition::Transition;
use slate_ui::tree::UiRoot;
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

struct ClockApp {
    desc: AppDescriptor,
    updates: Rc<RefCell<u32>>,
}

impl SlateApp for ClockApp {
    fn descriptor(&self) -> &AppDescriptor {
        &self.desc
    }

    fn initialize(&mut self) -> SysResult<()> {
        Ok(())
    }

    fn update(&mut self, _delta_ms: u32) -> SysResult<()> {
        *self.updates.borrow_mut() += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> SysResult<()> {
        Ok(())
    }

    fn create_ui(&mut self, parent: &mut UiRoot) -> SysResult<()> {
        parent.attach("clock-face");
        Ok(())
    }

    fn destroy_ui(&mut self) -> SysResult<()> {
        Ok(())
    }
}

#[test]
fn tap_task_app_and_screen_flow_through_one_kernel() {
    init_tracing();
    let clock = Rc::new(SimClock::new());
    let mut touch = SimTouch::new();
    // Tick 1: finger down. Tick 2: finger up 100 ms later → tap.
    touch.push_frame(vec![TouchPoint::new(0, 200, 300, Ticks(16))]);
    touch.push_frame(vec![]);

    let mut kernel = Kernel::new(
        OsConfig::default(),
        Rc::clone(&clock),
        Box::new(touch),
        Box::new(SimPower::new()),
        Some(Box::new(SimStorage::new())),
    )
    .unwrap();
    kernel.boot().unwrap();

    // Observers for the input events the tap should produce.
    let gestures = Rc::new(RefCell::new(Vec::new()));
    let presses = Rc::new(RefCell::new(0u32));
    {
        let gestures = Rc::clone(&gestures);
        kernel.bus_mut().subscribe(
            EventType::UI_GESTURE,
            Box::new(move |e| {
                if let Some(event) = TouchEvent::decode(&e.payload)
                    && let slate_input::pipeline::TouchEventKind::Gesture(g) = event.kind
                {
                    gestures.borrow_mut().push(g);
                }
                Ok(())
            }),
        );
        let presses = Rc::clone(&presses);
        kernel.bus_mut().subscribe(
            EventType::UI_TOUCH_PRESS,
            Box::new(move |_| {
                *presses.borrow_mut() += 1;
                Ok(())
            }),
        );
    }

    // Home screen.
    kernel
        .screens_mut()
        .register_screen("home", Box::new(|| Ok(UiRoot::new("home"))), None, true)
        .unwrap();
    kernel
        .screens_mut()
        .switch_to_screen("home", Transition::None, 0, Ticks(0))
        .unwrap();

    // Clock app.
    let updates = Rc::new(RefCell::new(0u32));
    {
        let updates = Rc::clone(&updates);
        let now = kernel.now();
        let (apps, bus) = kernel.apps_mut();
        apps.register_app(
            "clock",
            Box::new(move || {
                Box::new(ClockApp {
                    desc: AppDescriptor::new("clock", "Clock", "1.0.0")
                        .with_priority(AppPriority::Normal),
                    updates: Rc::clone(&updates),
                })
            }),
        )
        .unwrap();
        apps.launch_app("clock", now, bus).unwrap();
        apps.switch_to_app("clock", now, bus).unwrap();
    }

    // Periodic heartbeat task.
    let beats = Rc::new(RefCell::new(0u32));
    {
        let beats = Rc::clone(&beats);
        let now = kernel.now();
        kernel
            .scheduler_mut()
            .schedule_periodic("heartbeat", 2, 16, 0, now, Box::new(move || {
                *beats.borrow_mut() += 1;
                Ok(())
            }))
            .unwrap();
    }

    // The foreground app composites its subtree under a screen root.
    {
        let (apps, _) = kernel.apps_mut();
        assert_eq!(apps.foreground_app(), Some("clock"));
        let mut root = UiRoot::new("home-overlay");
        apps.attach_ui("clock", &mut root).unwrap();
        assert_eq!(root.child_count(), 1);
    }
    assert_eq!(
        kernel.screens_mut().current_screen().map(UiRoot::name),
        Some("home")
    );

    // Drive five frames.
    for _ in 0..5 {
        clock.advance(16);
        kernel.tick().unwrap();
    }

    // Touch: one press on tick 1, release + tap on tick 2.
    assert_eq!(*presses.borrow(), 1);
    assert_eq!(*gestures.borrow(), vec![Gesture::Tap]);

    // App got per-tick updates; the heartbeat ran repeatedly.
    assert!(*updates.borrow() >= 4);
    assert!(*beats.borrow() >= 3);

    // Screen is still current and the kernel ticked cleanly.
    assert_eq!(kernel.screens_mut().current_screen_name(), Some("home"));
    assert_eq!(kernel.tick_count(), 5);

    // Orderly shutdown stops the fleet.
    kernel.shutdown();
    let (apps, _) = kernel.apps_mut();
    assert!(apps.running_apps().is_empty());
}

#[test]
fn queue_overflow_drops_and_recovers_through_ticks() {
    init_tracing();
    let clock = Rc::new(SimClock::new());
    let config = OsConfig {
        event_queue_capacity: 4,
        ..OsConfig::default()
    };
    let mut kernel = Kernel::new(
        config,
        Rc::clone(&clock),
        Box::new(SimTouch::new()),
        Box::new(SimPower::new()),
        None,
    )
    .unwrap();
    kernel.boot().unwrap();

    let sender = kernel.bus_mut().sender();
    let mut accepted = 0;
    for i in 0..10u8 {
        if sender.publish(
            slate_core::event::EventEnvelope::new(EventType::USER_BASE, Ticks(0), "worker")
                .with_payload(vec![i]),
        ) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 4);

    // One tick drains the queue (cap 10 ≥ 4); the next publish succeeds.
    clock.advance(16);
    kernel.tick().unwrap();
    assert!(sender.publish(slate_core::event::EventEnvelope::new(
        EventType::USER_BASE,
        Ticks(16),
        "worker",
    )));
}
