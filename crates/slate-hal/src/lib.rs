#![forbid(unsafe_code)]

//! Hardware abstraction layer: peripheral contracts and simulated back-ends.

pub mod module;
pub mod power;
pub mod sim;
pub mod storage;
pub mod touch;

pub use module::HalModule;
pub use power::{
    BatteryStatus, ButtonLatch, ChargeState, OutputChannel, PowerHal, WakeCause, WakeSources,
};
pub use storage::{DirEntry, StorageHal};
pub use touch::{MAX_TOUCH_POINTS, TouchHal, TouchPoint};
