#![forbid(unsafe_code)]

//! UI: screen registry, lazy materialization, navigation, transitions.

pub mod manager;
pub mod screen;
pub mod transition;
pub mod tree;

pub use manager::{ScreenManager, ScreenManagerStats};
pub use screen::{CreateFn, DestroyFn};
pub use transition::{Transition, TransitionProgress};
pub use tree::UiRoot;
