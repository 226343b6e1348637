#![forbid(unsafe_code)]

//! Input: raw touch samples lifted to semantic touch and gesture events.

pub mod gesture;
pub mod pipeline;

pub use gesture::{Gesture, GestureConfig, GestureRecognizer};
pub use pipeline::{PipelineStats, TouchEvent, TouchEventKind, TouchPipeline};
