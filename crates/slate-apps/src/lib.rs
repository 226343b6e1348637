#![forbid(unsafe_code)]

//! Applications: the contract each app implements and the manager that
//! runs a fleet of them.

pub mod app;
pub mod manager;

pub use app::{AppDescriptor, AppFactory, AppPriority, AppState, SlateApp};
pub use manager::{AppInfo, AppManager, AppManagerStats};
