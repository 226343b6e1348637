#![forbid(unsafe_code)]

//! The uniform peripheral-module contract.

use slate_core::error::SysResult;
use slate_core::time::Ticks;

/// Lifecycle contract every HAL module implements.
///
/// Modules are polled from the main tick; they never spawn work of their
/// own except where the platform hands them an ISR or a dedicated RX
/// thread, and those communicate only through single-slot atomics or a
/// [`BusSender`](slate_core::bus::BusSender).
pub trait HalModule {
    /// Short module name for diagnostics ("touch", "power", "storage").
    fn name(&self) -> &'static str;

    /// Bring the peripheral up. [`SysError::Hardware`] on probe failure.
    ///
    /// [`SysError::Hardware`]: slate_core::error::SysError::Hardware
    fn initialize(&mut self) -> SysResult<()>;

    /// Release the peripheral. Idempotent.
    fn shutdown(&mut self) -> SysResult<()>;

    /// Poll the peripheral. Called once per tick with the current time.
    fn update(&mut self, now: Ticks) -> SysResult<()>;

    /// Quick health probe. `false` degrades the owning subsystem.
    fn self_test(&mut self) -> bool;
}
