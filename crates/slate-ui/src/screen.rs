#![forbid(unsafe_code)]

//! Screen registry entries.

use slate_core::error::SysResult;
use slate_core::time::Ticks;

use crate::tree::UiRoot;

/// Builds a screen's UI subtree. Called lazily on first switch and again
/// after eviction. Failure aborts the switch that triggered it.
pub type CreateFn = Box<dyn FnMut() -> SysResult<UiRoot>>;

/// Tears down a screen's UI subtree before the root is dropped.
pub type DestroyFn = Box<dyn FnMut(&mut UiRoot)>;

/// A registered screen and, when materialized, its live root.
pub struct ScreenEntry {
    pub(crate) create: CreateFn,
    pub(crate) destroy: Option<DestroyFn>,
    pub(crate) persistent: bool,
    pub(crate) root: Option<UiRoot>,
    pub(crate) created_at: Ticks,
    pub(crate) last_access: Ticks,
}

impl ScreenEntry {
    pub(crate) fn new(create: CreateFn, destroy: Option<DestroyFn>, persistent: bool) -> Self {
        Self {
            create,
            destroy,
            persistent,
            root: None,
            created_at: Ticks::ZERO,
            last_access: Ticks::ZERO,
        }
    }

    /// Whether the screen currently has a live root.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.root.is_some()
    }

    /// Whether the screen is exempt from eviction.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Run the destroy callback (if any) and drop the root.
    pub(crate) fn tear_down(&mut self) {
        if let Some(mut root) = self.root.take()
            && let Some(destroy) = &mut self.destroy
        {
            destroy(&mut root);
        }
    }
}

impl std::fmt::Debug for ScreenEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenEntry")
            .field("persistent", &self.persistent)
            .field("materialized", &self.root.is_some())
            .field("created_at", &self.created_at)
            .field("last_access", &self.last_access)
            .finish_non_exhaustive()
    }
}
