#![forbid(unsafe_code)]

//! Screen lifecycle: lazy materialization, navigation, eviction.
//!
//! # Invariants
//!
//! 1. At most one screen is current
//! 2. Persistent screens are never evicted
//! 3. Materialized non-persistent screens stay within the cap; the
//!    current screen is exempt from eviction (a previous screen may
//!    briefly exceed the cap until it stops being current)
//! 4. A failed create aborts the switch with the navigation history
//!    untouched
//! 5. `go_back` restores the popped entry when the switch back fails

use std::collections::{BTreeMap, VecDeque};

use slate_core::error::{SysError, SysResult};
use slate_core::time::Ticks;
use tracing::{debug, warn};

use crate::screen::{CreateFn, DestroyFn, ScreenEntry};
use crate::transition::{Transition, TransitionProgress};
use crate::tree::UiRoot;

/// Navigation and eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenManagerStats {
    /// Successful switches.
    pub switches: u64,
    /// Successful back navigations.
    pub back_navigations: u64,
    /// Screens evicted under the cap.
    pub evictions: u64,
    /// Create callbacks that failed.
    pub create_failures: u64,
}

/// Registry, navigation stack, and eviction policy for screens.
pub struct ScreenManager {
    screens: BTreeMap<String, ScreenEntry>,
    history: VecDeque<String>,
    history_depth: usize,
    current: Option<String>,
    max_screens: usize,
    active_transition: Option<TransitionProgress>,
    stats: ScreenManagerStats,
}

impl ScreenManager {
    /// Create a manager with the given caps.
    #[must_use]
    pub fn new(max_screens: usize, history_depth: usize) -> Self {
        Self {
            screens: BTreeMap::new(),
            history: VecDeque::new(),
            history_depth: history_depth.max(1),
            current: None,
            max_screens: max_screens.max(1),
            active_transition: None,
            stats: ScreenManagerStats::default(),
        }
    }

    // --- Registry ----------------------------------------------------------

    /// Register a screen. The create callback runs lazily on first switch.
    pub fn register_screen(
        &mut self,
        name: &str,
        create: CreateFn,
        destroy: Option<DestroyFn>,
        persistent: bool,
    ) -> SysResult<()> {
        if name.is_empty() {
            return Err(SysError::InvalidParam);
        }
        if self.screens.contains_key(name) {
            return Err(SysError::Busy);
        }
        self.screens
            .insert(name.to_owned(), ScreenEntry::new(create, destroy, persistent));
        Ok(())
    }

    /// Remove a screen, tearing down its root. The current screen cannot
    /// be unregistered.
    pub fn unregister_screen(&mut self, name: &str) -> SysResult<()> {
        if self.current.as_deref() == Some(name) {
            return Err(SysError::Busy);
        }
        let mut entry = self.screens.remove(name).ok_or(SysError::NotFound)?;
        entry.tear_down();
        self.history.retain(|h| h != name);
        Ok(())
    }

    // --- Navigation --------------------------------------------------------

    /// Switch to a screen, materializing it if needed.
    ///
    /// Pushes the previous current screen onto the history on success.
    /// A failed create leaves current, history, and the registry exactly
    /// as they were.
    pub fn switch_to_screen(
        &mut self,
        name: &str,
        transition: Transition,
        anim_ms: u32,
        now: Ticks,
    ) -> SysResult<()> {
        self.switch_inner(name, transition, anim_ms, now, true)?;
        self.stats.switches += 1;
        Ok(())
    }

    /// Pop the navigation history and switch to the popped screen.
    ///
    /// The popped entry is restored on failure. Returns
    /// [`SysError::NotFound`] when the history is empty.
    pub fn go_back(&mut self, transition: Transition, anim_ms: u32, now: Ticks) -> SysResult<()> {
        let target = self.history.pop_back().ok_or(SysError::NotFound)?;
        match self.switch_inner(&target, transition, anim_ms, now, false) {
            Ok(()) => {
                self.stats.back_navigations += 1;
                Ok(())
            }
            Err(err) => {
                self.history.push_back(target);
                Err(err)
            }
        }
    }

    /// Name of the current screen.
    #[must_use]
    pub fn current_screen_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The current screen's root.
    #[must_use]
    pub fn current_screen(&self) -> Option<&UiRoot> {
        let name = self.current.as_deref()?;
        self.screens.get(name)?.root.as_ref()
    }

    /// Mutable access to the current screen's root, for attaching app
    /// subtrees.
    pub fn current_screen_mut(&mut self) -> Option<&mut UiRoot> {
        let name = self.current.clone()?;
        self.screens.get_mut(&name)?.root.as_mut()
    }

    /// The navigation history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// The in-flight transition, if one is running.
    #[must_use]
    pub fn active_transition(&self) -> Option<&TransitionProgress> {
        self.active_transition.as_ref()
    }

    // --- Maintenance -------------------------------------------------------

    /// Evict cold screens beyond the cap. Returns how many were destroyed.
    pub fn cleanup_screens(&mut self) -> usize {
        self.evict_to_cap(0)
    }

    /// Per-tick upkeep: clears a finished transition.
    pub fn update(&mut self, now: Ticks) {
        if let Some(t) = &self.active_transition
            && t.is_complete(now)
        {
            self.active_transition = None;
        }
    }

    /// Number of materialized screens, persistent included.
    #[must_use]
    pub fn materialized_count(&self) -> usize {
        self.screens.values().filter(|s| s.is_materialized()).count()
    }

    /// Whether a screen is registered.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.screens.contains_key(name)
    }

    /// Whether a screen is registered and materialized.
    #[must_use]
    pub fn is_materialized(&self, name: &str) -> bool {
        self.screens.get(name).is_some_and(ScreenEntry::is_materialized)
    }

    /// Navigation counters.
    #[must_use]
    pub fn stats(&self) -> ScreenManagerStats {
        self.stats
    }

    // --- Internals ---------------------------------------------------------

    fn switch_inner(
        &mut self,
        name: &str,
        transition: Transition,
        anim_ms: u32,
        now: Ticks,
        push_history: bool,
    ) -> SysResult<()> {
        if !self.screens.contains_key(name) {
            return Err(SysError::NotFound);
        }
        if self.current.as_deref() == Some(name) {
            if let Some(entry) = self.screens.get_mut(name) {
                entry.last_access = now;
            }
            return Ok(());
        }

        if !self.screens[name].is_materialized() {
            // Make room before materializing; the incoming screen needs a
            // slot unless it is persistent.
            let headroom = usize::from(!self.screens[name].is_persistent());
            self.evict_to_cap(headroom);

            let entry = self.screens.get_mut(name).ok_or(SysError::NotFound)?;
            match (entry.create)() {
                Ok(root) => {
                    entry.root = Some(root);
                    entry.created_at = now;
                }
                Err(err) => {
                    self.stats.create_failures += 1;
                    warn!(screen = name, %err, "screen create failed; switch aborted");
                    return Err(err);
                }
            }
        }

        if push_history && let Some(prev) = self.current.take() {
            if self.history.len() == self.history_depth {
                self.history.pop_front();
            }
            self.history.push_back(prev);
        }

        self.current = Some(name.to_owned());
        if let Some(entry) = self.screens.get_mut(name) {
            entry.last_access = now;
        }
        self.active_transition = Some(TransitionProgress::new(transition, anim_ms, now));
        debug!(screen = name, ?transition, "screen switched");

        // The previous screen stays materialized for history, but only
        // while the cap allows it.
        self.evict_to_cap(0);
        Ok(())
    }

    /// Destroy least-recently-accessed non-persistent screens (never the
    /// current one) until at most `max_screens - headroom` remain
    /// materialized. Returns how many were destroyed.
    fn evict_to_cap(&mut self, headroom: usize) -> usize {
        let cap = self.max_screens.saturating_sub(headroom);
        let mut evicted = 0;
        loop {
            let total = self
                .screens
                .values()
                .filter(|s| s.is_materialized() && !s.is_persistent())
                .count();
            if total <= cap {
                return evicted;
            }
            let victim = self
                .screens
                .iter()
                .filter(|(name, s)| {
                    s.is_materialized()
                        && !s.is_persistent()
                        && self.current.as_deref() != Some(name.as_str())
                })
                .min_by_key(|(name, s)| (s.last_access.as_millis(), name.as_str()))
                .map(|(name, _)| name.clone());
            let Some(victim) = victim else { return evicted };
            if let Some(entry) = self.screens.get_mut(&victim) {
                entry.tear_down();
            }
            self.stats.evictions += 1;
            evicted += 1;
            debug!(screen = %victim, "screen evicted");
        }
    }
}

impl std::fmt::Debug for ScreenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenManager")
            .field("registered", &self.screens.len())
            .field("current", &self.current)
            .field("history_len", &self.history.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
