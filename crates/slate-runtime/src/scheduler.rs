#![forbid(unsafe_code)]

//! Cooperative priority scheduler with frame budgets.
//!
//! One `update` call is one frame. The live task list is sorted by
//! (priority descending, due time ascending) and walked in order; every
//! due task runs to completion. Wall time is checked after each
//! invocation and the sweep stops early once the frame budget is spent;
//! starved tasks keep their due times and roll into the next frame.
//!
//! # Invariants
//!
//! 1. Task ids are unique while the task is live
//! 2. Priorities are within 0–3
//! 3. One-shot tasks (`period = 0`) always auto-delete on completion
//! 4. A running task is never re-entered: callables run to completion
//!    on the single main thread
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Callable returns an error | Counted and logged; periodic tasks stay scheduled |
//! | Invocation exceeds its run budget | Overrun counter bumped; task continues |
//! | Frame budget exhausted mid-sweep | Remaining due tasks wait; due times untouched |

use std::collections::VecDeque;
use std::time::Instant;

use slate_core::error::{SysError, SysResult};
use slate_core::time::Ticks;
use tracing::{debug, warn};

/// Highest allowed task priority. Priorities run 0 (lowest) to 3.
pub const MAX_TASK_PRIORITY: u8 = 3;

/// Stable handle to a scheduled task.
pub type TaskId = u64;

/// A task callable. Runs to completion within a frame; long work must be
/// split across invocations.
pub type TaskFn = Box<dyn FnMut() -> SysResult<()>>;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Due or overdue; will run next frame it is reached.
    Ready,
    /// Currently executing (visible only from inside the callable).
    Running,
    /// Scheduled with a due time in the future.
    Waiting,
    /// Excluded from scheduling until resumed.
    Suspended,
    /// Finished; swept if auto-delete.
    Completed,
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Wall-time ceiling per frame (ms). Default: 16.
    pub frame_budget_ms: u32,

    /// Per-task run budget when none is set explicitly (ms). Default: 50.
    pub default_max_run_ms: u32,

    /// CPU-load averaging window (ms). Default: 1000.
    pub cpu_window_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: 16,
            default_max_run_ms: 50,
            cpu_window_ms: 1000,
        }
    }
}

/// Execution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Task invocations completed.
    pub executed: u64,
    /// Invocations that exceeded their run budget.
    pub overruns: u64,
    /// Invocations that returned an error.
    pub failures: u64,
    /// Frames stopped early by the frame budget.
    pub frames_exhausted: u64,
}

struct Task {
    id: TaskId,
    name: String,
    callback: TaskFn,
    priority: u8,
    state: TaskState,
    next_due: Ticks,
    period_ms: u32,
    max_run_ms: u32,
    total_run_ms: u64,
    run_count: u64,
    auto_delete: bool,
}

/// Cooperative priority scheduler.
pub struct Scheduler {
    tasks: Vec<Task>,
    next_id: TaskId,
    config: SchedulerConfig,
    stats: SchedulerStats,
    /// (frame time, busy ms) samples inside the CPU window.
    busy_samples: VecDeque<(Ticks, u32)>,
}

impl Scheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            config,
            stats: SchedulerStats::default(),
            busy_samples: VecDeque::new(),
        }
    }

    // --- Scheduling --------------------------------------------------------

    /// Schedule a one-shot task after `delay_ms`. One-shots always
    /// auto-delete on completion.
    pub fn schedule_once(
        &mut self,
        name: &str,
        priority: u8,
        delay_ms: u32,
        now: Ticks,
        callback: TaskFn,
    ) -> SysResult<TaskId> {
        self.insert_task(name, priority, 0, delay_ms, now, callback, true)
    }

    /// Schedule a periodic task. `period_ms` must be positive.
    pub fn schedule_periodic(
        &mut self,
        name: &str,
        priority: u8,
        period_ms: u32,
        initial_delay_ms: u32,
        now: Ticks,
        callback: TaskFn,
    ) -> SysResult<TaskId> {
        if period_ms == 0 {
            return Err(SysError::InvalidParam);
        }
        self.insert_task(name, priority, period_ms, initial_delay_ms, now, callback, false)
    }

    /// Remove a task. An in-flight invocation is never interrupted; the
    /// entry is simply gone afterwards. Returns whether the id was live.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.iter().position(|t| t.id == id) {
            Some(idx) => {
                self.tasks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Exclude a task from scheduling.
    pub fn suspend(&mut self, id: TaskId) -> bool {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id && t.state != TaskState::Completed)
            .map(|t| t.state = TaskState::Suspended)
            .is_some()
    }

    /// Put a suspended task back on the schedule.
    pub fn resume(&mut self, id: TaskId) -> bool {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id && t.state == TaskState::Suspended)
            .map(|t| t.state = TaskState::Waiting)
            .is_some()
    }

    /// Override one task's run budget.
    pub fn set_run_budget(&mut self, id: TaskId, max_run_ms: u32) -> bool {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .map(|t| t.max_run_ms = max_run_ms.max(1))
            .is_some()
    }

    /// Whether a task id is live.
    #[must_use]
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// State of a live task.
    #[must_use]
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.iter().find(|t| t.id == id).map(|t| t.state)
    }

    /// (invocations, cumulative run ms) of a live task.
    #[must_use]
    pub fn task_runtime(&self, id: TaskId) -> Option<(u64, u64)> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| (t.run_count, t.total_run_ms))
    }

    /// Number of live tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    // --- Frame -------------------------------------------------------------

    /// Run one frame at `now`. Returns how many invocations ran.
    pub fn update(&mut self, now: Ticks) -> usize {
        // Priority first, earlier due time second. Signed wrapping offsets
        // from `now` order overdue tasks ahead of future ones. Stability
        // is unnecessary.
        self.tasks.sort_unstable_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                (a.next_due.since(now) as i32).cmp(&(b.next_due.since(now) as i32))
            })
        });

        let frame_start = Instant::now();
        let mut executed = 0;
        let mut budget_hit = false;

        for idx in 0..self.tasks.len() {
            {
                let task = &mut self.tasks[idx];
                match task.state {
                    TaskState::Suspended | TaskState::Completed | TaskState::Running => continue,
                    TaskState::Ready | TaskState::Waiting => {
                        if !now.is_at_or_after(task.next_due) {
                            continue;
                        }
                    }
                }
                task.state = TaskState::Running;
            }

            let run_start = Instant::now();
            let result = (self.tasks[idx].callback)();
            let elapsed_ms = run_start.elapsed().as_millis() as u32;

            let task = &mut self.tasks[idx];
            task.total_run_ms += u64::from(elapsed_ms);
            task.run_count += 1;
            self.stats.executed += 1;
            executed += 1;

            if elapsed_ms > task.max_run_ms {
                self.stats.overruns += 1;
                warn!(
                    task = %task.name,
                    elapsed_ms,
                    budget_ms = task.max_run_ms,
                    "task exceeded its run budget"
                );
            }
            if let Err(err) = result {
                self.stats.failures += 1;
                warn!(task = %task.name, %err, "task failed; isolated");
            }

            if task.period_ms > 0 {
                // Next due from end of invocation, not from the old due
                // time, so slow frames do not cause catch-up bursts.
                let end = now.add_millis(frame_start.elapsed().as_millis() as u32);
                task.next_due = end.add_millis(task.period_ms);
                task.state = TaskState::Waiting;
            } else {
                task.state = TaskState::Completed;
            }

            if frame_start.elapsed().as_millis() as u32 >= self.config.frame_budget_ms {
                budget_hit = true;
                break;
            }
        }

        if budget_hit {
            self.stats.frames_exhausted += 1;
            debug!(executed, "frame budget exhausted");
        }

        self.tasks
            .retain(|t| !(t.state == TaskState::Completed && t.auto_delete));

        self.record_busy(now, frame_start.elapsed().as_millis() as u32);
        executed
    }

    /// Rolling CPU load over the configured window, clamped to 0–100.
    #[must_use]
    pub fn cpu_load_percent(&self, now: Ticks) -> u8 {
        let window = self.config.cpu_window_ms;
        let busy: u64 = self
            .busy_samples
            .iter()
            .filter(|(t, _)| now.since(*t) <= window)
            .map(|(_, ms)| u64::from(*ms))
            .sum();
        ((busy * 100) / u64::from(window.max(1))).min(100) as u8
    }

    /// Execution counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Drop every task. Used at shutdown.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    // --- Internals ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn insert_task(
        &mut self,
        name: &str,
        priority: u8,
        period_ms: u32,
        delay_ms: u32,
        now: Ticks,
        callback: TaskFn,
        auto_delete: bool,
    ) -> SysResult<TaskId> {
        if name.is_empty() || priority > MAX_TASK_PRIORITY {
            return Err(SysError::InvalidParam);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            name: name.to_owned(),
            callback,
            priority,
            state: if delay_ms == 0 { TaskState::Ready } else { TaskState::Waiting },
            next_due: now.add_millis(delay_ms),
            period_ms,
            max_run_ms: self.config.default_max_run_ms,
            total_run_ms: 0,
            run_count: 0,
            auto_delete,
        });
        debug!(task = name, id, priority, period_ms, "task scheduled");
        Ok(id)
    }

    fn record_busy(&mut self, now: Ticks, busy_ms: u32) {
        self.busy_samples.push_back((now, busy_ms));
        let window = self.config.cpu_window_ms;
        while let Some((t, _)) = self.busy_samples.front() {
            if now.since(*t) > window {
                self.busy_samples.pop_front();
            } else {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.tasks.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counter() -> (Rc<RefCell<u32>>, TaskFn) {
        let count = Rc::new(RefCell::new(0));
        let cb = {
            let count = Rc::clone(&count);
            Box::new(move || {
                *count.borrow_mut() += 1;
                Ok(())
            })
        };
        (count, cb)
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig::default())
    }

    #[test]
    fn one_shot_runs_once_and_auto_deletes() {
        let mut sched = scheduler();
        let (count, cb) = counter();
        let id = sched.schedule_once("once", 1, 0, Ticks(0), cb).unwrap();

        assert_eq!(sched.update(Ticks(0)), 1);
        assert_eq!(*count.borrow(), 1);
        assert!(!sched.is_scheduled(id));

        assert_eq!(sched.update(Ticks(16)), 0);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn delayed_task_waits_for_its_due_time() {
        let mut sched = scheduler();
        let (count, cb) = counter();
        sched.schedule_once("later", 1, 100, Ticks(0), cb).unwrap();

        assert_eq!(sched.update(Ticks(50)), 0);
        assert_eq!(*count.borrow(), 0);
        assert_eq!(sched.update(Ticks(100)), 1);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn periodic_task_reschedules() {
        let mut sched = scheduler();
        let (count, cb) = counter();
        let id = sched
            .schedule_periodic("tick", 1, 100, 0, Ticks(0), cb)
            .unwrap();

        sched.update(Ticks(0));
        sched.update(Ticks(50));
        sched.update(Ticks(100));
        sched.update(Ticks(200));
        assert_eq!(*count.borrow(), 3);
        assert!(sched.is_scheduled(id));
    }

    #[test]
    fn zero_period_is_invalid() {
        let mut sched = scheduler();
        let (_, cb) = counter();
        assert_eq!(
            sched.schedule_periodic("bad", 1, 0, 0, Ticks(0), cb),
            Err(SysError::InvalidParam)
        );
    }

    #[test]
    fn priority_out_of_range_is_invalid() {
        let mut sched = scheduler();
        let (_, cb) = counter();
        assert_eq!(
            sched.schedule_once("bad", 4, 0, Ticks(0), cb),
            Err(SysError::InvalidParam)
        );
    }

    #[test]
    fn empty_name_is_invalid() {
        let mut sched = scheduler();
        let (_, cb) = counter();
        assert_eq!(
            sched.schedule_once("", 1, 0, Ticks(0), cb),
            Err(SysError::InvalidParam)
        );
    }

    #[test]
    fn higher_priority_runs_first() {
        let mut sched = scheduler();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, prio) in [("low", 0u8), ("high", 3), ("mid", 2)] {
            let order = Rc::clone(&order);
            sched
                .schedule_once(name, prio, 0, Ticks(0), Box::new(move || {
                    order.borrow_mut().push(name);
                    Ok(())
                }))
                .unwrap();
        }
        sched.update(Ticks(0));
        assert_eq!(*order.borrow(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn cancel_removes_and_reports() {
        let mut sched = scheduler();
        let (count, cb) = counter();
        let id = sched.schedule_periodic("t", 1, 10, 0, Ticks(0), cb).unwrap();
        assert!(sched.cancel(id));
        assert!(!sched.cancel(id));
        sched.update(Ticks(0));
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn suspend_and_resume() {
        let mut sched = scheduler();
        let (count, cb) = counter();
        let id = sched.schedule_periodic("t", 1, 10, 0, Ticks(0), cb).unwrap();

        assert!(sched.suspend(id));
        sched.update(Ticks(0));
        assert_eq!(*count.borrow(), 0);

        assert!(sched.resume(id));
        sched.update(Ticks(20));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn failing_task_is_isolated() {
        let mut sched = scheduler();
        let (count, cb) = counter();
        sched
            .schedule_periodic("bad", 3, 10, 0, Ticks(0), Box::new(|| Err(SysError::Generic)))
            .unwrap();
        sched.schedule_periodic("good", 1, 10, 0, Ticks(0), cb).unwrap();

        sched.update(Ticks(0));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(sched.stats().failures, 1);

        // The failing periodic task stays scheduled.
        sched.update(Ticks(20));
        assert_eq!(sched.stats().failures, 2);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn frame_budget_stops_the_sweep() {
        let config = SchedulerConfig {
            frame_budget_ms: 10,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(config);
        let ran = Rc::new(RefCell::new(0));
        for i in 0..5 {
            let ran = Rc::clone(&ran);
            sched
                .schedule_once(&format!("slow{i}"), 1, 0, Ticks(0), Box::new(move || {
                    std::thread::sleep(std::time::Duration::from_millis(6));
                    *ran.borrow_mut() += 1;
                    Ok(())
                }))
                .unwrap();
        }

        let executed = sched.update(Ticks(0));
        assert!(executed < 5, "budget should stop the sweep early");
        assert_eq!(sched.stats().frames_exhausted, 1);
        // Starved tasks are untouched and run next frame.
        assert_eq!(sched.task_count(), 5 - executed);
    }

    #[test]
    fn overrun_is_counted_but_task_survives() {
        let config = SchedulerConfig {
            frame_budget_ms: 100,
            default_max_run_ms: 2,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(config);
        sched
            .schedule_periodic("hog", 1, 10, 0, Ticks(0), Box::new(|| {
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok(())
            }))
            .unwrap();

        sched.update(Ticks(0));
        assert_eq!(sched.stats().overruns, 1);
        assert_eq!(sched.task_count(), 1);
    }

    #[test]
    fn cpu_load_clamps_and_windows() {
        let mut sched = scheduler();
        // Simulate busy frames by recording directly through update with
        // no tasks (busy ≈ 0) and checking the clamp bounds hold.
        sched.update(Ticks(0));
        assert_eq!(sched.cpu_load_percent(Ticks(0)), 0);
        sched.record_busy(Ticks(100), 600);
        sched.record_busy(Ticks(200), 600);
        assert_eq!(sched.cpu_load_percent(Ticks(250)), 100);
        // Outside the window the samples age out of the load figure.
        assert_eq!(sched.cpu_load_percent(Ticks(1300)), 0);
    }
}
