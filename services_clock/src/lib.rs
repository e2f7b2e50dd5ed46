//! # Clock Service
//!
//! A deterministic, cooperative timer for deferred and incremental work.
//!
//! ## Philosophy
//!
//! - **Deterministic**: Time only moves when the host calls [`Clock::tick`]
//! - **Cooperative**: Long-running work is a [`Coroutine`] that yields waits
//! - **No threads**: Everything runs on the caller's stack, in order
//!
//! ## Task kinds
//!
//! - Recurring tasks fire every `interval` and reset
//! - Deferred tasks fire once after a delay and are removed
//! - Coroutines resume each time their last yielded wait has elapsed
//!
//! Within a tick, work runs in the order recurring → deferred → coroutines,
//! and each group runs in registration order. Work registered during a tick
//! is first aged on the following tick.
//!
//! ## Example
//!
//! ```
//! use services_clock::Clock;
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let clock = Clock::new();
//! let fired = Rc::new(Cell::new(0));
//! let counter = fired.clone();
//! clock.schedule(Duration::from_secs(1), move || counter.set(counter.get() + 1));
//!
//! clock.tick(Duration::from_millis(600));
//! clock.tick(Duration::from_millis(600));
//! assert_eq!(fired.get(), 1);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Host update cadence: six ticks per second
pub const DEFAULT_TICK: Duration = Duration::from_nanos(1_000_000_000 / 6);

/// A resumable unit of work
///
/// Each call to `resume` runs the next step and returns how long to wait
/// before the following one, or `None` once finished.
pub trait Coroutine {
    fn resume(&mut self) -> Option<Duration>;
}

impl<I> Coroutine for I
where
    I: Iterator<Item = Duration>,
{
    fn resume(&mut self) -> Option<Duration> {
        self.next()
    }
}

/// Recurring task action
pub type TaskFn = Box<dyn FnMut()>;

/// Deferred task action
pub type DeferredFn = Box<dyn FnOnce()>;

struct RecurringTask {
    interval: Duration,
    remaining: Duration,
    action: TaskFn,
}

struct DeferredTask {
    remaining: Duration,
    action: DeferredFn,
}

struct ActiveCoroutine {
    wait: Duration,
    body: Box<dyn Coroutine>,
}

#[derive(Default)]
struct ClockState {
    recurring: Vec<RecurringTask>,
    deferred: Vec<DeferredTask>,
    coroutines: Vec<ActiveCoroutine>,
    elapsed: Duration,
    tick_count: u64,
    loader_left: bool,
}

/// The node's timer
///
/// Cloning yields another handle onto the same clock, so actions can
/// schedule more work while the clock is ticking.
#[derive(Clone, Default)]
pub struct Clock {
    state: Rc<RefCell<ClockState>>,
}

impl Clock {
    /// Creates a clock with no tasks
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `action` to run every `interval`
    ///
    /// The first run happens once `interval` has elapsed. A zero interval
    /// runs on every tick.
    pub fn schedule(&self, interval: Duration, action: impl FnMut() + 'static) {
        self.state.borrow_mut().recurring.push(RecurringTask {
            interval,
            remaining: interval,
            action: Box::new(action),
        });
    }

    /// Runs `action` once after `delay`
    pub fn queue_for_later(&self, delay: Duration, action: impl FnOnce() + 'static) {
        self.state.borrow_mut().deferred.push(DeferredTask {
            remaining: delay,
            action: Box::new(action),
        });
    }

    /// Starts a coroutine; its first step runs on the next tick
    pub fn start_coroutine(&self, coroutine: impl Coroutine + 'static) {
        self.state.borrow_mut().coroutines.push(ActiveCoroutine {
            wait: Duration::ZERO,
            body: Box::new(coroutine),
        });
    }

    /// Advances time by `delta` and runs whatever became due
    pub fn tick(&self, delta: Duration) {
        // Work is moved out while it runs so actions can re-enter the clock.
        let (mut recurring, mut deferred, mut coroutines) = {
            let mut state = self.state.borrow_mut();
            state.elapsed += delta;
            state.tick_count += 1;
            (
                std::mem::take(&mut state.recurring),
                std::mem::take(&mut state.deferred),
                std::mem::take(&mut state.coroutines),
            )
        };

        for task in recurring.iter_mut() {
            task.remaining = task.remaining.saturating_sub(delta);
            if task.remaining.is_zero() {
                (task.action)();
                task.remaining = task.interval;
            }
        }

        let mut still_deferred = Vec::with_capacity(deferred.len());
        for mut task in deferred.drain(..) {
            task.remaining = task.remaining.saturating_sub(delta);
            if task.remaining.is_zero() {
                (task.action)();
            } else {
                still_deferred.push(task);
            }
        }

        coroutines.retain_mut(|coroutine| {
            coroutine.wait = coroutine.wait.saturating_sub(delta);
            if !coroutine.wait.is_zero() {
                return true;
            }
            match coroutine.body.resume() {
                Some(wait) => {
                    coroutine.wait = wait;
                    true
                }
                None => {
                    debug!("coroutine finished");
                    false
                }
            }
        });

        let mut state = self.state.borrow_mut();
        recurring.append(&mut state.recurring);
        state.recurring = recurring;
        still_deferred.append(&mut state.deferred);
        state.deferred = still_deferred;
        coroutines.append(&mut state.coroutines);
        state.coroutines = coroutines;
    }

    /// Number of deferred tasks not yet fired
    pub fn queued_task_count(&self) -> usize {
        self.state.borrow().deferred.len()
    }

    /// Number of recurring tasks
    pub fn recurring_task_count(&self) -> usize {
        self.state.borrow().recurring.len()
    }

    /// Number of coroutines still running
    pub fn coroutine_count(&self) -> usize {
        self.state.borrow().coroutines.len()
    }

    /// Total time the clock has been advanced
    pub fn elapsed(&self) -> Duration {
        self.state.borrow().elapsed
    }

    /// Number of ticks so far
    pub fn tick_count(&self) -> u64 {
        self.state.borrow().tick_count
    }

    /// Flips the activity indicator; meant for a one-second recurring task
    pub fn toggle_loader(&self) {
        let mut state = self.state.borrow_mut();
        state.loader_left = !state.loader_left;
    }

    /// The activity indicator glyph
    pub fn loader(&self) -> &'static str {
        if self.state.borrow().loader_left {
            "/"
        } else {
            "\\"
        }
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Clock")
            .field("recurring", &state.recurring.len())
            .field("deferred", &state.deferred.len())
            .field("coroutines", &state.coroutines.len())
            .field("elapsed", &state.elapsed)
            .finish()
    }
}

/// Parses a wait given in seconds, such as the argument of `wait 1.5`
///
/// Negative, non-finite or unparsable input yields `None`.
pub fn parse_seconds(text: &str) -> Option<Duration> {
    let secs: f64 = text.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
