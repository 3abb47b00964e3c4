//! Frame scheduler
//!
//! Cooperative per-frame task scheduling. Every long-running animation
//! (expression ramp, head motion, gesture, lip-sync loop, blink) registers a
//! task and keeps the returned handle; teardown is cancelling handles, so no
//! callback can outlive the model it references.
//!
//! One driver (the app's frame loop) calls [`FrameScheduler::tick`] per
//! display frame. Tasks run on the driver's thread; state they touch sits
//! behind short-lived locks, never held across an await.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

/// What a task wants after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Run again next frame.
    Continue,
    /// Retire the task.
    Done,
}

type Task = Box<dyn FnMut(Duration) -> Tick + Send>;

struct Inner {
    tasks: Mutex<HashMap<u64, Task>>,
    /// Ids cancelled while their task was checked out by a running tick.
    cancelled: Mutex<HashSet<u64>>,
    /// Every task with an id below this watermark is dead; `cancel_all`
    /// bumps it so tasks checked out by a concurrent tick cannot survive.
    purge_below: AtomicU64,
    next_id: AtomicU64,
}

impl Inner {
    fn is_purged(&self, id: u64) -> bool {
        id < self.purge_below.load(Ordering::Acquire)
    }
}

/// Shared scheduler handle. Cloning is cheap; all clones drive the same
/// task set.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Arc<Inner>,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                cancelled: Mutex::new(HashSet::new()),
                purge_below: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a per-frame task. The task runs once per [`tick`] until it
    /// returns [`Tick::Done`] or its handle is cancelled.
    ///
    /// [`tick`]: FrameScheduler::tick
    pub fn register(&self, task: impl FnMut(Duration) -> Tick + Send + 'static) -> TaskHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.tasks.lock().insert(id, Box::new(task));
        TaskHandle { id, inner: Arc::downgrade(&self.inner) }
    }

    /// Run `f` once after `delay` has elapsed in frame time.
    pub fn after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) -> TaskHandle {
        let mut remaining = delay;
        let mut f = Some(f);
        self.register(move |dt| {
            if let Some(rest) = remaining.checked_sub(dt) {
                if !rest.is_zero() {
                    remaining = rest;
                    return Tick::Continue;
                }
            }
            if let Some(f) = f.take() {
                f();
            }
            Tick::Done
        })
    }

    /// Advance every live task by `dt`.
    ///
    /// Tasks are checked out of the map while running, so a task may freely
    /// register or cancel other tasks without deadlocking; new registrations
    /// first run on the following tick.
    pub fn tick(&self, dt: Duration) {
        let mut running: Vec<(u64, Task)> = self.inner.tasks.lock().drain().collect();
        // Registration order; ids are monotonic and never reused.
        running.sort_by_key(|(id, _)| *id);

        let mut keep = Vec::new();
        for (id, mut task) in running {
            if self.inner.is_purged(id) || self.inner.cancelled.lock().remove(&id) {
                continue;
            }
            if task(dt) == Tick::Continue {
                keep.push((id, task));
            }
        }

        let mut tasks = self.inner.tasks.lock();
        let mut cancelled = self.inner.cancelled.lock();
        for (id, task) in keep {
            if !self.inner.is_purged(id) && !cancelled.remove(&id) {
                tasks.insert(id, task);
            }
        }
    }

    /// Cancel every task, including any checked out by a tick in progress.
    /// Used on full teardown.
    pub fn cancel_all(&self) {
        let watermark = self.inner.next_id.load(Ordering::Relaxed);
        self.inner.purge_below.store(watermark, Ordering::Release);
        self.inner.tasks.lock().retain(|&id, _| id >= watermark);
    }

    /// Number of live tasks (excluding any currently checked out by `tick`).
    pub fn task_count(&self) -> usize {
        self.inner.tasks.lock().len()
    }
}

/// Cancellation handle for one registered task.
pub struct TaskHandle {
    id: u64,
    inner: Weak<Inner>,
}

impl TaskHandle {
    /// Cancel the task. Idempotent; a no-op once the task has retired or the
    /// scheduler is gone.
    pub fn cancel(&self) {
        if let Some(inner) = self.inner.upgrade() {
            if inner.is_purged(self.id) {
                return;
            }
            let removed = inner.tasks.lock().remove(&self.id).is_some();
            if !removed {
                // Checked out by a running tick; flag it so it is dropped
                // instead of reinserted.
                inner.cancelled.lock().insert(self.id);
            }
        }
    }

    /// Whether the task is still registered.
    pub fn is_live(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.tasks.lock().contains_key(&self.id))
            .unwrap_or(false)
    }
}
