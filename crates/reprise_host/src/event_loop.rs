//! Virtual-time event loop.
//!
//! The loop is completely deterministic:
//! - Tasks are ordered by due time, then by scheduling order
//! - Time only moves when a task runs or `run_for` advances it
//! - Repeating tasks are re-queued before their callback runs, so a
//!   callback may cancel its own repetition

use crate::clock::Clock;
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult, Timestamp};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;

/// A queued callback
pub type TaskCallback = Rc<dyn Fn() -> EngineResult<()>>;

struct Task {
    handle: u64,
    callback: TaskCallback,
    interval: Option<u64>,
}

/// Single-threaded task queue over a virtual clock
pub struct EventLoop {
    /// Current virtual time
    now: Cell<Timestamp>,
    /// Pending tasks keyed by (due, sequence)
    queue: RefCell<BTreeMap<(Timestamp, u64), Task>>,
    /// Queue key of every live handle
    keys: RefCell<IndexMap<u64, (Timestamp, u64)>>,
    /// Next handle; handles start at 1
    next_handle: Cell<u64>,
    /// Tie breaker for equal due times
    sequence: Cell<u64>,
    /// Bound for `run_until_idle`
    max_steps: u64,
}

impl EventLoop {
    /// Create a loop whose clock starts at `epoch`
    #[must_use]
    pub fn new(epoch: Timestamp, max_steps: u64) -> Self {
        Self {
            now: Cell::new(epoch),
            queue: RefCell::new(BTreeMap::new()),
            keys: RefCell::new(IndexMap::new()),
            next_handle: Cell::new(1),
            sequence: Cell::new(0),
            max_steps,
        }
    }

    /// Current virtual time
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.now.get()
    }

    /// Queue `callback` to run once after `delay` milliseconds
    ///
    /// # Errors
    ///
    /// Returns error if called while the queue is borrowed
    pub fn schedule(&self, delay: u64, callback: TaskCallback) -> EngineResult<u64> {
        self.enqueue(delay, callback, None)
    }

    /// Queue `callback` to run every `interval` milliseconds
    ///
    /// # Errors
    ///
    /// Returns error if called while the queue is borrowed
    pub fn schedule_repeating(&self, interval: u64, callback: TaskCallback) -> EngineResult<u64> {
        self.enqueue(interval, callback, Some(interval))
    }

    fn enqueue(&self, delay: u64, callback: TaskCallback, interval: Option<u64>) -> EngineResult<u64> {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        self.insert(
            self.now().add_millis(delay),
            Task {
                handle,
                callback,
                interval,
            },
        )?;
        Ok(handle)
    }

    fn insert(&self, due: Timestamp, task: Task) -> EngineResult<()> {
        let seq = self.sequence.get();
        self.sequence.set(seq + 1);
        let mut keys = self.keys.try_borrow_mut().map_err(|_| busy())?;
        let mut queue = self.queue.try_borrow_mut().map_err(|_| busy())?;
        keys.insert(task.handle, (due, seq));
        queue.insert((due, seq), task);
        Ok(())
    }

    /// Drop a pending task, returning whether it was pending
    ///
    /// # Errors
    ///
    /// Returns error if called while the queue is borrowed
    pub fn cancel(&self, handle: u64) -> EngineResult<bool> {
        let mut keys = self.keys.try_borrow_mut().map_err(|_| busy())?;
        let Some(key) = keys.shift_remove(&handle) else {
            return Ok(false);
        };
        self.queue
            .try_borrow_mut()
            .map_err(|_| busy())?
            .remove(&key);
        Ok(true)
    }

    /// Number of pending tasks
    #[must_use]
    pub fn pending(&self) -> usize {
        self.keys.try_borrow().map(|k| k.len()).unwrap_or(0)
    }

    /// Due time of the next task
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.queue
            .try_borrow()
            .ok()
            .and_then(|q| q.keys().next().map(|(due, _)| *due))
    }

    /// Run the earliest task, advancing the clock to its due time
    ///
    /// Returns `false` if nothing was pending.
    ///
    /// # Errors
    ///
    /// Returns the error of the task's callback
    pub fn step(&self) -> EngineResult<bool> {
        let popped = {
            let mut queue = self.queue.try_borrow_mut().map_err(|_| busy())?;
            queue.pop_first()
        };
        let Some(((due, _), task)) = popped else {
            return Ok(false);
        };

        if due > self.now() {
            self.now.set(due);
        }
        let callback = Rc::clone(&task.callback);
        match task.interval {
            Some(interval) => self.insert(due.add_millis(interval.max(1)), task)?,
            None => {
                self.keys
                    .try_borrow_mut()
                    .map_err(|_| busy())?
                    .shift_remove(&task.handle);
            }
        }

        trace!(now = %self.now(), "running task");
        callback()?;
        Ok(true)
    }

    /// Run tasks until the queue is empty
    ///
    /// Returns the number of tasks run.
    ///
    /// # Errors
    ///
    /// Returns error if a task fails or the queue does not drain within the
    /// configured step bound
    pub fn run_until_idle(&self) -> EngineResult<u64> {
        let mut steps = 0;
        while self.step()? {
            steps += 1;
            if steps >= self.max_steps {
                return Err(EngineError::invalid_state(format!(
                    "event loop did not settle after {} tasks",
                    steps
                )));
            }
        }
        Ok(steps)
    }

    /// Run every task due within the next `millis` milliseconds, then move
    /// the clock to the end of the window
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing task
    pub fn run_for(&self, millis: u64) -> EngineResult<u64> {
        let deadline = self.now().add_millis(millis);
        let mut steps = 0;
        while self.next_due().is_some_and(|due| due <= deadline) {
            self.step()?;
            steps += 1;
        }
        if deadline > self.now() {
            self.now.set(deadline);
        }
        Ok(steps)
    }
}

impl Clock for EventLoop {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

fn busy() -> EngineError {
    EngineError::invalid_state("event loop queue is busy")
}
