//! The timer globals.

use crate::event_loop::EventLoop;
use reprise_core::{EngineResult, TimerId};
use std::rc::Rc;

/// A timer callback
pub type TimerCallback = Rc<dyn Fn() -> EngineResult<()>>;

/// `setTimeout`, `setInterval` and their `clear*` counterparts
pub trait TimerApi {
    /// Run `callback` once after `delay` milliseconds
    ///
    /// # Errors
    ///
    /// Returns error if the timer cannot be queued
    fn set_timeout(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId>;

    /// Run `callback` every `delay` milliseconds
    ///
    /// # Errors
    ///
    /// Returns error if the timer cannot be queued
    fn set_interval(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId>;

    /// Cancel a pending timeout
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unavailable
    fn clear_timeout(&self, id: TimerId) -> EngineResult<()>;

    /// Cancel an interval
    ///
    /// # Errors
    ///
    /// Returns error if the queue is unavailable
    fn clear_interval(&self, id: TimerId) -> EngineResult<()>;
}

/// Timers backed by the event loop
pub struct NativeTimers {
    event_loop: Rc<EventLoop>,
}

impl NativeTimers {
    /// Timers on `event_loop`
    pub fn new(event_loop: Rc<EventLoop>) -> Self {
        Self { event_loop }
    }
}

impl TimerApi for NativeTimers {
    fn set_timeout(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId> {
        self.event_loop
            .schedule(delay, callback)
            .map(TimerId::from_raw)
    }

    fn set_interval(&self, callback: TimerCallback, delay: u64) -> EngineResult<TimerId> {
        self.event_loop
            .schedule_repeating(delay, callback)
            .map(TimerId::from_raw)
    }

    fn clear_timeout(&self, id: TimerId) -> EngineResult<()> {
        self.event_loop.cancel(id.as_u64()).map(|_| ())
    }

    fn clear_interval(&self, id: TimerId) -> EngineResult<()> {
        self.event_loop.cancel(id.as_u64()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reprise_core::Timestamp;
    use std::cell::Cell;

    #[test]
    fn test_timeout_and_interval() {
        let lp = Rc::new(EventLoop::new(Timestamp::zero(), 100));
        let timers = NativeTimers::new(Rc::clone(&lp));
        let count = Rc::new(Cell::new(0));

        let c = Rc::clone(&count);
        let first = timers
            .set_timeout(Rc::new(move || {
                c.set(c.get() + 1);
                Ok(())
            }), 5)
            .unwrap();
        let c = Rc::clone(&count);
        let interval = timers
            .set_interval(Rc::new(move || {
                c.set(c.get() + 10);
                Ok(())
            }), 4)
            .unwrap();
        assert_ne!(first, interval);

        lp.run_for(9).unwrap();
        assert_eq!(count.get(), 21);

        timers.clear_interval(interval).unwrap();
        lp.run_until_idle().unwrap();
        assert_eq!(count.get(), 21);
    }

    #[test]
    fn test_clear_timeout() {
        let lp = Rc::new(EventLoop::new(Timestamp::zero(), 100));
        let timers = NativeTimers::new(Rc::clone(&lp));
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        let id = timers
            .set_timeout(Rc::new(move || {
                f.set(true);
                Ok(())
            }), 0)
            .unwrap();
        timers.clear_timeout(id).unwrap();
        lp.run_until_idle().unwrap();
        assert!(!fired.get());
    }
}
