//! The `DOMContentLoaded` signal.
//!
//! The signal is logged once per capture however many listeners wait for
//! it. During replay the application's listeners for it are held back and
//! only see the replayed signal, which waits for the real one if the page
//! has not finished loading yet.

use crate::context::{CaptureContext, NativeRefs, ReplayContext};
use crate::plugin::{Completion, Plugin, require_natives};
use crate::scheduler::Continuation;
use reprise_core::{EngineError, EngineResult};
use reprise_dom::{
    EventFactory, EventTarget, InterfaceRegistry, Listener, listener, serialize,
};
use reprise_host::{ListenerApi, WeakWindow};
use reprise_log::{Entry, PageLoadDetails, kind};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

const SIGNAL: &str = "DOMContentLoaded";

fn is_signal(target: EventTarget, event_type: &str) -> bool {
    target == EventTarget::Document && event_type == SIGNAL
}

type Queue = Rc<RefCell<Vec<(Listener, bool)>>>;

/// State of one replay, shared with the listeners it installs
struct PageLoadReplay {
    window: WeakWindow,
    interfaces: Rc<InterfaceRegistry>,
    factory: Rc<dyn EventFactory>,
    /// Whether the platform has delivered the real signal
    fired: Cell<bool>,
    /// Whether the replayed signal has been dispatched
    delivered: Cell<bool>,
    queue: Queue,
    previous: RefCell<Option<Rc<dyn ListenerApi>>>,
    helpers: RefCell<Vec<Listener>>,
}

impl PageLoadReplay {
    fn busy() -> EngineError {
        EngineError::invalid_state("page-load replay state is busy")
    }

    fn restore_listeners(&self) -> EngineResult<()> {
        let previous = self.previous.try_borrow_mut().map_err(|_| Self::busy())?.take();
        if let Some(previous) = previous {
            self.window.upgrade()?.globals().listeners.set(previous);
        }
        Ok(())
    }

    fn remove_helpers(&self, registrar: &dyn ListenerApi) -> EngineResult<()> {
        let helpers = std::mem::take(&mut *self.helpers.try_borrow_mut().map_err(|_| Self::busy())?);
        for helper in helpers {
            registrar.remove_event_listener(EventTarget::Document, SIGNAL, &helper, false)?;
        }
        Ok(())
    }

    fn fire(&self, attrs: &Map<String, Value>) -> EngineResult<()> {
        if self.delivered.replace(true) {
            return Ok(());
        }
        self.restore_listeners()?;
        let window = self.window.upgrade()?;
        let queued = std::mem::take(&mut *self.queue.try_borrow_mut().map_err(|_| Self::busy())?);
        debug!(listeners = queued.len(), "delivering replayed DOMContentLoaded");
        for (queued, capture) in queued {
            window.add_event_listener(EventTarget::Document, SIGNAL, queued, capture)?;
        }

        let mut event = self
            .interfaces
            .create(&*self.factory, "Event", attrs, None)?;
        window.dispatch_event(EventTarget::Document, &mut event)?;
        Ok(())
    }
}

/// Records and replays the page-load signal
pub struct PageLoadPlugin {
    natives: Option<NativeRefs>,
    capture_listener: Option<Listener>,
    session: Option<Rc<PageLoadReplay>>,
}

impl PageLoadPlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            capture_listener: None,
            session: None,
        }
    }
}

impl Default for PageLoadPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PageLoadPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let window = cx.window.downgrade();
        let clock = Rc::clone(&natives.date);
        let log = cx.log.clone();
        let logged = Rc::new(Cell::new(false));
        let once = listener(move |event| {
            if !log.is_live() || logged.replace(true) {
                return Ok(());
            }
            let attrs = serialize(&*window.upgrade()?.document()?, event);
            log.push_event(Entry::with_details(
                kind::DOM_CONTENT_LOADED,
                clock.now()?,
                &PageLoadDetails { attrs },
            )?)
        });
        natives
            .listeners
            .add_event_listener(EventTarget::Document, SIGNAL, Rc::clone(&once), false)?;
        self.capture_listener = Some(once);
        Ok(())
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let session = Rc::new(PageLoadReplay {
            window: cx.window.downgrade(),
            interfaces: Rc::clone(&natives.interfaces),
            factory: Rc::clone(&natives.event_factory),
            fired: Cell::new(cx.window.is_loaded()),
            delivered: Cell::new(false),
            queue: Rc::new(RefCell::new(Vec::new())),
            previous: RefCell::new(None),
            helpers: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&session);
        let signal = listener(move |_| {
            if let Some(session) = weak.upgrade() {
                session.fired.set(true);
            }
            Ok(())
        });
        natives
            .listeners
            .add_event_listener(EventTarget::Document, SIGNAL, Rc::clone(&signal), false)?;
        session
            .helpers
            .try_borrow_mut()
            .map_err(|_| PageLoadReplay::busy())?
            .push(signal);

        let slot = &cx.window.globals().listeners;
        let wrapper = Rc::new(QueueingListeners {
            inner: slot.get(),
            queue: Rc::clone(&session.queue),
        });
        *session
            .previous
            .try_borrow_mut()
            .map_err(|_| PageLoadReplay::busy())? = Some(slot.replace(wrapper));

        self.session = Some(session);
        Ok(())
    }

    fn replay(&mut self, entry: &Entry, step: Continuation) -> EngineResult<Completion> {
        let natives = require_natives(&self.natives)?;
        let session = self
            .session
            .as_ref()
            .map(Rc::clone)
            .ok_or_else(|| EngineError::invalid_state("page-load replay was not prepared"))?;
        let PageLoadDetails { attrs } = entry.details_as()?;

        if session.fired.get() {
            session.fire(&attrs)?;
            return Ok(Completion::Done);
        }

        debug!("waiting for DOMContentLoaded");
        let pending = RefCell::new(Some(step));
        let weak = Rc::downgrade(&session);
        let waiter = listener(move |_| {
            let Some(session) = weak.upgrade() else {
                return Ok(());
            };
            let Some(step) = pending.take() else {
                return Ok(());
            };
            session.fire(&attrs)?;
            step.resume()
        });
        natives
            .listeners
            .add_event_listener(EventTarget::Document, SIGNAL, Rc::clone(&waiter), false)?;
        session
            .helpers
            .try_borrow_mut()
            .map_err(|_| PageLoadReplay::busy())?
            .push(waiter);
        Ok(Completion::Deferred)
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        if let Some(once) = self.capture_listener.take() {
            natives
                .listeners
                .remove_event_listener(EventTarget::Document, SIGNAL, &once, false)?;
        }
        if let Some(session) = self.session.take() {
            session.remove_helpers(&*natives.listeners)?;
            session.restore_listeners()?;
        }
        Ok(())
    }
}

/// Holds back page-load listeners until the replayed signal
struct QueueingListeners {
    inner: Rc<dyn ListenerApi>,
    queue: Queue,
}

impl QueueingListeners {
    fn queue(&self) -> EngineResult<std::cell::RefMut<'_, Vec<(Listener, bool)>>> {
        self.queue.try_borrow_mut().map_err(|_| PageLoadReplay::busy())
    }
}

impl ListenerApi for QueueingListeners {
    fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        capture: bool,
    ) -> EngineResult<()> {
        if !is_signal(target, event_type) {
            return self
                .inner
                .add_event_listener(target, event_type, listener, capture);
        }
        let mut queue = self.queue()?;
        if !queue
            .iter()
            .any(|(l, c)| *c == capture && Rc::ptr_eq(l, &listener))
        {
            queue.push((listener, capture));
        }
        Ok(())
    }

    fn remove_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: &Listener,
        capture: bool,
    ) -> EngineResult<bool> {
        if !is_signal(target, event_type) {
            return self
                .inner
                .remove_event_listener(target, event_type, listener, capture);
        }
        let mut queue = self.queue()?;
        let before = queue.len();
        queue.retain(|(l, c)| !(*c == capture && Rc::ptr_eq(l, listener)));
        Ok(queue.len() != before)
    }
}
