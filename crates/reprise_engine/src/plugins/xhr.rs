//! `XMLHttpRequest` proxies.
//!
//! Capture hands the application a proxy around a real request. Every
//! member read and method call is forwarded and its outcome, value or
//! thrown exception, appended to that member's recorded sequence. State
//! change notifications are logged as `xhr` entries and then forwarded to
//! the proxy's own listeners.
//!
//! Replay hands out proxies with no request behind them. They answer each
//! member access with the next recorded outcome and receive the recorded
//! notifications from the scheduler. No network traffic happens.

use crate::context::{CaptureContext, NativeRefs, ReplayContext, ReplayCursors, SessionLog};
use crate::plugin::{Completion, Hook, Plugin, require_natives};
use crate::scheduler::Continuation;
use indexmap::IndexMap;
use reprise_core::{EngineError, EngineResult, RequestId};
use reprise_dom::{DomEvent, Listener, listener, serialize};
use reprise_host::{DateApi, RequestEvents, WeakWindow, XhrApi, XhrMembers, XhrObject};
use reprise_log::{Cursor, Entry, InterfaceDescriptor, Outcome, XhrDetails, XhrRecord, kind};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::trace;

const READY_STATE_CHANGE: &str = "readystatechange";

type Proxies = Rc<RefCell<IndexMap<RequestId, Rc<ReplayingXhr>>>>;

/// Records and replays asynchronous requests
pub struct XhrPlugin {
    natives: Option<NativeRefs>,
    hook: Hook<dyn XhrApi>,
    proxies: Proxies,
}

impl XhrPlugin {
    /// Create the plugin
    #[must_use]
    pub fn new() -> Self {
        Self {
            natives: None,
            hook: Hook::new("XMLHttpRequest"),
            proxies: Rc::new(RefCell::new(IndexMap::new())),
        }
    }
}

impl Default for XhrPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn proxies_busy() -> EngineError {
    EngineError::invalid_state("request proxies are busy")
}

impl Plugin for XhrPlugin {
    fn init(&mut self, natives: &NativeRefs) -> EngineResult<()> {
        self.natives = Some(natives.clone());
        Ok(())
    }

    fn capture(&mut self, cx: &CaptureContext) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        let slot = &cx.window.globals().xhr;
        let inner = slot.get();
        let members = inner.members();
        cx.log.record(|log| {
            log.xhr.interface = InterfaceDescriptor::new(members.properties, members.methods);
        })?;
        let wrapper = Rc::new(CapturingXhrApi {
            inner,
            window: cx.window.downgrade(),
            clock: Rc::clone(&natives.date),
            log: cx.log.clone(),
        });
        self.hook.install(slot, wrapper);
        Ok(())
    }

    fn before_replay(&mut self, cx: &ReplayContext) -> EngineResult<()> {
        self.proxies = Rc::new(RefCell::new(IndexMap::new()));
        let interface = cx.log.read(|log| log.xhr.interface.clone())?;
        let wrapper = Rc::new(ReplayingXhrApi {
            cursors: cx.cursors.clone(),
            proxies: Rc::clone(&self.proxies),
            members: XhrMembers {
                properties: interface.properties,
                methods: interface.methods,
            },
        });
        self.hook.install(&cx.window.globals().xhr, wrapper);
        Ok(())
    }

    fn replay(&mut self, entry: &Entry, _step: Continuation) -> EngineResult<Completion> {
        let natives = require_natives(&self.natives)?;
        let details: XhrDetails = entry.details_as()?;
        let proxy = self
            .proxies
            .try_borrow()
            .map_err(|_| proxies_busy())?
            .get(&details.id)
            .map(Rc::clone)
            .ok_or_else(|| {
                EngineError::invalid_state(format!(
                    "{} was never constructed during replay",
                    details.id
                ))
            })?;

        let mut event = natives.interfaces.create(
            &*natives.event_factory,
            "Event",
            &details.attrs,
            None,
        )?;
        proxy.events.dispatch(&mut event)?;
        Ok(Completion::Done)
    }

    fn clean_up(&mut self) -> EngineResult<()> {
        let natives = require_natives(&self.natives)?;
        self.hook.uninstall(&natives.window.globals().xhr);
        self.proxies
            .try_borrow_mut()
            .map_err(|_| proxies_busy())?
            .clear();
        Ok(())
    }
}

struct CapturingXhrApi {
    inner: Rc<dyn XhrApi>,
    window: WeakWindow,
    clock: Rc<dyn DateApi>,
    log: SessionLog,
}

impl XhrApi for CapturingXhrApi {
    fn construct(&self) -> EngineResult<Rc<dyn XhrObject>> {
        let native = self.inner.construct()?;
        if !self.log.is_live() {
            return Ok(native);
        }
        let id = self.log.record(|log| {
            let id = RequestId::from_raw(log.xhr.instances.len() as u64);
            log.xhr.instances.push(XhrRecord::new(id));
            id
        })?;
        trace!(%id, "constructed request proxy");

        let proxy = Rc::new_cyclic(|weak: &Weak<CapturingXhr>| {
            let weak = weak.clone();
            CapturingXhr {
                id,
                native: Rc::clone(&native),
                events: RequestEvents::new(id),
                window: self.window.clone(),
                clock: Rc::clone(&self.clock),
                log: self.log.clone(),
                relay: listener(move |event| match weak.upgrade() {
                    Some(proxy) => proxy.relay(event),
                    None => Ok(()),
                }),
            }
        });
        native.add_listener(READY_STATE_CHANGE, Rc::clone(&proxy.relay))?;
        Ok(proxy)
    }

    fn members(&self) -> XhrMembers {
        self.inner.members()
    }
}

struct CapturingXhr {
    id: RequestId,
    native: Rc<dyn XhrObject>,
    events: RequestEvents,
    window: WeakWindow,
    clock: Rc<dyn DateApi>,
    log: SessionLog,
    relay: Listener,
}

impl CapturingXhr {
    fn relay(&self, event: &mut DomEvent) -> EngineResult<()> {
        if self.events.count(READY_STATE_CHANGE) == 0
            || event.marker.captured
            || event.marker.synthetic
        {
            return Ok(());
        }
        if self.log.is_live() {
            event.marker.captured = true;
            let mut attrs = serialize(&*self.window.upgrade()?.document()?, event);
            attrs.insert("target".to_string(), Value::from(self.id.as_u64()));
            attrs.insert("currentTarget".to_string(), Value::from(self.id.as_u64()));
            self.log.push_event(Entry::with_details(
                kind::XHR,
                self.clock.now()?,
                &XhrDetails { id: self.id, attrs },
            )?)?;
        }

        let mut forwarded = event.forwardable_copy();
        self.events.dispatch(&mut forwarded)?;
        Ok(())
    }

    fn record(&self, member: &str, result: &EngineResult<Value>) -> EngineResult<()> {
        if !self.log.is_live() {
            return Ok(());
        }
        let outcome = match result {
            Ok(value) => Outcome::Result(value.clone()),
            Err(err) => match err.as_exception() {
                Some(exception) => Outcome::Error(exception.clone()),
                None => return Ok(()),
            },
        };
        trace!(id = %self.id, member, "recorded request outcome");
        let index = self.id.index();
        self.log.record(|log| {
            if let Some(record) = log.xhr.instances.get_mut(index) {
                record.record(member, outcome);
            }
        })
    }
}

impl XhrObject for CapturingXhr {
    fn get(&self, name: &str) -> EngineResult<Value> {
        let result = self.native.get(name);
        self.record(name, &result)?;
        result
    }

    fn set(&self, name: &str, value: Value) -> EngineResult<()> {
        self.native.set(name, value)
    }

    fn call(&self, name: &str, args: &[Value]) -> EngineResult<Value> {
        let result = self.native.call(name, args);
        self.record(name, &result)?;
        result
    }

    fn add_listener(&self, event_type: &str, listener: Listener) -> EngineResult<()> {
        self.events.add(event_type, listener)
    }

    fn remove_listener(&self, event_type: &str, listener: &Listener) -> EngineResult<bool> {
        self.events.remove(event_type, listener)
    }

    fn set_event_handler(&self, event_type: &str, handler: Option<Listener>) -> EngineResult<()> {
        self.events.set_handler(event_type, handler)
    }

    fn listener_count(&self, event_type: &str) -> usize {
        self.events.count(event_type)
    }
}

struct ReplayingXhrApi {
    cursors: ReplayCursors,
    proxies: Proxies,
    members: XhrMembers,
}

impl XhrApi for ReplayingXhrApi {
    fn construct(&self) -> EngineResult<Rc<dyn XhrObject>> {
        let record = self.cursors.next_xhr()?;
        let id = record.id;
        let proxy = Rc::new(ReplayingXhr {
            id,
            outcomes: RefCell::new(record.into_cursors()),
            events: RequestEvents::new(id),
        });
        self.proxies
            .try_borrow_mut()
            .map_err(|_| proxies_busy())?
            .insert(id, Rc::clone(&proxy));
        trace!(%id, "replaying request proxy");
        Ok(proxy)
    }

    fn members(&self) -> XhrMembers {
        self.members.clone()
    }
}

struct ReplayingXhr {
    id: RequestId,
    outcomes: RefCell<IndexMap<String, Cursor<Outcome>>>,
    events: RequestEvents,
}

impl ReplayingXhr {
    fn next(&self, member: &str) -> EngineResult<Value> {
        let outcome = self
            .outcomes
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("request outcomes are busy"))?
            .get_mut(member)
            .and_then(Cursor::pop)
            .ok_or_else(|| EngineError::exhausted(format!("{}.{}", self.id, member)))?;
        outcome.into_result().map_err(EngineError::Exception)
    }
}

impl XhrObject for ReplayingXhr {
    fn get(&self, name: &str) -> EngineResult<Value> {
        self.next(name)
    }

    fn set(&self, _name: &str, _value: Value) -> EngineResult<()> {
        Ok(())
    }

    fn call(&self, name: &str, _args: &[Value]) -> EngineResult<Value> {
        self.next(name)
    }

    fn add_listener(&self, event_type: &str, listener: Listener) -> EngineResult<()> {
        self.events.add(event_type, listener)
    }

    fn remove_listener(&self, event_type: &str, listener: &Listener) -> EngineResult<bool> {
        self.events.remove(event_type, listener)
    }

    fn set_event_handler(&self, event_type: &str, handler: Option<Listener>) -> EngineResult<()> {
        self.events.set_handler(event_type, handler)
    }

    fn listener_count(&self, event_type: &str) -> usize {
        self.events.count(event_type)
    }
}
