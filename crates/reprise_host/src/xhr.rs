//! The `XMLHttpRequest` global.
//!
//! Request objects are reached through a dynamic member interface
//! ([`XhrObject`]) so interceptors can observe every property read and
//! method call uniformly. [`XmlHttpRequest`] is the typed view application
//! code uses on top of it.

use crate::event_loop::EventLoop;
use crate::network::{Network, Request, Response};
use indexmap::IndexMap;
use reprise_core::{DomException, EngineError, EngineResult, IdAllocator, RequestId};
use reprise_dom::{DomEvent, EventInit, EventInterface, EventTarget, Listener, ListenerStore, dispatch};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::trace;

/// `readyState` before `open`
pub const UNSENT: u16 = 0;
/// `readyState` after `open`
pub const OPENED: u16 = 1;
/// `readyState` once headers arrived
pub const HEADERS_RECEIVED: u16 = 2;
/// `readyState` while the body streams
pub const LOADING: u16 = 3;
/// `readyState` when finished
pub const DONE: u16 = 4;

/// Readable properties of a request
pub const XHR_PROPERTIES: &[&str] = &[
    "readyState",
    "status",
    "statusText",
    "responseText",
    "response",
    "responseType",
    "timeout",
    "withCredentials",
];

/// Callable methods of a request
pub const XHR_METHODS: &[&str] = &[
    "open",
    "send",
    "abort",
    "setRequestHeader",
    "getResponseHeader",
    "getAllResponseHeaders",
    "overrideMimeType",
];

/// Member names a constructor exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhrMembers {
    /// Property names
    pub properties: Vec<String>,
    /// Method names
    pub methods: Vec<String>,
}

impl XhrMembers {
    /// The native member set
    #[must_use]
    pub fn native() -> Self {
        Self {
            properties: XHR_PROPERTIES.iter().map(|p| (*p).to_string()).collect(),
            methods: XHR_METHODS.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

/// A request object with a dynamic member interface
pub trait XhrObject {
    /// Read a property
    ///
    /// # Errors
    ///
    /// Returns `Exception` for platform exceptions the read raises
    fn get(&self, name: &str) -> EngineResult<Value>;

    /// Write a property
    ///
    /// # Errors
    ///
    /// Returns `Exception` for platform exceptions the write raises
    fn set(&self, name: &str, value: Value) -> EngineResult<()>;

    /// Call a method
    ///
    /// # Errors
    ///
    /// Returns `Exception` for platform exceptions the call raises
    fn call(&self, name: &str, args: &[Value]) -> EngineResult<Value>;

    /// `addEventListener`
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    fn add_listener(&self, event_type: &str, listener: Listener) -> EngineResult<()>;

    /// `removeEventListener`
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    fn remove_listener(&self, event_type: &str, listener: &Listener) -> EngineResult<bool>;

    /// Assign an `on<type>` handler; `None` clears it
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    fn set_event_handler(&self, event_type: &str, handler: Option<Listener>) -> EngineResult<()>;

    /// Listeners registered for `event_type`, handlers included
    fn listener_count(&self, event_type: &str) -> usize;
}

/// The `XMLHttpRequest` constructor
pub trait XhrApi {
    /// `new XMLHttpRequest()`
    ///
    /// # Errors
    ///
    /// Returns error if an interceptor cannot produce a request
    fn construct(&self) -> EngineResult<Rc<dyn XhrObject>>;

    /// Members instances expose
    fn members(&self) -> XhrMembers;
}

/// Listener bookkeeping of one request object
///
/// `on<type>` handlers are ordinary listeners, replaced in place.
pub struct RequestEvents {
    target: EventTarget,
    store: ListenerStore,
    handlers: RefCell<IndexMap<String, Listener>>,
}

impl RequestEvents {
    /// Bookkeeping for the request known as `id`
    #[must_use]
    pub fn new(id: RequestId) -> Self {
        Self {
            target: EventTarget::Request(id),
            store: ListenerStore::new(),
            handlers: RefCell::new(IndexMap::new()),
        }
    }

    /// The request's target
    #[must_use]
    pub fn target(&self) -> EventTarget {
        self.target
    }

    /// Register a listener
    ///
    /// # Errors
    ///
    /// Returns error if the store is busy
    pub fn add(&self, event_type: &str, listener: Listener) -> EngineResult<()> {
        self.store.add(self.target, event_type, listener, false)
    }

    /// Unregister a listener
    ///
    /// # Errors
    ///
    /// Returns error if the store is busy
    pub fn remove(&self, event_type: &str, listener: &Listener) -> EngineResult<bool> {
        self.store.remove(self.target, event_type, listener, false)
    }

    /// Replace the `on<type>` handler
    ///
    /// # Errors
    ///
    /// Returns error if the store is busy
    pub fn set_handler(&self, event_type: &str, handler: Option<Listener>) -> EngineResult<()> {
        let previous = {
            let mut handlers = self
                .handlers
                .try_borrow_mut()
                .map_err(|_| EngineError::invalid_state("request handlers are busy"))?;
            match &handler {
                Some(h) => handlers.insert(event_type.to_string(), Rc::clone(h)),
                None => handlers.shift_remove(event_type),
            }
        };
        if let Some(previous) = previous {
            self.remove(event_type, &previous)?;
        }
        if let Some(handler) = handler {
            self.add(event_type, handler)?;
        }
        Ok(())
    }

    /// Listeners for `event_type`
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.store.count(self.target, event_type)
    }

    /// Dispatch `event` at the request
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub fn dispatch(&self, event: &mut DomEvent) -> EngineResult<bool> {
        dispatch(&self.store, &[], self.target, event)
    }
}

impl std::fmt::Debug for RequestEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEvents")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct XhrState {
    ready_state: u16,
    method: String,
    url: String,
    request_headers: IndexMap<String, String>,
    send_flag: bool,
    error: bool,
    response: Option<Response>,
    response_type: String,
    timeout: u64,
    with_credentials: bool,
    pending: Option<u64>,
}

/// The platform's request object
pub struct NativeXhr {
    this: Weak<NativeXhr>,
    event_loop: Rc<EventLoop>,
    network: Rc<Network>,
    state: RefCell<XhrState>,
    events: RequestEvents,
}

impl NativeXhr {
    fn new(id: RequestId, event_loop: Rc<EventLoop>, network: Rc<Network>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            event_loop,
            network,
            state: RefCell::new(XhrState::default()),
            events: RequestEvents::new(id),
        })
    }

    fn state(&self) -> EngineResult<std::cell::RefMut<'_, XhrState>> {
        self.state
            .try_borrow_mut()
            .map_err(|_| EngineError::invalid_state("request state is busy"))
    }

    fn fire(&self, event_type: &str) -> EngineResult<()> {
        let mut event = DomEvent::trusted(
            EventInterface::Event,
            &EventInit::new(event_type, false, false),
            self.event_loop.now(),
        );
        self.events.dispatch(&mut event).map(|_| ())
    }

    fn set_ready_state(&self, ready_state: u16) -> EngineResult<()> {
        self.state()?.ready_state = ready_state;
        self.fire("readystatechange")
    }

    fn open(&self, args: &[Value]) -> EngineResult<Value> {
        let method = arg_string(args, 0);
        if !is_token(&method) {
            return Err(DomException::syntax_error(format!("'{}' is not a valid HTTP method", method)).into());
        }
        let pending = {
            let mut state = self.state()?;
            let pending = state.pending.take();
            *state = XhrState {
                method: normalize_method(&method),
                url: arg_string(args, 1),
                response_type: std::mem::take(&mut state.response_type),
                timeout: state.timeout,
                with_credentials: state.with_credentials,
                ..XhrState::default()
            };
            pending
        };
        if let Some(handle) = pending {
            self.event_loop.cancel(handle)?;
        }
        self.set_ready_state(OPENED)?;
        Ok(Value::Null)
    }

    fn send(&self, args: &[Value]) -> EngineResult<Value> {
        let request = {
            let mut state = self.state()?;
            if state.ready_state != OPENED || state.send_flag {
                return Err(DomException::invalid_state_error("The object's state must be OPENED.").into());
            }
            state.send_flag = true;
            Request {
                method: state.method.clone(),
                url: state.url.clone(),
                headers: state.request_headers.clone(),
                body: args.first().and_then(Value::as_str).map(str::to_string),
            }
        };

        let response = self.network.fetch(request)?;
        let this = self.this.clone();
        let latency = response.latency;
        let handle = self.event_loop.schedule(
            latency,
            Rc::new(move || match this.upgrade() {
                Some(xhr) => xhr.receive(response.clone()),
                None => Ok(()),
            }),
        )?;
        self.state()?.pending = Some(handle);
        Ok(Value::Null)
    }

    fn receive(&self, response: Response) -> EngineResult<()> {
        trace!(target = %self.events.target(), status = response.status, "response");
        if response.is_failure() {
            {
                let mut state = self.state()?;
                state.pending = None;
                state.send_flag = false;
                state.error = true;
            }
            self.set_ready_state(DONE)?;
            self.fire("error")?;
            return self.fire("loadend");
        }

        {
            let mut state = self.state()?;
            state.pending = None;
            state.response = Some(response);
        }
        self.set_ready_state(HEADERS_RECEIVED)?;
        self.set_ready_state(LOADING)?;
        self.state()?.send_flag = false;
        self.set_ready_state(DONE)?;
        self.fire("load")?;
        self.fire("loadend")
    }

    fn abort(&self) -> EngineResult<Value> {
        let (active, pending) = {
            let mut state = self.state()?;
            let active = (state.ready_state == OPENED && state.send_flag)
                || state.ready_state == HEADERS_RECEIVED
                || state.ready_state == LOADING;
            if active {
                state.send_flag = false;
                state.response = None;
                state.error = true;
            }
            (active, state.pending.take())
        };
        if let Some(handle) = pending {
            self.event_loop.cancel(handle)?;
        }
        if active {
            self.set_ready_state(DONE)?;
            self.fire("abort")?;
            self.fire("loadend")?;
            self.state()?.ready_state = UNSENT;
        }
        Ok(Value::Null)
    }

    fn set_request_header(&self, args: &[Value]) -> EngineResult<Value> {
        let mut state = self.state()?;
        if state.ready_state != OPENED || state.send_flag {
            return Err(DomException::invalid_state_error("The object's state must be OPENED.").into());
        }
        let name = arg_string(args, 0);
        if !is_token(&name) {
            return Err(DomException::syntax_error(format!("'{}' is not a valid HTTP header field name", name)).into());
        }
        let value = arg_string(args, 1);
        state
            .request_headers
            .entry(name)
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(&value);
            })
            .or_insert(value);
        Ok(Value::Null)
    }

    fn response_headers(&self) -> EngineResult<Option<IndexMap<String, String>>> {
        let state = self.state()?;
        if state.ready_state < HEADERS_RECEIVED || state.error {
            return Ok(None);
        }
        Ok(state.response.as_ref().map(|r| r.headers.clone()))
    }

    fn get_response_header(&self, args: &[Value]) -> EngineResult<Value> {
        let name = arg_string(args, 0);
        Ok(self
            .response_headers()?
            .and_then(|headers| {
                headers
                    .into_iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&name))
                    .map(|(_, v)| Value::from(v))
            })
            .unwrap_or(Value::Null))
    }

    fn get_all_response_headers(&self) -> EngineResult<Value> {
        let all = self
            .response_headers()?
            .map(|headers| {
                headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}\r\n", k, v))
                    .collect::<String>()
            })
            .unwrap_or_default();
        Ok(Value::from(all))
    }

    fn override_mime_type(&self) -> EngineResult<Value> {
        let state = self.state()?;
        if state.ready_state == LOADING || state.ready_state == DONE {
            return Err(DomException::invalid_state_error("The object's state must not be LOADING or DONE.").into());
        }
        Ok(Value::Null)
    }

    fn status_line(&self) -> EngineResult<(u16, String)> {
        let state = self.state()?;
        if state.ready_state < HEADERS_RECEIVED && !state.error {
            return Err(DomException::invalid_state_error("The object's state must not be UNSENT or OPENED.").into());
        }
        Ok(state
            .response
            .as_ref()
            .map(|r| (r.status, r.status_text.clone()))
            .unwrap_or((0, String::new())))
    }

    fn body(&self) -> EngineResult<Option<String>> {
        let state = self.state()?;
        if state.ready_state < LOADING || state.error {
            return Ok(None);
        }
        Ok(state.response.as_ref().map(|r| r.body.clone()))
    }
}

impl XhrObject for NativeXhr {
    fn get(&self, name: &str) -> EngineResult<Value> {
        match name {
            "readyState" => Ok(Value::from(self.state()?.ready_state)),
            "status" => Ok(Value::from(self.status_line()?.0)),
            "statusText" => Ok(Value::from(self.status_line()?.1)),
            "responseText" => {
                let response_type = self.state()?.response_type.clone();
                if !(response_type.is_empty() || response_type == "text") {
                    return Err(DomException::invalid_state_error(format!(
                        "The value is only accessible if responseType is '' or 'text' (was '{}').",
                        response_type
                    ))
                    .into());
                }
                Ok(Value::from(self.body()?.unwrap_or_default()))
            }
            "response" => {
                let response_type = self.state()?.response_type.clone();
                let body = self.body()?;
                Ok(match response_type.as_str() {
                    "json" => {
                        let done = self.state()?.ready_state == DONE;
                        body.filter(|_| done)
                            .and_then(|b| serde_json::from_str(&b).ok())
                            .unwrap_or(Value::Null)
                    }
                    _ => Value::from(body.unwrap_or_default()),
                })
            }
            "responseType" => Ok(Value::from(self.state()?.response_type.clone())),
            "timeout" => Ok(Value::from(self.state()?.timeout)),
            "withCredentials" => Ok(Value::Bool(self.state()?.with_credentials)),
            _ => Ok(Value::Null),
        }
    }

    fn set(&self, name: &str, value: Value) -> EngineResult<()> {
        let mut state = self.state()?;
        match name {
            "responseType" => {
                if state.ready_state == LOADING || state.ready_state == DONE {
                    return Err(DomException::invalid_state_error("The response type cannot be set if the object's state is LOADING or DONE.").into());
                }
                if let Some(t) = value.as_str() {
                    if ["", "text", "json", "arraybuffer", "blob", "document"].contains(&t) {
                        state.response_type = t.to_string();
                    }
                }
            }
            "timeout" => state.timeout = value.as_u64().unwrap_or(0),
            "withCredentials" => {
                if state.ready_state > OPENED || state.send_flag {
                    return Err(DomException::invalid_state_error("The value may only be set if the object's state is UNSENT or OPENED.").into());
                }
                state.with_credentials = value.as_bool().unwrap_or(false);
            }
            _ => {}
        }
        Ok(())
    }

    fn call(&self, name: &str, args: &[Value]) -> EngineResult<Value> {
        match name {
            "open" => self.open(args),
            "send" => self.send(args),
            "abort" => self.abort(),
            "setRequestHeader" => self.set_request_header(args),
            "getResponseHeader" => self.get_response_header(args),
            "getAllResponseHeaders" => self.get_all_response_headers(),
            "overrideMimeType" => self.override_mime_type(),
            _ => Err(DomException::type_error(format!("xhr.{} is not a function", name)).into()),
        }
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

/// The platform's `XMLHttpRequest` constructor
pub struct NativeXhrApi {
    event_loop: Rc<EventLoop>,
    network: Rc<Network>,
    ids: IdAllocator,
}

impl NativeXhrApi {
    /// Constructor sending over `network`
    pub fn new(event_loop: Rc<EventLoop>, network: Rc<Network>) -> Self {
        Self {
            event_loop,
            network,
            ids: IdAllocator::new(),
        }
    }
}

impl XhrApi for NativeXhrApi {
    fn construct(&self) -> EngineResult<Rc<dyn XhrObject>> {
        let id = RequestId::from_raw(self.ids.allocate());
        let xhr: Rc<dyn XhrObject> =
            NativeXhr::new(id, Rc::clone(&self.event_loop), Rc::clone(&self.network));
        Ok(xhr)
    }

    fn members(&self) -> XhrMembers {
        XhrMembers::native()
    }
}

/// Typed view of a request object
#[derive(Clone)]
pub struct XmlHttpRequest {
    object: Rc<dyn XhrObject>,
}

impl XmlHttpRequest {
    /// `new XMLHttpRequest()` through the constructor `api`
    ///
    /// # Errors
    ///
    /// Returns error if construction fails
    pub fn new(api: &dyn XhrApi) -> EngineResult<Self> {
        Ok(Self {
            object: api.construct()?,
        })
    }

    /// The underlying object
    #[must_use]
    pub fn object(&self) -> &Rc<dyn XhrObject> {
        &self.object
    }

    /// `readyState`
    ///
    /// # Errors
    ///
    /// Returns error if the read fails or is not a number
    pub fn ready_state(&self) -> EngineResult<u16> {
        self.number("readyState")
    }

    /// `status`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateError` before headers arrive
    pub fn status(&self) -> EngineResult<u16> {
        self.number("status")
    }

    /// `statusText`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateError` before headers arrive
    pub fn status_text(&self) -> EngineResult<String> {
        self.string("statusText")
    }

    /// `responseText`
    ///
    /// # Errors
    ///
    /// Returns error if the read fails
    pub fn response_text(&self) -> EngineResult<String> {
        self.string("responseText")
    }

    /// `open(method, url, true)`
    ///
    /// # Errors
    ///
    /// Returns `SyntaxError` for invalid methods
    pub fn open(&self, method: &str, url: &str) -> EngineResult<()> {
        self.object
            .call("open", &[Value::from(method), Value::from(url), Value::Bool(true)])
            .map(|_| ())
    }

    /// `send(body)`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateError` unless opened and not yet sent
    pub fn send(&self, body: Option<&str>) -> EngineResult<()> {
        let args = body.map(|b| vec![Value::from(b)]).unwrap_or_default();
        self.object.call("send", &args).map(|_| ())
    }

    /// `abort()`
    ///
    /// # Errors
    ///
    /// Returns error if an abort listener fails
    pub fn abort(&self) -> EngineResult<()> {
        self.object.call("abort", &[]).map(|_| ())
    }

    /// `setRequestHeader(name, value)`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateError` unless opened and not yet sent
    pub fn set_request_header(&self, name: &str, value: &str) -> EngineResult<()> {
        self.object
            .call("setRequestHeader", &[Value::from(name), Value::from(value)])
            .map(|_| ())
    }

    /// `getResponseHeader(name)`
    ///
    /// # Errors
    ///
    /// Returns error if the call fails
    pub fn get_response_header(&self, name: &str) -> EngineResult<Option<String>> {
        let value = self.object.call("getResponseHeader", &[Value::from(name)])?;
        Ok(value.as_str().map(str::to_string))
    }

    /// Assign `onreadystatechange`
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    pub fn on_ready_state_change(&self, handler: Option<Listener>) -> EngineResult<()> {
        self.object.set_event_handler("readystatechange", handler)
    }

    /// `addEventListener(type, listener)`
    ///
    /// # Errors
    ///
    /// Returns error if the listener store is busy
    pub fn add_event_listener(&self, event_type: &str, listener: Listener) -> EngineResult<()> {
        self.object.add_listener(event_type, listener)
    }

    fn number(&self, name: &str) -> EngineResult<u16> {
        let value = self.object.get(name)?;
        value
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| EngineError::Encoding {
                message: format!("{} is not a number: {}", name, value),
            })
    }

    fn string(&self, name: &str) -> EngineResult<String> {
        match self.object.get(name)? {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(EngineError::Encoding {
                message: format!("{} is not a string: {}", name, other),
            }),
        }
    }
}

impl std::fmt::Debug for XmlHttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlHttpRequest").finish_non_exhaustive()
    }
}

fn arg_string(args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

fn normalize_method(method: &str) -> String {
    const NORMALIZED: &[&str] = &["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];
    NORMALIZED
        .iter()
        .find(|m| m.eq_ignore_ascii_case(method))
        .map_or_else(|| method.to_string(), |m| (*m).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reprise_core::Timestamp;
    use reprise_dom::listener;

    fn setup() -> (Rc<EventLoop>, Rc<Network>, NativeXhrApi) {
        let lp = Rc::new(EventLoop::new(Timestamp::zero(), 100));
        let network = Rc::new(Network::new());
        let api = NativeXhrApi::new(Rc::clone(&lp), Rc::clone(&network));
        (lp, network, api)
    }

    #[test]
    fn test_request_lifecycle() {
        let (lp, network, api) = setup();
        network
            .route(
                "GET",
                "/data.json",
                Response::ok(r#"{"a":1}"#)
                    .with_header("Content-Type", "application/json")
                    .with_latency(30),
            )
            .unwrap();

        let xhr = XmlHttpRequest::new(&api).unwrap();
        let states = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&states);
        let view = xhr.clone();
        xhr.on_ready_state_change(Some(listener(move |_| {
            seen.borrow_mut().push(view.ready_state()?);
            Ok(())
        })))
        .unwrap();

        xhr.open("get", "/data.json").unwrap();
        xhr.send(None).unwrap();
        assert_eq!(xhr.ready_state().unwrap(), OPENED);

        lp.run_until_idle().unwrap();
        assert_eq!(*states.borrow(), vec![OPENED, HEADERS_RECEIVED, LOADING, DONE]);
        assert_eq!(lp.now(), Timestamp::from_millis(30));
        assert_eq!(xhr.status().unwrap(), 200);
        assert_eq!(xhr.response_text().unwrap(), r#"{"a":1}"#);
        assert_eq!(
            xhr.get_response_header("content-type").unwrap().as_deref(),
            Some("application/json")
        );
        assert_eq!(network.requests()[0].method, "GET");
    }

    #[test]
    fn test_state_errors() {
        let (_, _, api) = setup();
        let xhr = XmlHttpRequest::new(&api).unwrap();

        let err = xhr.send(None).unwrap_err();
        assert_eq!(err.as_exception().map(|e| e.name.as_str()), Some("InvalidStateError"));

        xhr.open("GET", "/x").unwrap();
        let err = xhr.status().unwrap_err();
        assert_eq!(err.as_exception().and_then(|e| e.code), Some(11));

        let err = xhr.open("bad method", "/x").unwrap_err();
        assert_eq!(err.as_exception().map(|e| e.name.as_str()), Some("SyntaxError"));

        let err = xhr.object().call("frobnicate", &[]).unwrap_err();
        assert_eq!(err.as_exception().map(|e| e.name.as_str()), Some("TypeError"));
    }

    #[test]
    fn test_abort_cancels_response() {
        let (lp, network, api) = setup();
        network
            .route("GET", "/slow", Response::ok("late").with_latency(100))
            .unwrap();
        let xhr = XmlHttpRequest::new(&api).unwrap();
        let aborted = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&aborted);
        xhr.add_event_listener(
            "abort",
            listener(move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            }),
        )
        .unwrap();

        xhr.open("GET", "/slow").unwrap();
        xhr.send(None).unwrap();
        xhr.abort().unwrap();
        assert!(*aborted.borrow());
        assert_eq!(xhr.ready_state().unwrap(), UNSENT);
        assert_eq!(lp.run_until_idle().unwrap(), 0);
    }

    #[test]
    fn test_handler_replaced_in_place() {
        let (_, _, api) = setup();
        let xhr = api.construct().unwrap();
        xhr.set_event_handler("readystatechange", Some(listener(|_| Ok(()))))
            .unwrap();
        xhr.set_event_handler("readystatechange", Some(listener(|_| Ok(()))))
            .unwrap();
        assert_eq!(xhr.listener_count("readystatechange"), 1);
        xhr.set_event_handler("readystatechange", None).unwrap();
        assert_eq!(xhr.listener_count("readystatechange"), 0);
    }
}
