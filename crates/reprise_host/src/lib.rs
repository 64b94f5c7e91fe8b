//! REPRISE Host
//!
//! A simulated browser page whose non-deterministic capabilities sit in
//! swappable slots:
//! - Virtual-time event loop behind the timers and `Date`
//! - Seeded `Math.random`
//! - Document with listener registration and the event-binding library
//! - `document.createEvent` over a configurable interface set
//! - `XMLHttpRequest` state machine over a scripted network
//! - Ordered `localStorage`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binder;
pub mod clock;
pub mod config;
pub mod event_loop;
pub mod factory;
pub mod global;
pub mod listeners;
pub mod network;
pub mod random;
pub mod storage;
pub mod timers;
pub mod window;
pub mod xhr;

pub use binder::{Binder, BoundEvent, BoundHandler, EventBinding, HandlerId, bound_handler};
pub use clock::{Clock, Date, DateApi, DateArgs, DateComponents, NativeDate, SystemClock};
pub use config::PlatformConfig;
pub use event_loop::{EventLoop, TaskCallback};
pub use factory::NativeEventFactory;
pub use global::Global;
pub use listeners::{ListenerApi, NativeListeners};
pub use network::{Network, Request, Response};
pub use random::{MathApi, NativeMath};
pub use storage::{MemoryStorage, StorageApi};
pub use timers::{NativeTimers, TimerApi, TimerCallback};
pub use window::{Globals, WeakWindow, Window};
pub use xhr::{
    NativeXhrApi, RequestEvents, XhrApi, XhrMembers, XhrObject, XmlHttpRequest, XHR_METHODS,
    XHR_PROPERTIES,
};
