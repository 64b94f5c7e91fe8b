//! REPRISE DOM
//!
//! The document model the host platform exposes to application code:
//! - Node arena with a fixed `html`/`head`/`body` skeleton
//! - Event objects for a closed set of interfaces
//! - Listener store and capture/target/bubble dispatch
//! - Structural paths that relocate a node without a live reference
//! - Event serialization and synthetic reconstruction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod document;
pub mod event;
pub mod listener;
pub mod path;
pub mod serialize;
pub mod synthetic;

pub use dispatch::{dispatch, propagation_path};
pub use document::{Document, Node, NodeId, NodeKind};
pub use event::{
    AttrValue, DomEvent, EventInit, EventInterface, EventMarker, EventPhase, EventTarget,
    InitError, KeyboardEventInit, Modifiers, MouseEventInit,
};
pub use listener::{Listener, ListenerStore, listener};
pub use path::{NodePath, PathError, PathSegment};
pub use serialize::serialize;
pub use synthetic::{EventFactory, InterfaceRegistry, fix_up_fields};
