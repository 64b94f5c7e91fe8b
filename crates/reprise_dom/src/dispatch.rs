//! Capture, target and bubble dispatch.
//!
//! The propagation path is computed before any listener runs, so listeners
//! that mutate the tree do not change which targets see the event.

use crate::document::Document;
use crate::event::{DomEvent, EventPhase, EventTarget};
use crate::listener::ListenerStore;
use reprise_core::{DomException, EngineResult};
use tracing::trace;

/// Ancestors of `target`, nearest first
///
/// Nodes attached to the document end with `Document` then `Window`; the
/// document itself ends with `Window`. Detached subtrees stop at their
/// root. Windows and requests have no ancestors.
#[must_use]
pub fn propagation_path(doc: &Document, target: EventTarget) -> Vec<EventTarget> {
    match target {
        EventTarget::Window | EventTarget::Request(_) => Vec::new(),
        EventTarget::Document => vec![EventTarget::Window],
        EventTarget::Element(id) => {
            let mut path = Vec::new();
            let mut current = doc.parent(id);
            while let Some(node) = current {
                if node == doc.root() {
                    path.push(EventTarget::Document);
                    path.push(EventTarget::Window);
                    break;
                }
                path.push(EventTarget::Element(node));
                current = doc.parent(node);
            }
            path
        }
    }
}

fn invoke(
    listeners: &ListenerStore,
    current: EventTarget,
    capture: bool,
    event: &mut DomEvent,
) -> EngineResult<()> {
    let snapshot = listeners.snapshot(current, &event.event_type, capture)?;
    event.current_target = Some(current);
    for listener in snapshot {
        listener(event)?;
        if event.immediate_propagation_stopped() {
            break;
        }
    }
    event.clear_immediate();
    Ok(())
}

fn run(
    listeners: &ListenerStore,
    path: &[EventTarget],
    target: EventTarget,
    event: &mut DomEvent,
) -> EngineResult<()> {
    event.phase = EventPhase::Capturing;
    for current in path.iter().rev() {
        invoke(listeners, *current, true, event)?;
        if event.propagation_stopped() {
            return Ok(());
        }
    }

    event.phase = EventPhase::AtTarget;
    invoke(listeners, target, true, event)?;
    if event.propagation_stopped() {
        return Ok(());
    }
    invoke(listeners, target, false, event)?;
    if event.propagation_stopped() || !event.bubbles {
        return Ok(());
    }

    event.phase = EventPhase::Bubbling;
    for current in path {
        invoke(listeners, *current, false, event)?;
        if event.propagation_stopped() {
            return Ok(());
        }
    }
    Ok(())
}

/// Dispatch `event` to `target` along `path`
///
/// Returns `false` if a listener prevented the default action.
///
/// # Errors
///
/// Returns `InvalidStateError` for uninitialized or already dispatching
/// events, and the first error returned by a listener
pub fn dispatch(
    listeners: &ListenerStore,
    path: &[EventTarget],
    target: EventTarget,
    event: &mut DomEvent,
) -> EngineResult<bool> {
    if !event.is_initialized() || event.event_type.is_empty() {
        return Err(DomException::invalid_state_error("the event is not initialized").into());
    }
    if event.is_dispatching() {
        return Err(DomException::invalid_state_error("the event is already being dispatched").into());
    }

    trace!(event_type = %event.event_type, %target, "dispatching");
    event.begin_dispatch(target);
    let result = run(listeners, path, target, event);
    event.end_dispatch();
    result?;

    Ok(!event.default_prevented)
}
