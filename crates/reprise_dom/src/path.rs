//! Structural paths.
//!
//! A path locates a node by child indices, innermost first, with `head` and
//! `body` markers standing in for the two well-known elements. `"window"`
//! stands for the window, `[]` for the document and `null` for no node.
//! Paths are only meaningful while the document has the same shape it had
//! when the path was taken.

use crate::document::{Document, NodeId};
use crate::event::EventTarget;
use reprise_core::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum PathSegment {
    /// Child index
    Index(usize),
    /// The `head` element
    Head,
    /// The `body` element
    Body,
}

impl From<PathSegment> for Value {
    fn from(segment: PathSegment) -> Self {
        match segment {
            PathSegment::Index(i) => Value::from(i),
            PathSegment::Head => Value::from("head"),
            PathSegment::Body => Value::from("body"),
        }
    }
}

impl TryFrom<Value> for PathSegment {
    type Error = PathError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::String(s) if s == "head" => Ok(Self::Head),
            Value::String(s) if s == "body" => Ok(Self::Body),
            Value::Number(n) => n
                .as_u64()
                .map(|i| Self::Index(i as usize))
                .ok_or_else(|| PathError::UnknownSegment(value.to_string())),
            _ => Err(PathError::UnknownSegment(value.to_string())),
        }
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{}", i),
            Self::Head => write!(f, "head"),
            Self::Body => write!(f, "body"),
        }
    }
}

/// A serialized node reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum NodePath {
    /// No node
    Null,
    /// The window
    Window,
    /// Segments, innermost first; empty is the document
    Nodes(Vec<PathSegment>),
}

impl From<NodePath> for Value {
    fn from(path: NodePath) -> Self {
        match path {
            NodePath::Null => Value::Null,
            NodePath::Window => Value::from("window"),
            NodePath::Nodes(segments) => {
                Value::Array(segments.into_iter().map(Value::from).collect())
            }
        }
    }
}

impl TryFrom<Value> for NodePath {
    type Error = PathError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(s) if s == "window" => Ok(Self::Window),
            Value::Array(items) => items
                .into_iter()
                .map(PathSegment::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Nodes),
            other => Err(PathError::UnknownSegment(other.to_string())),
        }
    }
}

/// Failure to resolve a path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The value is not a path segment
    #[error("Cannot traverse into unknown element \"{0}\"")]
    UnknownSegment(String),

    /// The node has fewer children than the segment requires
    #[error("Node has no child at index {index}")]
    MissingChild {
        /// Requested index
        index: usize,
    },

    /// A `head`/`body` marker below the outermost position
    #[error("Marker \"{0}\" is only valid as the outermost segment")]
    MisplacedMarker(PathSegment),
}

impl From<PathError> for EngineError {
    fn from(err: PathError) -> Self {
        let segment = match &err {
            PathError::UnknownSegment(s) => s.clone(),
            PathError::MissingChild { index } => index.to_string(),
            PathError::MisplacedMarker(marker) => marker.to_string(),
        };
        EngineError::Resolution {
            segment,
            reason: err.to_string(),
        }
    }
}

impl Document {
    /// Structural path of a target
    ///
    /// Requests have no place in the tree and yield `null`.
    #[must_use]
    pub fn path_of(&self, target: Option<EventTarget>) -> NodePath {
        match target {
            None | Some(EventTarget::Request(_)) => NodePath::Null,
            Some(EventTarget::Window) => NodePath::Window,
            Some(EventTarget::Document) => NodePath::Nodes(Vec::new()),
            Some(EventTarget::Element(id)) => NodePath::Nodes(self.segments_of(id)),
        }
    }

    fn segments_of(&self, mut node: NodeId) -> Vec<PathSegment> {
        let mut segments = Vec::new();
        while node != self.root() {
            let Some(parent) = self.parent(node) else {
                break;
            };
            if node == self.head() {
                segments.push(PathSegment::Head);
                break;
            }
            if node == self.body() {
                segments.push(PathSegment::Body);
                break;
            }
            if let Some(index) = self.index_in_parent(node) {
                segments.push(PathSegment::Index(index));
            }
            node = parent;
        }
        segments
    }

    /// Resolve a path against this document
    ///
    /// Segments are consumed outermost first. An outermost index selects a
    /// child of the document node.
    ///
    /// # Errors
    ///
    /// Returns error if a segment cannot be resolved
    pub fn traverse(&self, path: &NodePath) -> Result<Option<EventTarget>, PathError> {
        let segments = match path {
            NodePath::Null => return Ok(None),
            NodePath::Window => return Ok(Some(EventTarget::Window)),
            NodePath::Nodes(segments) => segments,
        };

        let mut remaining = segments.iter().rev();
        let Some(outermost) = remaining.next() else {
            return Ok(Some(EventTarget::Document));
        };

        let mut node = match outermost {
            PathSegment::Head => self.head(),
            PathSegment::Body => self.body(),
            PathSegment::Index(index) => self
                .child_at(self.root(), *index)
                .ok_or(PathError::MissingChild { index: *index })?,
        };

        for segment in remaining {
            node = match segment {
                PathSegment::Index(index) => self
                    .child_at(node, *index)
                    .ok_or(PathError::MissingChild { index: *index })?,
                marker => return Err(PathError::MisplacedMarker(*marker)),
            };
        }

        Ok(Some(EventTarget::Element(node)))
    }

    /// Resolve a serialized path value
    ///
    /// # Errors
    ///
    /// Returns error if the value is not a path or does not resolve
    pub fn traverse_value(&self, value: &Value) -> Result<Option<EventTarget>, PathError> {
        let path = NodePath::try_from(value.clone())?;
        self.traverse(&path)
    }
}
