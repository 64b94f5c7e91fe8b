//! Built-in interceptors, one per source of non-determinism.

pub mod create_event;
pub mod date;
pub mod dom;
pub mod page_load;
pub mod random;
pub mod storage;
pub mod timers;
pub mod window;
pub mod xhr;

pub use create_event::CreateEventPlugin;
pub use date::DatePlugin;
pub use dom::DomPlugin;
pub use page_load::PageLoadPlugin;
pub use random::RandomPlugin;
pub use storage::StoragePlugin;
pub use timers::{TimerKind, TimerPlugin};
pub use window::WindowPlugin;
pub use xhr::XhrPlugin;
