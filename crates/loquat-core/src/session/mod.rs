//! Chat session state
//!
//! - `core`: the [`ChatSession`] context object and its snapshots
//! - `streaming`: assistant stream state machine
//! - `history`: paginated history loading
//! - `settings`: per-chat toggles
//! - `registry`: chat list with favorites

mod core;
pub mod events;
pub mod history;
pub mod registry;
mod settings;
pub mod state;
pub mod streaming;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::core::ChatSession;
pub use events::SessionEvent;
pub use history::PageLoad;
pub use registry::{ChatRegistry, ChatSummary, GroupedChats};
pub use state::{PaginationCursor, StreamStatus};
pub use streaming::StreamHandle;
