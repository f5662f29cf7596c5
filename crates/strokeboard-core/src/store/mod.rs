//! The remote stroke store as seen from the engine.
//!
//! Writes are fire-and-forget: their effect is only ever observed through the
//! insert/update/delete events the store later delivers.

mod memory;
mod outbound;
mod table;

pub use memory::MemoryStore;
pub use outbound::OutboundQueue;
pub use table::{DeletePolicy, StrokeTable, TableError, TableResult};

use crate::stroke::{StrokeDraft, StrokeId};

/// Write side of the authoritative stroke store.
pub trait StrokeStore {
    /// Ask the store to create a stroke. The result arrives as an insert event.
    fn submit_create(&mut self, draft: &StrokeDraft);

    /// Ask the store to delete a stroke. The result arrives as a delete event.
    fn submit_delete(&mut self, id: StrokeId);
}
