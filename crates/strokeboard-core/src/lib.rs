//! Strokeboard Core Library
//!
//! Client-side reconciliation for a collaborative whiteboard whose strokes
//! live in a remote authoritative store. Local intent is submitted as remote
//! writes; the display, identity registry and undo/redo history only change
//! when the store confirms them.

pub mod arena;
pub mod capture;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod history;
pub mod ingest;
pub mod pending;
pub mod registry;
pub mod session;
pub mod store;
pub mod stroke;
pub mod sync;

pub use capture::StrokeCapture;
pub use config::{ClientConfig, ConfigError};
pub use display::StrokeDisplay;
pub use engine::ReconciliationEngine;
pub use error::{ReconcileError, ReconcileResult};
pub use history::{ActionKind, UndoAction, UndoRedoCoordinator};
pub use ingest::RemoteEvent;
pub use pending::PendingSlot;
pub use registry::{DisplayRegistry, Representation};
pub use session::BoardSession;
pub use store::{DeletePolicy, MemoryStore, OutboundQueue, StrokeStore, StrokeTable, TableError};
pub use stroke::{Board, BoardId, Point, Stroke, StrokeDraft, StrokeId};
pub use sync::{ClientMessage, ConnectionState, ServerMessage, SyncEvent, Transport};

#[cfg(not(target_arch = "wasm32"))]
pub use sync::NativeWebSocket;
