//! Store writes queued as wire messages.

use super::StrokeStore;
use crate::stroke::{StrokeDraft, StrokeId};
use crate::sync::ClientMessage;

/// Turns store writes into serialized [`ClientMessage`]s waiting to be sent.
///
/// The session drains the queue into its transport after every user action
/// and every poll.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    outgoing: Vec<String>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary client message.
    pub fn push(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to encode {:?}: {}", msg, e),
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Put back messages that could not be sent, ahead of anything queued since.
    pub fn requeue_front(&mut self, mut msgs: Vec<String>) {
        msgs.append(&mut self.outgoing);
        self.outgoing = msgs;
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}

impl StrokeStore for OutboundQueue {
    fn submit_create(&mut self, draft: &StrokeDraft) {
        self.push(&ClientMessage::AddStroke {
            board_id: draft.board_id,
            color: draft.color.clone(),
            thickness: draft.thickness,
            points: draft.points.clone(),
        });
    }

    fn submit_delete(&mut self, id: StrokeId) {
        self.push(&ClientMessage::DeleteStroke { stroke_id: id });
    }
}
