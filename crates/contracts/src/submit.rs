//! Submit trait - hand-off from batching to network submission

use crate::{ContractError, Payload};

/// One-way payload hand-off
///
/// Resolves once the payload is queued (or taken by a worker when the queue is
/// unbuffered). The caller never learns the HTTP outcome.
#[trait_variant::make(Submit: Send)]
pub trait LocalSubmit {
    /// Queue a payload for submission
    ///
    /// # Errors
    /// [`ContractError::SubmitQueueClosed`] when no worker is left
    async fn submit(&self, payload: Payload) -> Result<(), ContractError>;
}
