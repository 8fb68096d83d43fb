//! Seat admission and FIFO promotion

use super::types::{Admission, Participant, ParticipantUpdate, RoundId, UserId};
use crate::errors::StoreResult;
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Queue order: earliest `joined_at` first, participant id breaks ties
pub fn queue_order(a: &Participant, b: &Participant) -> Ordering {
    a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id))
}

/// Enforces the active-seat capacity and FIFO promotion of the overflow
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueManager;

impl QueueManager {
    pub fn new() -> Self {
        Self
    }

    /// Active while a seat is free, queued otherwise. The caller persists the participant.
    pub fn admit(
        &self,
        round_id: RoundId,
        user_id: &UserId,
        active_count: usize,
        capacity: usize,
    ) -> Admission {
        let admission = if active_count < capacity {
            Admission::Active
        } else {
            Admission::Queued
        };
        trace!(%round_id, %user_id, active_count, capacity, ?admission, "admission decided");
        admission
    }

    /// The queued participant that gets the next free seat
    pub fn next_in_line<'a>(&self, queued: &'a [Participant]) -> Option<&'a Participant> {
        next_in_line(queued)
    }

    /// Flip the earliest queued participant among `participants` into an active seat.
    ///
    /// Returns the promoted record for the caller to persist in the same write
    /// that vacates the seat; `None` on an empty queue.
    pub fn promote_next<'a>(
        &self,
        participants: impl IntoIterator<Item = &'a Participant>,
    ) -> StoreResult<Option<Participant>> {
        let Some(next) = next_in_line(participants) else {
            debug!("queue empty, nobody to promote");
            return Ok(None);
        };

        let mut promoted = next.clone();
        ParticipantUpdate::promote().apply(&mut promoted)?;
        debug!(round_id = %promoted.round_id, user_id = %promoted.user_id, "promoted from queue");
        Ok(Some(promoted))
    }
}

/// Earliest-joined queued participant among `participants`
pub fn next_in_line<'a>(
    participants: impl IntoIterator<Item = &'a Participant>,
) -> Option<&'a Participant> {
    participants
        .into_iter()
        .filter(|p| p.in_queue)
        .min_by(|a, b| queue_order(a, b))
}
