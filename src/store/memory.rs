//! In-memory record store
//!
//! Every operation runs inside one critical section over the tables, which
//! makes each call atomic and gives the uniqueness guarantee on open rounds.

use super::RecordStore;
use crate::{
    errors::{StoreError, StoreResult},
    game::{
        queue::{queue_order, QueueManager},
        types::{
            LeaveOutcome, NewParticipant, NewRound, Participant, ParticipantId, ParticipantUpdate, Round,
            RoundId, RoundQuery, RoundSnapshot, RoundStatus, RoundUpdate,
        },
    },
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Default)]
struct Tables {
    rounds: HashMap<RoundId, Round>,
    participants: HashMap<ParticipantId, Participant>,
    open_round: Option<RoundId>,
}

impl Tables {
    fn snapshot(&self, round_id: RoundId) -> Option<RoundSnapshot> {
        let round = self.rounds.get(&round_id)?.clone();
        let mut participants: Vec<Participant> = self
            .participants
            .values()
            .filter(|p| p.round_id == round_id)
            .cloned()
            .collect();
        participants.sort_by(queue_order);
        Some(RoundSnapshot { round, participants })
    }

    fn open_round(&self) -> Option<&Round> {
        self.open_round
            .and_then(|id| self.rounds.get(&id))
            .filter(|round| round.is_open())
    }

    fn apply_round_update(&mut self, id: RoundId, update: &RoundUpdate) -> StoreResult<Round> {
        let round = self
            .rounds
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("round", id))?;
        update.apply(round)?;
        let round = round.clone();
        if round.status == RoundStatus::Completed && self.open_round == Some(id) {
            self.open_round = None;
        }
        Ok(round)
    }

    /// The participant that takes the seat `leaver` vacates, already promoted
    fn successor(&self, leaver: &Participant) -> StoreResult<Option<Participant>> {
        if !leaver.is_active() {
            return Ok(None);
        }
        let round_members = self
            .participants
            .values()
            .filter(|p| p.round_id == leaver.round_id);
        QueueManager::new().promote_next(round_members)
    }

    fn mark_winners(&mut self, round_id: RoundId, winning_number: u8) -> StoreResult<usize> {
        match self.rounds.get(&round_id) {
            Some(round) if round.is_completed() && round.winning_number == Some(winning_number) => {}
            Some(_) => {
                return Err(StoreError::Constraint(format!(
                    "round {} is not completed with winning number {}",
                    round_id, winning_number
                )))
            }
            None => return Err(StoreError::not_found("round", round_id)),
        }

        let mut marked = 0;
        for participant in self.participants.values_mut() {
            if participant.round_id == round_id
                && participant.is_active()
                && participant.chosen_number == Some(winning_number)
            {
                participant.is_winner = true;
                marked += 1;
            }
        }
        Ok(marked)
    }
}

/// Record store held entirely in process memory
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_open_round(&self) -> StoreResult<Option<RoundSnapshot>> {
        let tables = self.read()?;
        Ok(tables
            .open_round()
            .map(|round| round.id)
            .and_then(|id| tables.snapshot(id)))
    }

    async fn find_round(&self, id: RoundId) -> StoreResult<Option<RoundSnapshot>> {
        Ok(self.read()?.snapshot(id))
    }

    async fn create_round(&self, new_round: NewRound) -> StoreResult<Round> {
        let mut tables = self.write()?;
        if tables.open_round().is_some() {
            return Err(StoreError::OpenRoundExists);
        }

        let round = new_round.into_round(RoundId::new());
        tables.rounds.insert(round.id, round.clone());
        tables.open_round = Some(round.id);
        Ok(round)
    }

    async fn create_participant(&self, new_participant: NewParticipant) -> StoreResult<Participant> {
        let mut tables = self.write()?;
        match tables.rounds.get(&new_participant.round_id) {
            Some(round) if round.is_open() => {}
            Some(round) => return Err(StoreError::StatusConflict(round.id)),
            None => return Err(StoreError::not_found("round", new_participant.round_id)),
        }

        let participant = new_participant.into_participant(ParticipantId::new());
        tables
            .participants
            .insert(participant.id, participant.clone());
        Ok(participant)
    }

    async fn delete_participant(&self, id: ParticipantId) -> StoreResult<()> {
        self.write()?
            .participants
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("participant", id))
    }

    async fn update_participant(
        &self,
        id: ParticipantId,
        update: ParticipantUpdate,
    ) -> StoreResult<Participant> {
        let mut tables = self.write()?;
        let participant = tables
            .participants
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("participant", id))?;
        update.apply(participant)?;
        Ok(participant.clone())
    }

    async fn update_round(&self, id: RoundId, update: RoundUpdate) -> StoreResult<Round> {
        self.write()?.apply_round_update(id, &update)
    }

    async fn bulk_mark_winners(&self, round_id: RoundId, winning_number: u8) -> StoreResult<usize> {
        self.write()?.mark_winners(round_id, winning_number)
    }

    async fn find_queued_participants(&self, round_id: RoundId) -> StoreResult<Vec<Participant>> {
        let tables = self.read()?;
        let mut queued: Vec<Participant> = tables
            .participants
            .values()
            .filter(|p| p.round_id == round_id && p.in_queue)
            .cloned()
            .collect();
        queued.sort_by(queue_order);
        Ok(queued)
    }

    async fn completed_rounds(&self, query: RoundQuery) -> StoreResult<Vec<RoundSnapshot>> {
        let tables = self.read()?;
        let mut rounds: Vec<RoundSnapshot> = tables
            .rounds
            .values()
            .filter(|round| round.is_completed() && query.matches(round))
            .filter_map(|round| tables.snapshot(round.id))
            .collect();
        rounds.sort_by(|a, b| b.round.started_at.cmp(&a.round.started_at));
        Ok(rounds)
    }

    async fn complete_round(&self, id: RoundId, winning_number: u8) -> StoreResult<RoundSnapshot> {
        let mut tables = self.write()?;
        tables.apply_round_update(id, &RoundUpdate::complete(winning_number))?;
        tables.mark_winners(id, winning_number)?;
        tables
            .snapshot(id)
            .ok_or_else(|| StoreError::not_found("round", id))
    }

    async fn leave_participant(&self, id: ParticipantId) -> StoreResult<LeaveOutcome> {
        let mut tables = self.write()?;
        let left = tables
            .participants
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("participant", id))?;
        let promoted = tables.successor(&left)?;

        tables.participants.remove(&id);
        if let Some(ref next) = promoted {
            tables.participants.insert(next.id, next.clone());
        }
        Ok(LeaveOutcome { left, promoted })
    }
}
