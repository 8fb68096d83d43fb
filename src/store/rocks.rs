//! Durable record store on RocksDB.
//!
//! Records are JSON values under prefixed keys. A round's participants are
//! found through an index key per membership so a round snapshot is one
//! prefix scan. Read-modify-write sequences are serialized by a write mutex
//! and land in a single `WriteBatch`.

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
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

const ROUND_PREFIX: &str = "rounds/";
const PARTICIPANT_PREFIX: &str = "participants/";
const MEMBERSHIP_PREFIX: &str = "round_members/";
const OPEN_ROUND_KEY: &[u8] = b"meta/open_round";

fn round_key(id: RoundId) -> Vec<u8> {
    format!("{}{}", ROUND_PREFIX, id).into_bytes()
}

fn participant_key(id: ParticipantId) -> Vec<u8> {
    format!("{}{}", PARTICIPANT_PREFIX, id).into_bytes()
}

fn membership_prefix(round_id: RoundId) -> Vec<u8> {
    format!("{}{}/", MEMBERSHIP_PREFIX, round_id).into_bytes()
}

fn membership_key(round_id: RoundId, participant_id: ParticipantId) -> Vec<u8> {
    format!("{}{}/{}", MEMBERSHIP_PREFIX, round_id, participant_id).into_bytes()
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Backend(format!("encode failed: {}", e)))
}

#[derive(Clone)]
pub struct RocksRecordStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksRecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Backend("rocks store write lock poisoned".to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Keys under `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    fn load_round(&self, id: RoundId) -> StoreResult<Option<Round>> {
        self.get_json(&round_key(id))
    }

    fn load_participant(&self, id: ParticipantId) -> StoreResult<Option<Participant>> {
        self.get_json(&participant_key(id))
    }

    fn load_participants(&self, round_id: RoundId) -> StoreResult<Vec<Participant>> {
        let prefix = membership_prefix(round_id);
        let mut participants = Vec::new();
        for (key, _) in self.scan_prefix(&prefix)? {
            let id_str = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| StoreError::Corrupted(format!("membership key: {}", e)))?;
            let id: ParticipantId = id_str
                .parse()
                .map_err(|e| StoreError::Corrupted(format!("membership key {}: {}", id_str, e)))?;
            match self.load_participant(id)? {
                Some(participant) => participants.push(participant),
                None => tracing::warn!(%round_id, participant_id = %id, "dangling membership index entry"),
            }
        }
        participants.sort_by(queue_order);
        Ok(participants)
    }

    fn load_snapshot(&self, round_id: RoundId) -> StoreResult<Option<RoundSnapshot>> {
        let Some(round) = self.load_round(round_id)? else {
            return Ok(None);
        };
        let participants = self.load_participants(round_id)?;
        Ok(Some(RoundSnapshot { round, participants }))
    }

    fn open_round_id(&self) -> StoreResult<Option<RoundId>> {
        let Some(bytes) = self.db.get(OPEN_ROUND_KEY)? else {
            return Ok(None);
        };
        let id_str = std::str::from_utf8(&bytes)
            .map_err(|e| StoreError::Corrupted(format!("open round marker: {}", e)))?;
        id_str
            .parse()
            .map(Some)
            .map_err(|e| StoreError::Corrupted(format!("open round marker {}: {}", id_str, e)))
    }

    fn open_round(&self) -> StoreResult<Option<Round>> {
        let Some(id) = self.open_round_id()? else {
            return Ok(None);
        };
        Ok(self.load_round(id)?.filter(|round| round.is_open()))
    }

    /// Stage a round update into `batch`, clearing the open marker on completion
    fn stage_round_update(
        &self,
        batch: &mut WriteBatch,
        id: RoundId,
        update: &RoundUpdate,
    ) -> StoreResult<Round> {
        let mut round = self
            .load_round(id)?
            .ok_or_else(|| StoreError::not_found("round", id))?;
        update.apply(&mut round)?;
        batch.put(round_key(id), encode(&round)?);
        if round.status == RoundStatus::Completed && self.open_round_id()? == Some(id) {
            batch.delete(OPEN_ROUND_KEY);
        }
        Ok(round)
    }

    /// Stage winner flags for `round`, which must already carry `winning_number`
    fn stage_winners(
        &self,
        batch: &mut WriteBatch,
        round: &Round,
        participants: &mut [Participant],
        winning_number: u8,
    ) -> StoreResult<usize> {
        if !round.is_completed() || round.winning_number != Some(winning_number) {
            return Err(StoreError::Constraint(format!(
                "round {} is not completed with winning number {}",
                round.id, winning_number
            )));
        }

        let mut marked = 0;
        for participant in participants.iter_mut() {
            if participant.is_active() && participant.chosen_number == Some(winning_number) {
                participant.is_winner = true;
                batch.put(participant_key(participant.id), encode(participant)?);
                marked += 1;
            }
        }
        Ok(marked)
    }
}

#[async_trait]
impl RecordStore for RocksRecordStore {
    async fn find_open_round(&self) -> StoreResult<Option<RoundSnapshot>> {
        match self.open_round()? {
            Some(round) => self.load_snapshot(round.id),
            None => Ok(None),
        }
    }

    async fn find_round(&self, id: RoundId) -> StoreResult<Option<RoundSnapshot>> {
        self.load_snapshot(id)
    }

    async fn create_round(&self, new_round: NewRound) -> StoreResult<Round> {
        let _guard = self.lock()?;
        if self.open_round()?.is_some() {
            return Err(StoreError::OpenRoundExists);
        }

        let round = new_round.into_round(RoundId::new());
        let mut batch = WriteBatch::default();
        batch.put(round_key(round.id), encode(&round)?);
        batch.put(OPEN_ROUND_KEY, round.id.to_string().as_bytes());
        self.db.write(batch)?;
        Ok(round)
    }

    async fn create_participant(&self, new_participant: NewParticipant) -> StoreResult<Participant> {
        let _guard = self.lock()?;
        match self.load_round(new_participant.round_id)? {
            Some(round) if round.is_open() => {}
            Some(round) => return Err(StoreError::StatusConflict(round.id)),
            None => return Err(StoreError::not_found("round", new_participant.round_id)),
        }

        let participant = new_participant.into_participant(ParticipantId::new());
        let mut batch = WriteBatch::default();
        batch.put(participant_key(participant.id), encode(&participant)?);
        batch.put(membership_key(participant.round_id, participant.id), b"");
        self.db.write(batch)?;
        Ok(participant)
    }

    async fn delete_participant(&self, id: ParticipantId) -> StoreResult<()> {
        let _guard = self.lock()?;
        let participant = self
            .load_participant(id)?
            .ok_or_else(|| StoreError::not_found("participant", id))?;

        let mut batch = WriteBatch::default();
        batch.delete(participant_key(id));
        batch.delete(membership_key(participant.round_id, id));
        self.db.write(batch)?;
        Ok(())
    }

    async fn update_participant(
        &self,
        id: ParticipantId,
        update: ParticipantUpdate,
    ) -> StoreResult<Participant> {
        let _guard = self.lock()?;
        let mut participant = self
            .load_participant(id)?
            .ok_or_else(|| StoreError::not_found("participant", id))?;
        update.apply(&mut participant)?;
        self.db.put(participant_key(id), encode(&participant)?)?;
        Ok(participant)
    }

    async fn update_round(&self, id: RoundId, update: RoundUpdate) -> StoreResult<Round> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let round = self.stage_round_update(&mut batch, id, &update)?;
        self.db.write(batch)?;
        Ok(round)
    }

    async fn bulk_mark_winners(&self, round_id: RoundId, winning_number: u8) -> StoreResult<usize> {
        let _guard = self.lock()?;
        let mut snapshot = self
            .load_snapshot(round_id)?
            .ok_or_else(|| StoreError::not_found("round", round_id))?;
        let mut batch = WriteBatch::default();
        let marked = self.stage_winners(
            &mut batch,
            &snapshot.round,
            &mut snapshot.participants,
            winning_number,
        )?;
        self.db.write(batch)?;
        Ok(marked)
    }

    async fn find_queued_participants(&self, round_id: RoundId) -> StoreResult<Vec<Participant>> {
        Ok(self
            .load_participants(round_id)?
            .into_iter()
            .filter(|p| p.in_queue)
            .collect())
    }

    async fn completed_rounds(&self, query: RoundQuery) -> StoreResult<Vec<RoundSnapshot>> {
        let mut rounds = Vec::new();
        for (_, value) in self.scan_prefix(ROUND_PREFIX.as_bytes())? {
            let round: Round = serde_json::from_slice(&value)?;
            if round.is_completed() && query.matches(&round) {
                let participants = self.load_participants(round.id)?;
                rounds.push(RoundSnapshot { round, participants });
            }
        }
        rounds.sort_by(|a, b| b.round.started_at.cmp(&a.round.started_at));
        Ok(rounds)
    }

    async fn complete_round(&self, id: RoundId, winning_number: u8) -> StoreResult<RoundSnapshot> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        let round = self.stage_round_update(&mut batch, id, &RoundUpdate::complete(winning_number))?;
        let mut participants = self.load_participants(id)?;
        self.stage_winners(&mut batch, &round, &mut participants, winning_number)?;
        self.db.write(batch)?;
        Ok(RoundSnapshot { round, participants })
    }

    async fn leave_participant(&self, id: ParticipantId) -> StoreResult<LeaveOutcome> {
        let _guard = self.lock()?;
        let left = self
            .load_participant(id)?
            .ok_or_else(|| StoreError::not_found("participant", id))?;

        let mut batch = WriteBatch::default();
        batch.delete(participant_key(id));
        batch.delete(membership_key(left.round_id, id));

        let promoted = if left.is_active() {
            let members = self.load_participants(left.round_id)?;
            let promoted = QueueManager::new().promote_next(&members)?;
            if let Some(ref next) = promoted {
                batch.put(participant_key(next.id), encode(next)?);
            }
            promoted
        } else {
            None
        };

        self.db.write(batch)?;
        Ok(LeaveOutcome { left, promoted })
    }
}
