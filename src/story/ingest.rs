//! Event ingestion: single events, batches, and the direct log writes.
//!
//! Every NPC-directed write lands twice: once in the NPC event log and once
//! as a memory on the NPC document. The log is the durable record; when the
//! NPC document is missing only the log is written.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;
use crate::story::errors::StoryError;
use crate::story::storage::StoryStore;
use crate::story::timedelta::resolve_time;
use crate::story::types::{EventData, NpcEventLog, NpcMemory, PlayerEventLog, INGESTED_EVENT_TYPE};

/// Number of entries returned by [`player_history`].
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Player,
    Npc,
    /// Any other value; skipped by batch ingestion.
    #[serde(other)]
    Unknown,
}

/// One narrative event submitted for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub entity_type: EntityType,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
    /// ISO-8601 duration applied to "now" to stamp the entry.
    #[serde(default)]
    pub time_delta: Option<String>,
    #[serde(default)]
    pub requires_player_input: Option<bool>,
    #[serde(default)]
    pub next_trigger: Option<String>,
    #[serde(default)]
    pub urgency: Option<i64>,
}

impl EventDescriptor {
    pub fn player(player_id: &str, summary: &str) -> Self {
        Self::new(EntityType::Player, player_id, summary)
    }

    pub fn npc(npc_id: &str, summary: &str) -> Self {
        Self::new(EntityType::Npc, npc_id, summary)
    }

    fn new(entity_type: EntityType, entity_id: &str, summary: &str) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            summary: summary.to_string(),
            feeling: None,
            data: EventData::default(),
            time_delta: None,
            requires_player_input: None,
            next_trigger: None,
            urgency: None,
        }
    }

    pub fn with_feeling(mut self, feeling: &str) -> Self {
        self.feeling = Some(feeling.to_string());
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }

    pub fn with_time_delta(mut self, token: &str) -> Self {
        self.time_delta = Some(token.to_string());
        self
    }

    pub fn with_urgency(mut self, urgency: i64) -> Self {
        self.urgency = Some(urgency);
        self
    }
}

/// A log entry created by ingestion.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "entityType", rename_all = "lowercase")]
pub enum LoggedEvent {
    Player(PlayerEventLog),
    Npc(NpcEventLog),
}

impl LoggedEvent {
    pub fn summary(&self) -> &str {
        match self {
            LoggedEvent::Player(log) => &log.summary,
            LoggedEvent::Npc(log) => &log.summary,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LoggedEvent::Player(log) => log.timestamp,
            LoggedEvent::Npc(log) => log.timestamp,
        }
    }
}

/// Direct player log write. `event_type` is caller-chosen here, unlike ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEventInput {
    #[serde(default)]
    pub player_id: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
    #[serde(default)]
    pub requires_player_input: Option<bool>,
    #[serde(default)]
    pub next_trigger: Option<String>,
    #[serde(default)]
    pub urgency: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NpcEventInput {
    #[serde(default)]
    pub npc_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub feeling: Option<String>,
    #[serde(default)]
    pub data: EventData,
}

fn require(field: &str, value: &str) -> Result<(), StoryError> {
    if value.trim().is_empty() {
        return Err(StoryError::Validation(format!("{} required", field)));
    }
    Ok(())
}

fn write_player_log(store: &StoryStore, log: PlayerEventLog) -> Result<PlayerEventLog, StoryError> {
    let log = store.append_player_log(log)?;
    debug!(
        "logged player event for {}: {}",
        log.player_id,
        escape_log(&log.summary)
    );
    Ok(log)
}

/// Write the NPC log entry, then mirror it into the NPC's memories.
fn write_npc_log(store: &StoryStore, log: NpcEventLog) -> Result<NpcEventLog, StoryError> {
    let log = store.append_npc_log(log)?;
    let remembered = store.append_npc_memory(&log.npc_id, NpcMemory::from(&log))?;
    if remembered {
        debug!(
            "logged npc event for {}: {}",
            log.npc_id,
            escape_log(&log.summary)
        );
    } else {
        debug!(
            "logged npc event for unknown npc {}; memory not recorded",
            log.npc_id
        );
    }
    Ok(log)
}

/// Ingest one descriptor. `Ok(None)` means the entity type was not recognised.
fn ingest_at(
    store: &StoryStore,
    descriptor: &EventDescriptor,
    now: DateTime<Utc>,
) -> Result<Option<LoggedEvent>, StoryError> {
    if descriptor.entity_type == EntityType::Unknown {
        return Ok(None);
    }
    require("entityId", &descriptor.entity_id)?;
    require("summary", &descriptor.summary)?;
    let timestamp = resolve_time(now, descriptor.time_delta.as_deref());

    let logged = match descriptor.entity_type {
        EntityType::Player => {
            let mut log = PlayerEventLog::new(
                &descriptor.entity_id,
                INGESTED_EVENT_TYPE,
                &descriptor.summary,
                timestamp,
            )
            .with_data(descriptor.data.clone());
            log.feeling = descriptor.feeling.clone();
            log.requires_player_input = descriptor.requires_player_input;
            log.next_trigger = descriptor.next_trigger.clone();
            log.urgency = descriptor.urgency.unwrap_or(0);
            LoggedEvent::Player(write_player_log(store, log)?)
        }
        EntityType::Npc => {
            let mut log = NpcEventLog::new(&descriptor.entity_id, &descriptor.summary, timestamp)
                .with_data(descriptor.data.clone());
            log.feeling = descriptor.feeling.clone();
            LoggedEvent::Npc(write_npc_log(store, log)?)
        }
        EntityType::Unknown => return Ok(None),
    };
    Ok(Some(logged))
}

/// Ingest a single event stamped relative to `now`.
pub fn ingest_event(store: &StoryStore, descriptor: &EventDescriptor) -> Result<LoggedEvent, StoryError> {
    ingest_event_at(store, descriptor, Utc::now())
}

/// As [`ingest_event`] with an explicit base instant.
pub fn ingest_event_at(
    store: &StoryStore,
    descriptor: &EventDescriptor,
    now: DateTime<Utc>,
) -> Result<LoggedEvent, StoryError> {
    ingest_at(store, descriptor, now)?.ok_or_else(|| {
        StoryError::Validation("entityType must be \"player\" or \"npc\"".to_string())
    })
}

/// Ingest descriptors in order. Unrecognised entity types are skipped; the
/// first failing entry aborts the batch, leaving earlier entries written.
pub fn ingest_batch(
    store: &StoryStore,
    descriptors: &[EventDescriptor],
) -> Result<Vec<LoggedEvent>, StoryError> {
    ingest_batch_at(store, descriptors, Utc::now())
}

pub fn ingest_batch_at(
    store: &StoryStore,
    descriptors: &[EventDescriptor],
    now: DateTime<Utc>,
) -> Result<Vec<LoggedEvent>, StoryError> {
    let mut results = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        match ingest_at(store, descriptor, now)? {
            Some(logged) => results.push(logged),
            None => warn!(
                "skipping batch entry {} for {}: unrecognised entity type",
                index,
                escape_log(&descriptor.entity_id)
            ),
        }
    }
    Ok(results)
}

/// Write a player log entry stamped "now".
pub fn log_player_event(store: &StoryStore, input: PlayerEventInput) -> Result<PlayerEventLog, StoryError> {
    require("playerId", &input.player_id)?;
    require("type", &input.event_type)?;
    require("summary", &input.summary)?;
    let mut log = PlayerEventLog::new(&input.player_id, &input.event_type, &input.summary, Utc::now())
        .with_data(input.data);
    log.feeling = input.feeling;
    log.requires_player_input = input.requires_player_input;
    log.next_trigger = input.next_trigger;
    log.urgency = input.urgency.unwrap_or(0);
    write_player_log(store, log)
}

/// Write an NPC log entry stamped "now" and remember it on the NPC.
pub fn log_npc_event(store: &StoryStore, input: NpcEventInput) -> Result<NpcEventLog, StoryError> {
    require("npcId", &input.npc_id)?;
    require("summary", &input.summary)?;
    let mut log = NpcEventLog::new(&input.npc_id, &input.summary, Utc::now()).with_data(input.data);
    log.feeling = input.feeling;
    write_npc_log(store, log)
}

/// The most recent player log entries, newest first.
pub fn player_history(store: &StoryStore, player_id: &str) -> Result<Vec<PlayerEventLog>, StoryError> {
    store.recent_player_logs(player_id, HISTORY_LIMIT)
}
