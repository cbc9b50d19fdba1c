//! Direct entity updates and the log-derived field synchronisation rules.
//!
//! A caller-supplied patch is always committed before a requested sync, so a
//! sync may overwrite a value the same call just set.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;
use crate::story::errors::StoryError;
use crate::story::storage::StoryStore;
use crate::story::types::{EventData, NpcRecord, PlayerRecord, Relationship};

/// Number of log entries fetched by each sync rule.
pub const SYNC_WINDOW: usize = 5;

/// Partial NPC update. Memories are append-only and cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NpcPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub personality: Option<Vec<String>>,
    pub mood: Option<String>,
    pub attitude_toward_player: Option<String>,
    pub conflict_level: Option<i64>,
    pub last_conflict_with_player: Option<DateTime<Utc>>,
    pub relationships: Option<Vec<Relationship>>,
    pub state: Option<EventData>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub bio: Option<String>,
}

impl NpcPatch {
    fn apply(self, npc: &mut NpcRecord) {
        if let Some(v) = self.name {
            npc.name = v;
        }
        if let Some(v) = self.location {
            npc.location = v;
        }
        if let Some(v) = self.personality {
            npc.personality = v;
        }
        if let Some(v) = self.mood {
            npc.mood = Some(v);
        }
        if let Some(v) = self.attitude_toward_player {
            npc.attitude_toward_player = Some(v);
        }
        if let Some(v) = self.conflict_level {
            npc.conflict_level = v;
        }
        if let Some(v) = self.last_conflict_with_player {
            npc.last_conflict_with_player = Some(v);
        }
        if let Some(v) = self.relationships {
            npc.relationships = v;
        }
        if let Some(v) = self.state {
            npc.state = v;
        }
        if let Some(v) = self.description {
            npc.description = Some(v);
        }
        if let Some(v) = self.details {
            npc.details = Some(v);
        }
        if let Some(v) = self.bio {
            npc.bio = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    /// Direct overwrite of `stats.money`.
    pub money: Option<i64>,
}

impl PlayerPatch {
    fn apply(self, player: &mut PlayerRecord) {
        if let Some(v) = self.name {
            player.name = v;
        }
        if let Some(v) = self.location {
            player.location = v;
        }
        if let Some(v) = self.money {
            player.stats.money = v;
        }
    }
}

/// Apply `patch` to an NPC, then optionally re-derive its mood from the log.
pub fn update_npc(
    store: &StoryStore,
    npc_id: &str,
    patch: NpcPatch,
    sync_from_logs: bool,
) -> Result<NpcRecord, StoryError> {
    let npc = store.modify_npc(npc_id, |npc| patch.clone().apply(npc))?;
    if sync_from_logs {
        return sync_npc_mood(store, npc_id);
    }
    Ok(npc)
}

/// Apply `patch` to a player, then optionally fold in the latest money delta.
pub fn update_player(
    store: &StoryStore,
    player_id: &str,
    patch: PlayerPatch,
    sync_from_logs: bool,
) -> Result<PlayerRecord, StoryError> {
    let mut player = store.get_player(player_id)?;
    patch.apply(&mut player);
    let player = store.put_player(player)?;
    if sync_from_logs {
        return sync_player_money(store, player_id);
    }
    Ok(player)
}

/// Set the NPC's mood to the feeling of its most recent log entry. With no
/// log entries the mood is left alone.
pub fn sync_npc_mood(store: &StoryStore, npc_id: &str) -> Result<NpcRecord, StoryError> {
    let logs = store.recent_npc_logs(npc_id, SYNC_WINDOW)?;
    let Some(latest) = logs.first() else {
        return store.get_npc(npc_id);
    };
    let npc = store.modify_npc(npc_id, |npc| npc.mood = latest.feeling.clone())?;
    info!(
        "npc {} mood synced to {:?} from log {}",
        npc_id,
        npc.mood.as_deref().map(escape_log),
        latest.id
    );
    Ok(npc)
}

/// Add the most recent log entry's `moneyChange` to the player's money.
///
/// Only that single entry is consulted, and each entry is applied at most
/// once: `stats.last_money_sync` remembers the entry already folded in.
pub fn sync_player_money(store: &StoryStore, player_id: &str) -> Result<PlayerRecord, StoryError> {
    let mut player = store.get_player(player_id)?;
    let logs = store.recent_player_logs(player_id, SYNC_WINDOW)?;
    let Some(latest) = logs.first() else {
        return Ok(player);
    };
    if player.stats.last_money_sync.as_deref() == Some(latest.id.as_str()) {
        return Ok(player);
    }
    let Some(delta) = latest.data.money_change().filter(|d| *d != 0) else {
        return Ok(player);
    };
    player.stats.money = player.stats.money.saturating_add(delta);
    player.stats.last_money_sync = Some(latest.id.clone());
    info!(
        "player {} money {:+} from log {} (now {})",
        player_id, delta, latest.id, player.stats.money
    );
    store.put_player(player)
}
