use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use sled::IVec;

use crate::story::errors::StoryError;
use crate::story::types::{
    InventoryRecord, NpcEventLog, NpcMemory, NpcRecord, PlayerEventLog, PlayerRecord,
    EVENT_LOG_SCHEMA_VERSION, INVENTORY_SCHEMA_VERSION, NPC_SCHEMA_VERSION, PLAYER_SCHEMA_VERSION,
};

const TREE_PRIMARY: &str = "lifesim";
const TREE_PLAYER_LOGS: &str = "lifesim_player_logs";
const TREE_NPC_LOGS: &str = "lifesim_npc_logs";

/// Map a timestamp onto an unsigned value whose decimal rendering sorts the
/// same way the instants do, including instants before the epoch.
fn ordered_timestamp(ts: &DateTime<Utc>) -> u64 {
    (ts.timestamp_micros() as u64) ^ (1u64 << 63)
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct StoryStoreBuilder {
    path: PathBuf,
}

impl StoryStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<StoryStore, StoryError> {
        StoryStore::open(self.path)
    }
}

/// Sled-backed persistence for players, NPCs, inventories and both event logs.
pub struct StoryStore {
    db: sled::Db,
    primary: sled::Tree,
    player_logs: sled::Tree,
    npc_logs: sled::Tree,
}

impl StoryStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoryError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let primary = db.open_tree(TREE_PRIMARY)?;
        let player_logs = db.open_tree(TREE_PLAYER_LOGS)?;
        let npc_logs = db.open_tree(TREE_NPC_LOGS)?;
        Ok(Self {
            db,
            primary,
            player_logs,
            npc_logs,
        })
    }

    fn player_key(player_id: &str) -> Vec<u8> {
        format!("players:{}", player_id).into_bytes()
    }

    fn npc_key(npc_id: &str) -> Vec<u8> {
        format!("npcs:{}", npc_id).into_bytes()
    }

    fn inventory_key(player_id: &str) -> Vec<u8> {
        format!("inventory:{}", player_id).into_bytes()
    }

    fn log_prefix(owner_id: &str) -> String {
        format!("{}:", owner_id)
    }

    /// Log keys sort by owner, then timestamp, then insertion sequence, so a
    /// reverse prefix scan yields the newest entries first.
    fn log_key(&self, owner_id: &str, timestamp: &DateTime<Utc>) -> Result<Vec<u8>, StoryError> {
        let seq = self.db.generate_id()?;
        Ok(format!(
            "{}{:020}:{:020}",
            Self::log_prefix(owner_id),
            ordered_timestamp(timestamp),
            seq
        )
        .into_bytes())
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoryError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoryError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    fn check_schema(entity: &'static str, expected: u8, found: u8) -> Result<(), StoryError> {
        if expected != found {
            return Err(StoryError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn require_id(kind: &str, id: &str) -> Result<(), StoryError> {
        if id.trim().is_empty() {
            return Err(StoryError::Validation(format!("{} required", kind)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Create a new player. Fails when the id is empty or already taken.
    pub fn create_player(&self, mut player: PlayerRecord) -> Result<PlayerRecord, StoryError> {
        Self::require_id("playerId", &player.player_id)?;
        player.schema_version = PLAYER_SCHEMA_VERSION;
        let key = Self::player_key(&player.player_id);
        let bytes = Self::serialize(&player)?;
        let swapped = self
            .primary
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?;
        if swapped.is_err() {
            return Err(StoryError::AlreadyExists(format!(
                "player: {}",
                player.player_id
            )));
        }
        self.primary.flush()?;
        Ok(player)
    }

    /// Insert or update a player record.
    pub fn put_player(&self, mut player: PlayerRecord) -> Result<PlayerRecord, StoryError> {
        Self::require_id("playerId", &player.player_id)?;
        player.schema_version = PLAYER_SCHEMA_VERSION;
        player.touch();
        let key = Self::player_key(&player.player_id);
        let bytes = Self::serialize(&player)?;
        self.primary.insert(key, bytes)?;
        self.primary.flush()?;
        Ok(player)
    }

    /// Fetch a player if present.
    pub fn find_player(&self, player_id: &str) -> Result<Option<PlayerRecord>, StoryError> {
        let Some(bytes) = self.primary.get(Self::player_key(player_id))? else {
            return Ok(None);
        };
        let record: PlayerRecord = Self::deserialize(&bytes)?;
        Self::check_schema("player", PLAYER_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    /// Fetch a player record by id.
    pub fn get_player(&self, player_id: &str) -> Result<PlayerRecord, StoryError> {
        self.find_player(player_id)?
            .ok_or_else(|| StoryError::NotFound(format!("player: {}", player_id)))
    }

    pub fn player_exists(&self, player_id: &str) -> Result<bool, StoryError> {
        Ok(self.primary.contains_key(Self::player_key(player_id))?)
    }

    /// List all player ids currently stored.
    pub fn list_player_ids(&self) -> Result<Vec<String>, StoryError> {
        let mut ids = Vec::new();
        for entry in self.primary.scan_prefix(b"players:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text.strip_prefix("players:") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // NPCs
    // ------------------------------------------------------------------

    /// Create a new NPC. Fails when the id is empty or already taken.
    pub fn create_npc(&self, mut npc: NpcRecord) -> Result<NpcRecord, StoryError> {
        Self::require_id("npcId", &npc.npc_id)?;
        npc.schema_version = NPC_SCHEMA_VERSION;
        let key = Self::npc_key(&npc.npc_id);
        let bytes = Self::serialize(&npc)?;
        let swapped = self
            .primary
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?;
        if swapped.is_err() {
            return Err(StoryError::AlreadyExists(format!("npc: {}", npc.npc_id)));
        }
        self.primary.flush()?;
        Ok(npc)
    }

    /// Insert or replace a whole NPC document (last writer wins). Field
    /// updates on a live NPC go through [`StoryStore::modify_npc`] instead.
    pub fn put_npc(&self, mut npc: NpcRecord) -> Result<NpcRecord, StoryError> {
        Self::require_id("npcId", &npc.npc_id)?;
        npc.schema_version = NPC_SCHEMA_VERSION;
        let key = Self::npc_key(&npc.npc_id);
        let bytes = Self::serialize(&npc)?;
        self.primary.insert(key, bytes)?;
        self.primary.flush()?;
        Ok(npc)
    }

    fn decode_npc(bytes: &[u8]) -> Result<NpcRecord, StoryError> {
        let record: NpcRecord = Self::deserialize(bytes)?;
        Self::check_schema("npc", NPC_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    pub fn find_npc(&self, npc_id: &str) -> Result<Option<NpcRecord>, StoryError> {
        match self.primary.get(Self::npc_key(npc_id))? {
            Some(bytes) => Ok(Some(Self::decode_npc(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_npc(&self, npc_id: &str) -> Result<NpcRecord, StoryError> {
        self.find_npc(npc_id)?
            .ok_or_else(|| StoryError::NotFound(format!("npc: {}", npc_id)))
    }

    pub fn npc_exists(&self, npc_id: &str) -> Result<bool, StoryError> {
        Ok(self.primary.contains_key(Self::npc_key(npc_id))?)
    }

    pub fn list_npc_ids(&self) -> Result<Vec<String>, StoryError> {
        let mut ids = Vec::new();
        for entry in self.primary.scan_prefix(b"npcs:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text.strip_prefix("npcs:") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Load at most `cap` NPCs in id order.
    pub fn list_npcs(&self, cap: usize) -> Result<Vec<NpcRecord>, StoryError> {
        self.primary
            .scan_prefix(b"npcs:")
            .take(cap)
            .map(|entry| {
                entry
                    .map_err(StoryError::from)
                    .and_then(|(_key, value)| Self::decode_npc(&value))
            })
            .collect()
    }

    /// Administrative deletion. Returns whether an NPC was removed.
    pub fn delete_npc(&self, npc_id: &str) -> Result<bool, StoryError> {
        let removed = self.primary.remove(Self::npc_key(npc_id))?;
        self.primary.flush()?;
        Ok(removed.is_some())
    }

    /// Apply `change` to the stored NPC as one compare-and-swap.
    ///
    /// The closure may run more than once when another writer races it, and
    /// always sees the latest stored document. Returns `None` when the NPC is
    /// absent; the store is left untouched.
    fn update_npc_in_place<F>(
        &self,
        npc_id: &str,
        mut change: F,
    ) -> Result<Option<NpcRecord>, StoryError>
    where
        F: FnMut(&mut NpcRecord),
    {
        let key = Self::npc_key(npc_id);
        let mut outcome: Result<Option<NpcRecord>, StoryError> = Ok(None);
        self.primary.update_and_fetch(&key, |current| {
            let Some(bytes) = current else {
                outcome = Ok(None);
                return None;
            };
            let encoded = Self::decode_npc(bytes).and_then(|mut npc| {
                change(&mut npc);
                let updated = Self::serialize(&npc)?;
                Ok((npc, updated))
            });
            match encoded {
                Ok((npc, updated)) => {
                    outcome = Ok(Some(npc));
                    Some(updated)
                }
                Err(e) => {
                    // Leave the stored document as it was.
                    outcome = Err(e);
                    Some(bytes.to_vec())
                }
            }
        })?;
        let updated = outcome?;
        if updated.is_some() {
            self.primary.flush()?;
        }
        Ok(updated)
    }

    /// Change fields of an existing NPC without losing concurrent memory appends.
    pub fn modify_npc<F>(&self, npc_id: &str, change: F) -> Result<NpcRecord, StoryError>
    where
        F: FnMut(&mut NpcRecord),
    {
        self.update_npc_in_place(npc_id, change)?
            .ok_or_else(|| StoryError::NotFound(format!("npc: {}", npc_id)))
    }

    /// Append a memory to an NPC as a single atomic store operation.
    ///
    /// Returns `false` when the NPC does not exist; the store is left untouched.
    pub fn append_npc_memory(&self, npc_id: &str, memory: NpcMemory) -> Result<bool, StoryError> {
        let updated = self.update_npc_in_place(npc_id, |npc| npc.memories.push(memory.clone()))?;
        Ok(updated.is_some())
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &str, bytes: &[u8]) -> Result<(), StoryError> {
        self.primary.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    /// Replace a player's inventory wholesale.
    pub fn put_inventory(&self, mut inventory: InventoryRecord) -> Result<InventoryRecord, StoryError> {
        Self::require_id("playerId", &inventory.player_id)?;
        inventory.schema_version = INVENTORY_SCHEMA_VERSION;
        let bytes = Self::serialize(&inventory)?;
        self.primary
            .insert(Self::inventory_key(&inventory.player_id), bytes)?;
        self.primary.flush()?;
        Ok(inventory)
    }

    /// Fetch a player's inventory; an absent inventory reads as empty.
    pub fn get_inventory(&self, player_id: &str) -> Result<InventoryRecord, StoryError> {
        let Some(bytes) = self.primary.get(Self::inventory_key(player_id))? else {
            return Ok(InventoryRecord::empty(player_id));
        };
        let record: InventoryRecord = Self::deserialize(&bytes)?;
        Self::check_schema("inventory", INVENTORY_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Event logs
    // ------------------------------------------------------------------

    pub fn append_player_log(&self, mut log: PlayerEventLog) -> Result<PlayerEventLog, StoryError> {
        Self::require_id("playerId", &log.player_id)?;
        log.schema_version = EVENT_LOG_SCHEMA_VERSION;
        let key = self.log_key(&log.player_id, &log.timestamp)?;
        self.player_logs.insert(key, Self::serialize(&log)?)?;
        self.player_logs.flush()?;
        debug!("player log {} stored for {}", log.id, log.player_id);
        Ok(log)
    }

    pub fn append_npc_log(&self, mut log: NpcEventLog) -> Result<NpcEventLog, StoryError> {
        Self::require_id("npcId", &log.npc_id)?;
        log.schema_version = EVENT_LOG_SCHEMA_VERSION;
        let key = self.log_key(&log.npc_id, &log.timestamp)?;
        self.npc_logs.insert(key, Self::serialize(&log)?)?;
        self.npc_logs.flush()?;
        debug!("npc log {} stored for {}", log.id, log.npc_id);
        Ok(log)
    }

    /// Newest-first scan of one owner's log, filtered on the owner id so that
    /// ids sharing a prefix never bleed into each other.
    fn recent_logs<T, F>(
        tree: &sled::Tree,
        owner_id: &str,
        limit: usize,
        owned_by: F,
    ) -> Result<Vec<T>, StoryError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let prefix = Self::log_prefix(owner_id);
        let mut out = Vec::with_capacity(limit.min(64));
        for entry in tree.scan_prefix(prefix.as_bytes()).rev() {
            if out.len() >= limit {
                break;
            }
            let (_key, value): (IVec, IVec) = entry?;
            let record: T = Self::deserialize(&value)?;
            if owned_by(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// The `limit` most recent player log entries, newest first.
    pub fn recent_player_logs(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<PlayerEventLog>, StoryError> {
        Self::recent_logs(&self.player_logs, player_id, limit, |log: &PlayerEventLog| {
            log.player_id == player_id
        })
    }

    /// The `limit` most recent NPC log entries, newest first.
    pub fn recent_npc_logs(&self, npc_id: &str, limit: usize) -> Result<Vec<NpcEventLog>, StoryError> {
        Self::recent_logs(&self.npc_logs, npc_id, limit, |log: &NpcEventLog| {
            log.npc_id == npc_id
        })
    }

    pub fn count_player_logs(&self) -> usize {
        self.player_logs.len()
    }

    pub fn count_npc_logs(&self) -> usize {
        self.npc_logs.len()
    }
}
