//! Seed documents for bootstrapping a story world from JSON.
//!
//! A seed file lists players, NPCs and inventories:
//!
//! ```json
//! {
//!   "players": [{"playerId": "p1", "name": "Pat", "location": "home"}],
//!   "npcs": [{"npcId": "npc1", "name": "Mara", "personality": ["proud"]}],
//!   "inventories": [{"playerId": "p1", "items": [{"name": "coin", "amount": 3}]}]
//! }
//! ```
//!
//! Players and NPCs that already exist are left untouched; inventories are
//! upserted.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::story::errors::StoryError;
use crate::story::storage::StoryStore;
use crate::story::types::{InventoryRecord, NpcRecord, PlayerRecord};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeedDocument {
    pub players: Vec<PlayerRecord>,
    pub npcs: Vec<NpcRecord>,
    pub inventories: Vec<InventoryRecord>,
}

/// What a seed run actually wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub players: usize,
    pub npcs: usize,
    pub inventories: usize,
    pub skipped: usize,
}

pub fn load_seed_from_json<P: AsRef<Path>>(path: P) -> Result<SeedDocument, StoryError> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn apply_seed(store: &StoryStore, seed: SeedDocument) -> Result<SeedReport, StoryError> {
    let mut report = SeedReport::default();

    for player in seed.players {
        let id = player.player_id.clone();
        match store.create_player(player) {
            Ok(_) => report.players += 1,
            Err(StoryError::AlreadyExists(_)) => {
                warn!("seed: player {} already exists, skipping", id);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for npc in seed.npcs {
        let id = npc.npc_id.clone();
        match store.create_npc(npc) {
            Ok(_) => report.npcs += 1,
            Err(StoryError::AlreadyExists(_)) => {
                warn!("seed: npc {} already exists, skipping", id);
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for inventory in seed.inventories {
        store.put_inventory(inventory)?;
        report.inventories += 1;
    }

    info!(
        "seed applied: {} player(s), {} npc(s), {} inventory(ies), {} skipped",
        report.players, report.npcs, report.inventories, report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::storage::StoryStoreBuilder;
    use tempfile::TempDir;

    const SEED: &str = r#"{
        "players": [{"playerId": "p1", "name": "Pat", "location": "home", "stats": {"money": 12}}],
        "npcs": [{"npcId": "npc1", "name": "Mara", "location": "bakery",
                  "personality": ["proud"], "attitudeTowardPlayer": "friendly",
                  "relationships": [{"targetId": "p1", "targetType": "player",
                                     "publicAttitude": "warm", "privateAttitude": "envious"}]}],
        "inventories": [{"playerId": "p1", "items": [{"name": "coin", "amount": 3}]}]
    }"#;

    #[test]
    fn seed_creates_records_once() {
        let dir = TempDir::new().expect("tempdir");
        let store = StoryStoreBuilder::new(dir.path().join("db")).open().expect("store");
        let path = dir.path().join("seed.json");
        fs::write(&path, SEED).expect("write seed");

        let first = apply_seed(&store, load_seed_from_json(&path).expect("load")).expect("apply");
        assert_eq!(
            first,
            SeedReport {
                players: 1,
                npcs: 1,
                inventories: 1,
                skipped: 0
            }
        );
        assert_eq!(store.get_player("p1").expect("player").stats.money, 12);
        let npc = store.get_npc("npc1").expect("npc");
        assert_eq!(npc.relationships[0].visible_attitude(), Some("warm"));

        let second = apply_seed(&store, load_seed_from_json(&path).expect("load")).expect("apply");
        assert_eq!(second.skipped, 2);
        assert_eq!(second.inventories, 1);
    }
}
