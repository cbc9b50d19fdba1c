//! Test utilities & fixtures shared by the integration tests.

use lifesim::story::{NpcRecord, PlayerRecord, StoryStore, StoryStoreBuilder};
use tempfile::TempDir;

/// Open a throwaway store. Keep the `TempDir` alive for the test's duration.
#[allow(dead_code)]
pub fn setup_test_store() -> (StoryStore, TempDir) {
    let temp_dir = TempDir::new().expect("tempdir");
    let store = StoryStoreBuilder::new(temp_dir.path()).open().expect("store");
    (store, temp_dir)
}

/// A player standing somewhere, with no money.
#[allow(dead_code)]
pub fn seed_player(store: &StoryStore, player_id: &str) -> PlayerRecord {
    store
        .create_player(PlayerRecord::new(player_id, "Pat", "apartment"))
        .expect("create player")
}

/// An NPC with a personality and a friendly attitude: individual but not dramatic.
#[allow(dead_code)]
pub fn seed_npc(store: &StoryStore, npc_id: &str) -> NpcRecord {
    store
        .create_npc(
            NpcRecord::new(npc_id, "Mara", "bakery")
                .with_trait("proud")
                .with_attitude("friendly"),
        )
        .expect("create npc")
}
