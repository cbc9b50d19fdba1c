//! Story state and the engines that guard it.
//!
//! The store keeps players, NPCs, inventories and two append-only event logs
//! in sled. On top of it sit event ingestion (with relative timestamps), the
//! log-derived sync rules for NPC mood and player money, and the precheck
//! that decides whether a proposed narrative turn may stand.

pub mod errors;
pub mod ingest;
pub mod precheck;
pub mod seed;
pub mod storage;
pub mod sync;
pub mod timedelta;
pub mod types;

pub use errors::StoryError;
pub use ingest::{
    ingest_batch, ingest_batch_at, ingest_event, ingest_event_at, log_npc_event, log_player_event,
    player_history, EntityType, EventDescriptor, LoggedEvent, NpcEventInput, PlayerEventInput,
};
pub use precheck::{precheck, LatestEntry, PrecheckPolicy, PrecheckRequest, Verdict};
pub use seed::{apply_seed, load_seed_from_json, SeedDocument, SeedReport};
pub use storage::{StoryStore, StoryStoreBuilder};
pub use sync::{
    sync_npc_mood, sync_player_money, update_npc, update_player, NpcPatch, PlayerPatch,
};
pub use timedelta::{format_story_time, parse_duration, resolve_time, StoryDuration};
pub use types::*;
