//! # Lifesim - state and consistency engine for text-driven life simulations
//!
//! Lifesim persists player and NPC state, appends timestamped event history,
//! and judges whether a proposed story turn may stand before it is committed.
//!
//! ## Features
//!
//! - **Entity Store**: Players, NPCs (personality, mood, relationships, memories), inventories and two event logs in an embedded sled database.
//! - **Event Ingestion**: Single or batched events with ISO-8601 relative timestamps (`P1DT2H`); NPC events are mirrored into the NPC's memories.
//! - **State Sync**: On request, an NPC's mood follows its latest log entry and a player's money absorbs the latest `moneyChange`.
//! - **Precheck**: Story advancement, NPC knowledge boundaries, new-character detection and drama presence combined into one verdict.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lifesim::story::{
//!     ingest_batch, precheck, EventDescriptor, LatestEntry, PlayerRecord, PrecheckPolicy,
//!     PrecheckRequest, StoryStoreBuilder,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = StoryStoreBuilder::new("./data/lifesim").open()?;
//!     store.create_player(PlayerRecord::new("p1", "Pat", "apartment"))?;
//!
//!     ingest_batch(&store, &[EventDescriptor::player("p1", "Pat argued with the landlord")])?;
//!
//!     let request = PrecheckRequest::new("p1", "evening", LatestEntry::new("Pat went for a walk"));
//!     let verdict = precheck(&store, &request, &PrecheckPolicy::default());
//!     println!("consistent: {}", verdict.logic_consistent);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`story`] - Data model, store, ingestion, sync and precheck
//! - [`config`] - Configuration loading and defaults
//! - [`logutil`] - Single-line log sanitising for free-text summaries

pub mod config;
pub mod logutil;
pub mod story;
