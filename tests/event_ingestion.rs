/// Integration tests for event ingestion: batches, NPC memory lockstep and
/// relative timestamps.
mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{seed_npc, seed_player, setup_test_store};
use lifesim::story::{
    ingest_batch, ingest_batch_at, ingest_event, EventDescriptor, LoggedEvent, StoryError,
};

#[test]
fn npc_batch_entry_writes_log_and_memory() {
    let (store, _temp) = setup_test_store();
    seed_npc(&store, "npc1");
    let before = store.get_npc("npc1").unwrap().memories.len();

    let events: Vec<EventDescriptor> = serde_json::from_str(
        r#"[{"entityType": "npc", "entityId": "npc1", "summary": "npc1 insulted player", "feeling": "angry"}]"#,
    )
    .unwrap();
    let logs = ingest_batch(&store, &events).unwrap();

    assert_eq!(logs.len(), 1);
    let npc_logs = store.recent_npc_logs("npc1", 10).unwrap();
    assert_eq!(npc_logs.len(), 1);
    assert_eq!(npc_logs[0].summary, "npc1 insulted player");

    let npc = store.get_npc("npc1").unwrap();
    assert_eq!(npc.memories.len(), before + 1);
    let memory = npc.memories.last().unwrap();
    assert_eq!(memory.summary, "npc1 insulted player");
    assert_eq!(memory.feeling.as_deref(), Some("angry"));
    assert_eq!(memory.timestamp, npc_logs[0].timestamp);
}

#[test]
fn unknown_entity_type_is_skipped_silently() {
    let (store, _temp) = setup_test_store();
    seed_player(&store, "p1");

    let events: Vec<EventDescriptor> = serde_json::from_str(
        r#"[
            {"entityType": "ghost", "entityId": "g1", "summary": "rattled chains"},
            {"entityType": "player", "entityId": "p1", "summary": "heard a noise"}
        ]"#,
    )
    .unwrap();
    let logs = ingest_batch(&store, &events).unwrap();

    assert_eq!(logs.len(), 1);
    assert!(matches!(&logs[0], LoggedEvent::Player(log) if log.player_id == "p1"));
    assert_eq!(store.count_player_logs(), 1);
    assert_eq!(store.count_npc_logs(), 0);
}

#[test]
fn results_follow_submission_order() {
    let (store, _temp) = setup_test_store();
    seed_npc(&store, "npc1");
    let events = vec![
        EventDescriptor::npc("npc1", "first"),
        EventDescriptor::player("p1", "second"),
        EventDescriptor::npc("npc1", "third").with_time_delta("P1D"),
        EventDescriptor::player("p1", "fourth").with_time_delta("PT1H"),
    ];
    let logs = ingest_batch(&store, &events).unwrap();
    let summaries: Vec<_> = logs.iter().map(|l| l.summary()).collect();
    assert_eq!(summaries, vec!["first", "second", "third", "fourth"]);
}

#[test]
fn npc_log_and_memory_counts_stay_in_lockstep() {
    let (store, _temp) = setup_test_store();
    seed_npc(&store, "npc1");
    seed_npc(&store, "npc2");

    let events: Vec<_> = (0..6)
        .map(|i| {
            let id = if i % 2 == 0 { "npc1" } else { "npc2" };
            EventDescriptor::npc(id, &format!("event {}", i)).with_feeling("curious")
        })
        .collect();
    ingest_batch(&store, &events).unwrap();
    ingest_event(&store, &EventDescriptor::npc("npc1", "one more")).unwrap();

    for id in ["npc1", "npc2"] {
        let logs = store.recent_npc_logs(id, 100).unwrap();
        let npc = store.get_npc(id).unwrap();
        assert_eq!(logs.len(), npc.memories.len(), "lockstep for {}", id);
    }
    assert_eq!(store.get_npc("npc1").unwrap().memories.len(), 4);
}

#[test]
fn time_deltas_stamp_relative_to_batch_base() {
    let (store, _temp) = setup_test_store();
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    let events = vec![
        EventDescriptor::player("p1", "breakfast"),
        EventDescriptor::player("p1", "lunch").with_time_delta("PT4H"),
        EventDescriptor::player("p1", "garbled").with_time_delta("P1DT"),
    ];
    let logs = ingest_batch_at(&store, &events, base).unwrap();
    assert_eq!(logs[0].timestamp(), base);
    assert_eq!(logs[1].timestamp(), base + Duration::hours(4));
    assert_eq!(logs[2].timestamp(), base);

    // Newest first: lunch sits four hours after the other two.
    let recent = store.recent_player_logs("p1", 1).unwrap();
    assert_eq!(recent[0].summary, "lunch");
}

#[test]
fn failing_entry_keeps_earlier_entries() {
    let (store, _temp) = setup_test_store();
    let events = vec![
        EventDescriptor::player("p1", "kept"),
        EventDescriptor::player("p1", ""),
        EventDescriptor::player("p1", "never written"),
    ];
    let err = ingest_batch(&store, &events).unwrap_err();
    assert!(matches!(err, StoryError::Validation(_)));
    let logs = store.recent_player_logs("p1", 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].summary, "kept");
}
