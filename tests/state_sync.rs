/// Integration tests for log-derived NPC mood and player money.
mod common;

use common::{seed_npc, seed_player, setup_test_store};
use lifesim::story::{
    ingest_batch, ingest_event, sync_npc_mood, sync_player_money, update_npc, update_player,
    DataValue, EventData, EventDescriptor, NpcPatch, PlayerPatch, MONEY_CHANGE_KEY,
};

fn paid(amount: i64) -> EventData {
    EventData::new().with(MONEY_CHANGE_KEY, DataValue::Int(amount))
}

#[test]
fn ingested_feeling_becomes_mood_on_sync() {
    let (store, _temp) = setup_test_store();
    seed_npc(&store, "npc1");
    ingest_batch(
        &store,
        &[
            EventDescriptor::npc("npc1", "was praised").with_feeling("proud"),
            EventDescriptor::npc("npc1", "was insulted")
                .with_feeling("angry")
                .with_time_delta("PT1M"),
        ],
    )
    .unwrap();

    assert_eq!(store.get_npc("npc1").unwrap().mood, None);
    let npc = sync_npc_mood(&store, "npc1").unwrap();
    assert_eq!(npc.mood.as_deref(), Some("angry"));
    assert_eq!(store.get_npc("npc1").unwrap().mood.as_deref(), Some("angry"));
}

#[test]
fn money_sync_applies_each_entry_once() {
    let (store, _temp) = setup_test_store();
    seed_player(&store, "p1");
    ingest_batch(
        &store,
        &[EventDescriptor::player("p1", "sold a painting").with_data(paid(120))],
    )
    .unwrap();

    assert_eq!(sync_player_money(&store, "p1").unwrap().stats.money, 120);
    assert_eq!(sync_player_money(&store, "p1").unwrap().stats.money, 120);

    ingest_batch(
        &store,
        &[EventDescriptor::player("p1", "paid rent")
            .with_data(paid(-80))
            .with_time_delta("PT1S")],
    )
    .unwrap();
    let player = sync_player_money(&store, "p1").unwrap();
    assert_eq!(player.stats.money, 40);
}

#[test]
fn money_payload_parsed_from_json_descriptor() {
    let (store, _temp) = setup_test_store();
    seed_player(&store, "p1");
    let events: Vec<EventDescriptor> = serde_json::from_str(
        r#"[{"entityType": "player", "entityId": "p1", "summary": "found a wallet",
             "data": {"moneyChange": 15}, "urgency": 20}]"#,
    )
    .unwrap();
    ingest_batch(&store, &events).unwrap();
    let player = update_player(
        &store,
        "p1",
        PlayerPatch {
            location: Some("park".into()),
            ..PlayerPatch::default()
        },
        true,
    )
    .unwrap();
    assert_eq!(player.location, "park");
    assert_eq!(player.stats.money, 15);
}

#[test]
fn npc_updates_keep_memories_appended_concurrently() {
    const ROUNDS: usize = 200;
    let (store, _temp) = setup_test_store();
    seed_npc(&store, "npc1");

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..ROUNDS {
                let event = EventDescriptor::npc("npc1", &format!("event {}", i)).with_feeling("tense");
                ingest_event(&store, &event).unwrap();
            }
        });
        scope.spawn(|| {
            for i in 0..ROUNDS {
                let patch = NpcPatch {
                    location: Some(format!("stall {}", i)),
                    ..NpcPatch::default()
                };
                update_npc(&store, "npc1", patch, i % 2 == 0).unwrap();
                sync_npc_mood(&store, "npc1").unwrap();
            }
        });
    });

    let logs = store.recent_npc_logs("npc1", ROUNDS * 2).unwrap();
    let npc = store.get_npc("npc1").unwrap();
    assert_eq!(logs.len(), ROUNDS);
    assert_eq!(npc.memories.len(), logs.len());
    assert_eq!(npc.location, format!("stall {}", ROUNDS - 1));
    assert_eq!(sync_npc_mood(&store, "npc1").unwrap().mood.as_deref(), Some("tense"));
}
