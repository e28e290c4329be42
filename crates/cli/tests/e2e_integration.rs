//! End-to-end integration tests for SAM.
//!
//! These tests drive whole chats through the reconciliation controller, from
//! a generated message with inline commands to the canonical store and the
//! embedded state block.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sam_config::SamConfig;
use sam_core::{
    ChatEvent, ConversationId, FixedClock, MessageStore, Role, State, VariableStore,
};
use sam_reconcile::{Outcome, ReconcileOptions, Reconciler};
use sam_script::{STATE_BLOCK_END, STATE_BLOCK_START, parse_block, render_block, strip_blocks};
use sam_store::{FileChat, InMemoryChat, Transcript};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()))
}

fn host(id: &str) -> Arc<InMemoryChat> {
    Arc::new(InMemoryChat::new(ConversationId::from(id)))
}

async fn canonical<V: VariableStore + ?Sized>(store: &V) -> State {
    State::from_value(store.variables().await.unwrap()).unwrap()
}

async fn active_text<M: MessageStore + ?Sized>(store: &M, index: usize) -> String {
    store.message(index).await.unwrap().active_text().to_string()
}

// ── Core pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn hello_set_add_embeds_clean_narrative() {
    let chat = host("e2e");
    chat.push(Role::User, "Start").await;
    chat.push(Role::Assistant, "Hello <SET :: hp :: 10><ADD :: hp :: -3>")
        .await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());

    let outcome = reconciler.handle(&ChatEvent::GenerationEnded).await;
    assert!(matches!(outcome, Outcome::Processed { index: 1, .. }));

    let state = canonical(chat.as_ref()).await;
    assert_eq!(state.vars["hp"], json!(7));

    let text = active_text(chat.as_ref(), 1).await;
    assert!(text.starts_with(&format!("Hello\n\n{STATE_BLOCK_START}\n")));
    assert!(text.ends_with(STATE_BLOCK_END));
    assert_eq!(parse_block(&text), Some(state.clone()));
    assert_eq!(text, format!("Hello\n\n{}", render_block(&state).unwrap()));
}

#[tokio::test]
async fn multi_turn_story_with_schedule_and_cancel() {
    let chat = host("story");
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());

    // Message 1 is round 1: both writes target round 5.
    chat.push(Role::User, "We make camp.").await;
    chat.push(
        Role::Assistant,
        "The fire crackles. <SET :: party.morale :: 5>\
         <TIMED_SET :: weather :: rain :: storm :: false :: 4>\
         <TIMED_SET :: wolves :: near :: howling :: false :: 4>\
         <RESPONSE_SUMMARY :: the party made camp>",
    )
    .await;
    reconciler.handle(&ChatEvent::GenerationEnded).await;
    assert_eq!(canonical(chat.as_ref()).await.volatile.len(), 2);

    // Round 3: cancel the wolves by reason, nothing is due yet.
    chat.push(Role::User, "We keep watch.").await;
    chat.push(Role::Assistant, "Quiet night. <CANCEL_SET :: howling><ADD :: party.morale :: 2>")
        .await;
    reconciler.handle(&ChatEvent::GenerationEnded).await;
    let state = canonical(chat.as_ref()).await;
    assert_eq!(state.volatile.len(), 1);
    assert_eq!(state.volatile[0].var_name, "weather");
    assert_eq!(state.vars["party"]["morale"], json!(7));
    assert!(!state.vars.contains_key("weather"));

    // Round 5: the rain arrives; a non-numeric ADD is ignored.
    chat.push(Role::User, "Morning.").await;
    chat.push(Role::Assistant, "Dawn breaks. <ADD :: log :: dawn>").await;
    reconciler.handle(&ChatEvent::GenerationEnded).await;

    let state = canonical(chat.as_ref()).await;
    assert_eq!(state.vars["weather"], json!("rain"));
    assert!(!state.vars.contains_key("wolves"));
    assert!(!state.vars.contains_key("log"));
    assert!(state.volatile.is_empty());
    assert_eq!(state.response_summary, ["the party made camp"]);
}

// ── Event handling ───────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_end_and_stop_events_apply_once() {
    let chat = host("twice");
    chat.push(Role::Assistant, "<ADD :: gold :: 10>").await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());

    for event in [
        ChatEvent::GenerationEnded,
        ChatEvent::GenerationStopped,
        ChatEvent::GenerationEnded,
    ] {
        reconciler.handle(&event).await;
    }
    assert_eq!(canonical(chat.as_ref()).await.vars["gold"], json!(10));
}

#[tokio::test]
async fn failed_generation_without_new_message_is_not_reprocessed() {
    let chat = host("failed");
    chat.push(Role::Assistant, "<ADD :: gold :: 1>").await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());

    reconciler.handle(&ChatEvent::GenerationStarted).await;
    reconciler.handle(&ChatEvent::GenerationEnded).await;

    // A second generation fails before producing a message.
    reconciler.handle(&ChatEvent::GenerationStarted).await;
    let outcome = reconciler.handle(&ChatEvent::GenerationStopped).await;
    assert!(matches!(outcome, Outcome::Skipped(_)));
    assert_eq!(canonical(chat.as_ref()).await.vars["gold"], json!(1));
}

#[tokio::test]
async fn swipe_reloads_and_never_reapplies() {
    let chat = host("swipe");
    chat.push(Role::User, "Roll.").await;
    chat.push(Role::Assistant, "A hit. <ADD :: hp :: -2>").await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());
    reconciler.handle(&ChatEvent::GenerationEnded).await;
    assert_eq!(canonical(chat.as_ref()).await.vars["hp"], json!(-2));

    // Regenerate: a new swipe that the host then reports as finished.
    chat.add_swipe(1, "A miss. <ADD :: misses :: 1>").await.unwrap();
    reconciler.handle(&ChatEvent::MessageSwiped { index: 1 }).await;
    reconciler.handle(&ChatEvent::GenerationEnded).await;
    let state = canonical(chat.as_ref()).await;
    assert_eq!(state.vars.get("misses"), Some(&json!(1)));

    // Swipe back and forth: each swipe restores its own block.
    for _ in 0..3 {
        chat.select_swipe(1, 0).await.unwrap();
        reconciler.handle(&ChatEvent::MessageSwiped { index: 1 }).await;
        let state = canonical(chat.as_ref()).await;
        assert_eq!(state.vars["hp"], json!(-2));
        assert!(!state.vars.contains_key("misses"));

        chat.select_swipe(1, 1).await.unwrap();
        reconciler.handle(&ChatEvent::MessageSwiped { index: 1 }).await;
        let state = canonical(chat.as_ref()).await;
        assert_eq!(state.vars["misses"], json!(1));
    }
}

#[tokio::test]
async fn user_edit_leaves_canonical_store_untouched() {
    let chat = host("edit");
    chat.push(Role::Assistant, "<SET :: hp :: 3>").await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());
    reconciler.handle(&ChatEvent::GenerationEnded).await;
    chat.push(Role::User, "I drink a potion <SET :: hp :: 100>").await;

    let before = chat.variables().await.unwrap();
    let outcome = reconciler.handle(&ChatEvent::MessageEdited { index: 1 }).await;
    assert!(matches!(outcome, Outcome::Skipped(_)));
    assert_eq!(chat.variables().await.unwrap(), before);
}

#[tokio::test]
async fn hand_edited_block_is_picked_up_on_edit() {
    let chat = host("hand-edit");
    chat.push(Role::Assistant, "<SET :: hp :: 3>").await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());
    reconciler.handle(&ChatEvent::GenerationEnded).await;

    let mut edited = canonical(chat.as_ref()).await;
    edited.vars.insert("hp".into(), json!(30));
    let narrative = strip_blocks(&active_text(chat.as_ref(), 0).await);
    let text = sam_script::embed_block(&narrative, &edited).unwrap();
    chat.set_message(0, text).await.unwrap();

    reconciler.handle(&ChatEvent::MessageEdited { index: 0 }).await;
    assert_eq!(canonical(chat.as_ref()).await.vars["hp"], json!(30));
}

#[tokio::test]
async fn chat_change_without_state_loads_initial_default() {
    let chat = host("first");
    chat.push(Role::Assistant, "<SET :: hp :: 3>").await;
    let reconciler = Reconciler::for_host(Arc::clone(&chat), clock());
    reconciler.handle(&ChatEvent::GenerationEnded).await;

    let mut fresh = Transcript::new(ConversationId::from("second"));
    fresh.push(Role::User, "Hello?");
    fresh.push(Role::Assistant, "Nobody answers.");
    chat.switch_to(fresh).await;

    reconciler.handle(&ChatEvent::ChatChanged).await;
    assert_eq!(canonical(chat.as_ref()).await, State::initial());

    // Processing in the new chat starts from the initial state.
    reconciler.handle(&ChatEvent::GenerationEnded).await;
    let state = canonical(chat.as_ref()).await;
    assert!(state.vars.is_empty());
    assert!(parse_block(&active_text(chat.as_ref(), 1).await).is_some());
}

#[tokio::test]
async fn concurrent_events_on_one_chat_are_serialized() {
    let chat = host("busy");
    chat.push(Role::Assistant, "<ADD :: ticks :: 1>").await;
    let reconciler = Arc::new(Reconciler::for_host(Arc::clone(&chat), clock()));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let reconciler = Arc::clone(&reconciler);
        let event = if i % 2 == 0 {
            ChatEvent::GenerationEnded
        } else {
            ChatEvent::GenerationStopped
        };
        tasks.push(tokio::spawn(async move { reconciler.handle(&event).await }));
    }
    let outcomes = futures::future::join_all(tasks).await;

    let processed = outcomes
        .into_iter()
        .map(Result::unwrap)
        .filter(|o| matches!(o, Outcome::Processed { .. }))
        .count();
    assert_eq!(processed, 1);
    assert_eq!(canonical(chat.as_ref()).await.vars["ticks"], json!(1));
    assert_eq!(
        active_text(chat.as_ref(), 0)
            .await
            .matches(STATE_BLOCK_START)
            .count(),
        1
    );
}

#[tokio::test]
async fn event_bus_drives_the_listener() {
    let chat = host("bus");
    chat.push(Role::Assistant, "<SET :: lit :: true>").await;
    let reconciler = Arc::new(Reconciler::for_host(Arc::clone(&chat), clock()));
    let bus = sam_reconcile::event_bus(&SamConfig::default().reconcile);
    let listener = Arc::clone(&reconciler).listen(bus.subscribe());

    bus.publish(ChatEvent::GenerationStarted);
    bus.publish(ChatEvent::GenerationEnded);

    let mut done = false;
    for _ in 0..400 {
        if canonical(chat.as_ref()).await.vars.contains_key("lit") {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(done);
    assert_eq!(canonical(chat.as_ref()).await.vars["lit"], json!("true"));

    drop(bus);
    listener.await.unwrap();
}

// ── File-backed host ─────────────────────────────────────────────────────

#[tokio::test]
async fn file_chat_survives_separate_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tavern.json");
    let opening: State = serde_json::from_value(json!({"static": {"coins": 10}})).unwrap();
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "id": "tavern",
            "messages": [
                {"message_id": 0, "role": "assistant", "message": sam_script::embed_block("Welcome.", &opening).unwrap()},
                {"message_id": 1, "role": "user", "message": "Order ale."},
                {"message_id": 2, "role": "assistant", "message": "Ale arrives. <ADD :: coins :: -2>"}
            ],
            "variables": {}
        }))
        .unwrap(),
    )
    .unwrap();

    // Each run opens the chat like a host would, then handles the event.
    for _ in 0..2 {
        let chat = Arc::new(FileChat::open(&path).unwrap());
        let reconciler = Reconciler::for_host(Arc::clone(&chat), clock()).with_options(ReconcileOptions {
            keep_commands: true,
            defer_swipe: true,
        });
        reconciler.on_chat_changed().await.unwrap();
        reconciler.on_generation_ended().await.unwrap();
    }

    let chat = FileChat::open(&path).unwrap();
    assert_eq!(canonical(&chat).await.vars["coins"], json!(8));
    let text = active_text(&chat, 2).await;
    assert!(text.starts_with("Ale arrives. <ADD :: coins :: -2>\n\n"));
    assert_eq!(parse_block(&text).unwrap().vars["coins"], json!(8));
}
