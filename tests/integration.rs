//! Integration tests for the hub.

use parley::{Hub, HubConfig, HubError, Participant, ParticipantId, Sequence, User};
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// --- Chat Room Workflow ---

#[test]
fn test_chat_room_scenario() {
    init_tracing();

    let mut denylist = BTreeMap::new();
    denylist.insert("badword".to_string(), "*****".to_string());
    let hub = Hub::with_config(HubConfig {
        name: "chat".to_string(),
        denylist,
        ..Default::default()
    })
    .unwrap();

    let (alice, alice_inbox) = User::with_inbox("Alice");
    let (bob, bob_inbox) = User::with_inbox("Bob");
    let (charlie, charlie_inbox) = User::with_inbox("Charlie");

    hub.join(alice.clone()).unwrap();
    hub.join(bob.clone()).unwrap();
    hub.join(charlie.clone()).unwrap();

    // Alice greets the room
    hub.publish("Hello everyone!", alice.id());
    assert_eq!(bob_inbox.drain_texts(), vec!["Hello everyone!"]);
    assert_eq!(charlie_inbox.drain_texts(), vec!["Hello everyone!"]);
    assert!(alice_inbox.is_empty());
    assert_eq!(hub.history(), vec!["Hello everyone!"]);

    // Bob's message is censored before anyone sees it
    hub.publish("This is a badword test message", bob.id());
    assert_eq!(alice_inbox.drain_texts(), vec!["This is a ***** test message"]);
    assert_eq!(charlie_inbox.drain_texts(), vec!["This is a ***** test message"]);
    assert!(bob_inbox.is_empty());

    // Bob leaves; Charlie's goodbye only reaches Alice
    assert!(hub.leave(&*bob));
    let report = hub.publish("Goodbye Bob!", charlie.id());

    assert_eq!(report.delivered, vec![ParticipantId::from("Alice")]);
    assert_eq!(alice_inbox.drain_texts(), vec!["Goodbye Bob!"]);
    assert!(bob_inbox.is_empty());
    assert_eq!(
        hub.history(),
        vec![
            "Hello everyone!",
            "This is a ***** test message",
            "Goodbye Bob!"
        ]
    );
}

#[test]
fn test_send_through_participants() {
    let hub = Hub::new();
    let (alice, alice_inbox) = User::with_inbox("Alice");
    let (bob, bob_inbox) = User::with_inbox("Bob");
    let (charlie, charlie_inbox) = User::with_inbox("Charlie");

    hub.join(alice.clone()).unwrap();
    hub.join(bob.clone()).unwrap();
    hub.join(charlie.clone()).unwrap();
    hub.leave(&*bob);

    alice.send("Hi, I'm Alice.").unwrap();
    let result = bob.send("This is a badword from Bob!");
    charlie.send("Hey guys, I'm Charlie.").unwrap();

    assert!(matches!(result, Err(HubError::NotJoined(ref id)) if id == "Bob"));
    assert_eq!(alice_inbox.drain_texts(), vec!["Hey guys, I'm Charlie."]);
    assert_eq!(charlie_inbox.drain_texts(), vec!["Hi, I'm Alice."]);
    assert!(bob_inbox.is_empty());
    assert_eq!(hub.history_len(), 2);
}

#[test]
fn test_rejoin_after_leave() {
    let hub = Hub::new();
    let (alice, _alice_inbox) = User::with_inbox("alice");
    let (bob, bob_inbox) = User::with_inbox("bob");
    hub.join(bob).unwrap();

    hub.join(alice.clone()).unwrap();
    hub.leave(&*alice);
    assert!(alice.send("gone").is_err());

    hub.join(alice.clone()).unwrap();
    alice.send("back").unwrap();

    assert_eq!(bob_inbox.drain_texts(), vec!["back"]);
    assert_eq!(hub.members(), vec![ParticipantId::from("bob"), ParticipantId::from("alice")]);
}

#[test]
fn test_sequences_follow_history() {
    let hub = Hub::new();
    let (alice, _inbox) = User::with_inbox("alice");
    hub.join(alice.clone()).unwrap();

    for i in 1..=5u64 {
        let report = alice.send(&format!("message {}", i)).unwrap();
        assert_eq!(report.sequence, Sequence(i));
    }

    let sequences: Vec<u64> = hub.entries().iter().map(|e| e.sequence.0).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_entries_serialize_to_json() {
    let hub = Hub::new();
    hub.publish("a badword here", &"bob".into());

    let json = serde_json::to_value(hub.entries()).unwrap();
    assert_eq!(json[0]["text"], "a ***** here");
    assert_eq!(json[0]["sender"], "bob");
}

// --- Configuration ---

#[test]
fn test_load_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#####"{{
            "name": "lobby",
            "denylist": {{ "darn": "####", "heck": "####" }},
            "ordered_delivery": true
        }}"#####
    )
    .unwrap();

    let config = HubConfig::load(file.path()).unwrap();
    let hub = Hub::with_config(config).unwrap();

    assert_eq!(hub.name(), "lobby");
    assert!(hub.ordered_delivery());
    assert_eq!(hub.publish("darn it, heck", &"x".into()).text, "#### it, ####");
    // The default entry is replaced, not merged.
    assert_eq!(hub.publish("badword", &"x".into()).text, "badword");
}

#[test]
fn test_missing_config_file() {
    let result = HubConfig::load("/definitely/not/here.json");
    assert!(matches!(result, Err(HubError::Io(_))));
}
