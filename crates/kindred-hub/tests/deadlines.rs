// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation and transcription deadlines.

use std::time::Duration;

use kindred_hub::codec::{AudioCommand, AudioPayload, ChatCommand, Command};
use kindred_hub::Event;
use kindred_test_utils::{MockGenerator, Script, TestHarness};

fn chat(id: &str) -> Command {
    Command::Chat(ChatCommand {
        id: Some(id.to_string()),
        ..ChatCommand::from_user("are you there?")
    })
}

fn is_timeout(event: &Event) -> bool {
    matches!(event, Event::Error { message } if message.contains("timed out"))
}

#[tokio::test(start_paused = true)]
async fn hanging_generation_yields_one_timeout_and_no_reply() {
    let harness = TestHarness::builder()
        .with_generator(MockGenerator::hanging())
        .build();
    let mut client = harness.connect(TestHarness::params("c1"));

    client.send(&chat("m1"));
    let events = client.events_within(Duration::from_secs(30)).await;

    assert_eq!(events[0], Event::Ack { id: "m1".into() });
    assert_eq!(events.iter().filter(|e| is_timeout(e)).count(), 1, "{events:?}");
    assert!(!events.iter().any(|e| matches!(e, Event::Chat(_))));
}

#[tokio::test(start_paused = true)]
async fn late_generation_result_is_discarded() {
    let generator = MockGenerator::new();
    generator
        .push(Script::Delayed(Duration::from_secs(5), "too late".into()))
        .await;
    let harness = TestHarness::builder().with_generator(generator).build();
    let mut client = harness.connect(TestHarness::params("c1"));

    client.send(&chat("m1"));
    let events = client.events_within(Duration::from_secs(20)).await;

    let timeout_at = events.iter().position(is_timeout).expect("timeout error");
    assert!(events[..timeout_at].contains(&Event::Ack { id: "m1".into() }));
    assert!(!events.iter().any(|e| matches!(e, Event::Chat(_))), "{events:?}");

    // The detached call finished long ago; nothing was persisted for it.
    let stored = harness.messages.turns(1, "session-1-c1").await;
    assert_eq!(stored.len(), 1);

    // The session is still usable.
    client.send(&chat("m2"));
    let events = client.events_within(Duration::from_secs(10)).await;
    assert!(events.iter().any(|e| matches!(e, Event::Chat(t) if t.content == "mock reply")));
}

#[tokio::test(start_paused = true)]
async fn hanging_transcription_times_out() {
    let harness = TestHarness::builder().build();
    harness.stt.set_hanging(true);
    let mut client = harness.connect(TestHarness::params("c1"));

    client.send(&Command::Audio(AudioCommand {
        payload: AudioPayload::Base64("AQID".into()),
        format: None,
    }));
    let events = client.events_within(Duration::from_secs(30)).await;

    assert_eq!(events.len(), 2, "{events:?}");
    assert!(is_timeout(&events[1]));
    assert_eq!(harness.generator.call_count().await, 0);
}
