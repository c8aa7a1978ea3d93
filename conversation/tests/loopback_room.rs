mod common;

use std::sync::Arc;

use common::{init_tracing, quiet_config, wait_for, HookCall, ScriptedHooks, CID, DOMAIN};
use conversation::protocol::messages;
use conversation::protocol::tokens::READY_FOR_NEXT;
use conversation::{
    BotRole, Conversation, ConversationState, Dispatcher, LoopbackRoom, Transport,
};
use conversation::transport::OutgoingShout;

struct Seat {
    dispatcher: Dispatcher,
    hooks: Arc<ScriptedHooks>,
}

fn seat(room: &Arc<LoopbackRoom>, nick: &str, hooks: ScriptedHooks) -> Seat {
    init_tracing();
    let hooks = Arc::new(hooks);
    let transport = Arc::new(room.transport_for(nick));
    let conversation = Conversation::new(
        quiet_config(nick, BotRole::Submind),
        hooks.clone(),
        transport,
    );
    let dispatcher = Dispatcher::spawn(conversation);
    room.attach(dispatcher.handle());
    Seat { dispatcher, hooks }
}

#[tokio::test]
async fn test_round_across_loopback_room() {
    let room = LoopbackRoom::new(CID, DOMAIN).shared();
    let mut watcher = room.subscribe();
    let proctor = room.transport_for("Proctor");

    let alice = seat(
        &room,
        "alice",
        ScriptedHooks::new().responding("Alice's answer.").voting("bob"),
    );
    let bob = seat(
        &room,
        "bob",
        ScriptedHooks::new().responding("Bob's answer.").voting("alice"),
    );

    proctor
        .send(OutgoingShout::new(messages::announce_prompt("carol", "q", 0)))
        .await
        .unwrap();
    wait_for(&mut watcher, 2, |s| s.shout.ends_with("answer.")).await;

    proctor
        .send(OutgoingShout::new(messages::call_voting("q", 5)))
        .await
        .unwrap();
    let votes = wait_for(&mut watcher, 2, |s| s.shout.starts_with("I vote for")).await;
    assert_eq!(votes.len(), 2);

    proctor
        .send(OutgoingShout::new(messages::close_voting("q")))
        .await
        .unwrap();
    proctor
        .send(OutgoingShout::new(messages::announce_selection(
            "bob",
            "Bob's answer.",
        )))
        .await
        .unwrap();
    proctor
        .send(OutgoingShout::new(messages::pick_respondents(&["alice"])))
        .await
        .unwrap();
    let acks = wait_for(&mut watcher, 2, |s| s.shout == READY_FOR_NEXT).await;
    assert_eq!(acks.len(), 2);

    let alice_conv = alice.dispatcher.shutdown().await.unwrap();
    let bob_conv = bob.dispatcher.shutdown().await.unwrap();

    assert_eq!(alice_conv.history().selections(), ["bob"]);
    assert_eq!(alice_conv.phase(), ConversationState::Idle);
    assert_eq!(bob_conv.phase(), ConversationState::Wait);

    // Each saw the other's vote.
    assert!(alice.hooks.votes().contains(&HookCall::Vote {
        prompt: match &alice.hooks.votes()[0] {
            HookCall::Vote { prompt, .. } => prompt.clone(),
            _ => unreachable!(),
        },
        selected: "alice".into(),
        voter: "bob".into()
    }));
    assert!(bob
        .hooks
        .votes()
        .iter()
        .any(|c| matches!(c, HookCall::Vote { selected, voter, .. } if selected == "bob" && voter == "alice")));
}

#[tokio::test]
async fn test_dispatcher_stops_forwarding_after_shutdown() {
    let room = LoopbackRoom::new(CID, DOMAIN).shared();
    let alice = seat(&room, "alice", ScriptedHooks::new());
    let forwarder = room.attach(alice.dispatcher.handle());

    let conv = alice.dispatcher.shutdown().await.unwrap();
    assert_eq!(conv.phase(), ConversationState::Idle);

    room.transport_for("bob")
        .send(OutgoingShout::new("anyone?"))
        .await
        .unwrap();
    forwarder.await.unwrap();
}
