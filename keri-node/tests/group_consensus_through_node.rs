use std::sync::{Arc, Mutex};

use group_consensus::{GroupMessage, GroupSettings, MessageStatus};
use keri_node::Node;
use kv_store::memory::MemoryBackend;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&GroupMessage) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handle = seen.clone();
    let callback = move |message: &GroupMessage| handle.lock().unwrap().push(message.id.clone());
    (seen, callback)
}

fn node() -> Node<MemoryBackend> {
    Node::new(Arc::new(MemoryBackend::new()))
}

#[async_std::test]
async fn two_member_quorum_resolves_through_the_node_facade() {
    let alice_node = node();
    let bob_node = node();
    let (alice_canonical, alice_cb) = recorder();
    let (bob_canonical, bob_cb) = recorder();
    let alice = alice_node.group_engine("alice").with_on_canonical(alice_cb);
    let bob = bob_node.group_engine("bob").with_on_canonical(bob_cb);

    let group = alice.create_group("pair", GroupSettings::default()).await.unwrap();
    let group = alice.add_member(&group.group_id, "bob").await.unwrap();
    bob.adopt_group(group.clone()).await.unwrap();

    let sent = alice.send(&group.group_id, "hi").await.unwrap();
    assert_eq!(sent.status, MessageStatus::Pending);

    let vote = bob.receive_message(sent.clone()).await.unwrap();
    assert_eq!(*bob_canonical.lock().unwrap(), vec![sent.id.clone()]);

    alice.receive_vote(vote).await.unwrap();
    assert_eq!(*alice_canonical.lock().unwrap(), vec![sent.id.clone()]);
}

#[async_std::test]
async fn concurrent_first_messages_converge_to_the_same_winner_on_both_sides() {
    let alice_node = node();
    let bob_node = node();
    let (alice_canonical, alice_cb) = recorder();
    let (bob_canonical, bob_cb) = recorder();
    let alice = alice_node.group_engine("alice").with_on_canonical(alice_cb);
    let bob = bob_node.group_engine("bob").with_on_canonical(bob_cb);

    let group = alice.create_group("pair", GroupSettings::default()).await.unwrap();
    let group = alice.add_member(&group.group_id, "bob").await.unwrap();
    bob.adopt_group(group.clone()).await.unwrap();

    let from_alice = alice.send(&group.group_id, "hi from alice").await.unwrap();
    let from_bob = bob.send(&group.group_id, "hi from bob").await.unwrap();

    let vote_for_alice_msg = bob.receive_message(from_alice.clone()).await.unwrap();
    let vote_for_bob_msg = alice.receive_message(from_bob.clone()).await.unwrap();
    alice.receive_vote(vote_for_alice_msg).await.unwrap();
    bob.receive_vote(vote_for_bob_msg).await.unwrap();

    let alice_winner = alice_canonical.lock().unwrap().clone();
    let bob_winner = bob_canonical.lock().unwrap().clone();
    assert_eq!(alice_winner.len(), 1);
    assert_eq!(alice_winner, bob_winner);
}

#[async_std::test]
async fn bob_catches_up_after_a_partition_via_sync() {
    // A trio so alice and carol can reach a 2-of-3 majority and
    // canonicalise messages while bob is genuinely partitioned — never
    // delivered a message, never asked to vote.
    let alice_node = node();
    let bob_node = node();
    let carol_node = node();
    let (_alice_canonical, alice_cb) = recorder();
    let (bob_canonical, bob_cb) = recorder();
    let (_carol_canonical, carol_cb) = recorder();
    let alice = alice_node.group_engine("alice").with_on_canonical(alice_cb);
    let bob = bob_node.group_engine("bob").with_on_canonical(bob_cb);
    let carol = carol_node.group_engine("carol").with_on_canonical(carol_cb);

    let group = alice.create_group("trio", GroupSettings::default()).await.unwrap();
    let group = alice.add_member(&group.group_id, "bob").await.unwrap();
    let group = alice.add_member(&group.group_id, "carol").await.unwrap();
    bob.adopt_group(group.clone()).await.unwrap();
    carol.adopt_group(group.clone()).await.unwrap();

    let first = alice.send(&group.group_id, "hi").await.unwrap();
    let vote = carol.receive_message(first.clone()).await.unwrap();
    alice.receive_vote(vote).await.unwrap();

    // Bob goes offline; alice and carol keep the conversation going
    // without him.
    let missed = alice.send(&group.group_id, "are you there?").await.unwrap();
    let vote2 = carol.receive_message(missed.clone()).await.unwrap();
    alice.receive_vote(vote2).await.unwrap();

    let request = bob.create_sync_request(&group.group_id).await.unwrap();
    let response = alice.create_sync_response(&request).await.unwrap();
    assert_eq!(response.messages.len(), 2);
    assert_eq!(response.messages[1].id, missed.id);

    bob.process_sync_response(response).await.unwrap();
    assert!(bob_canonical.lock().unwrap().contains(&missed.id));
}
