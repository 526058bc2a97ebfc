use anyhow::Result;

use skychat_core::crypto::SEAL_OVERHEAD;
use skychat_core::wire;

use crate::{Relay, TestClient};

#[tokio::test]
async fn alice_and_bob_exchange_a_sealed_message() -> Result<()> {
    let relay = Relay::start().await?;

    let mut alice = relay.connect().await?;
    assert_eq!(alice.ask("/name alice").await?, "> you will be known as alice");

    let mut bob = TestClient::named(&relay, "bob").await?;

    assert_eq!(alice.ask("/join bob").await?, "> You are now talking to :bob");
    alice.send("/msg hello bob").await?;

    let line = bob.line().await?;
    let sealed = line.strip_prefix("> ").expect("chat lines are info output");
    assert!(!sealed.contains("hello bob"));
    let bytes = hex::decode(sealed)?;
    assert_eq!(bytes.len(), SEAL_OVERHEAD + "alice : hello bob".len());

    assert_eq!(bob.ask("/list").await?, "> available users: alice");
    Ok(())
}

#[tokio::test]
async fn taken_name_is_refused() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    let mut bob = relay.connect().await?;

    assert_eq!(bob.ask("/name alice").await?, format!("> {}", wire::NAME_TAKEN));

    // Bob is still unregistered; alice still holds her name.
    assert_eq!(bob.ask("/list").await?, "> available users: alice");
    assert_eq!(alice.ask("/list").await?, "> available users: ");
    Ok(())
}

#[tokio::test]
async fn list_excludes_caller() -> Result<()> {
    let relay = Relay::start().await?;
    let _alice = TestClient::named(&relay, "alice").await?;
    let _bob = TestClient::named(&relay, "bob").await?;
    let mut carol = TestClient::named(&relay, "carol").await?;

    let reply = carol.ask("/list").await?;
    let mut names: Vec<_> = reply
        .strip_prefix("> available users: ")
        .unwrap()
        .split(", ")
        .collect();
    names.sort();
    assert_eq!(names, vec!["alice", "bob"]);
    Ok(())
}

#[tokio::test]
async fn message_to_self_is_not_sealed() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    alice.ask("/join alice").await?;
    assert_eq!(alice.ask("/msg just me").await?, "> alice : just me");
    Ok(())
}

#[tokio::test]
async fn message_without_peer_is_refused() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    assert_eq!(alice.ask("/msg hello").await?, format!("> {}", wire::NO_PEER));
    assert_eq!(
        alice.ask("/join ghost").await?,
        format!("> {}", wire::UNKNOWN_PEER)
    );
    Ok(())
}

#[tokio::test]
async fn unknown_command_is_reported_and_session_continues() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = relay.connect().await?;

    assert_eq!(alice.ask("/shout hi").await?, "err: unknown command: /shout");
    assert_eq!(alice.line().await?, format!("> {}", wire::HELP_HINT));
    assert_eq!(alice.ask("/name alice").await?, "> you will be known as alice");
    Ok(())
}

#[tokio::test]
async fn empty_line_is_reported_as_unknown() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = relay.connect().await?;

    assert_eq!(alice.ask("").await?, "err: unknown command: ");
    assert_eq!(alice.line().await?, format!("> {}", wire::HELP_HINT));
    assert_eq!(alice.ask("/name alice").await?, "> you will be known as alice");
    Ok(())
}

#[tokio::test]
async fn help_is_one_prefixed_line_per_row() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = relay.connect().await?;
    alice.send("/help").await?;

    for expected in wire::HELP.lines() {
        assert_eq!(alice.line().await?, format!("> {expected}"));
    }
    Ok(())
}

#[tokio::test]
async fn stalled_recipient_does_not_block_others() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    // Carol registers and then never reads again.
    let _carol = TestClient::named(&relay, "carol").await?;

    alice.ask("/join carol").await?;
    for i in 0..200 {
        alice.send(&format!("/msg flood {i}")).await?;
    }

    let mut dave = TestClient::named(&relay, "dave").await?;
    let reply = dave.ask("/list").await?;
    assert!(reply.starts_with("> available users: "));
    Ok(())
}
