use std::time::Duration;

use anyhow::Result;

use skychat_core::config::ServerConfig;
use skychat_core::wire;

use crate::{wait_for_list, Relay, TestClient};

#[tokio::test]
async fn quit_says_goodbye_and_closes() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;

    assert_eq!(alice.ask("/quit").await?, format!("> {}", wire::FAREWELL));
    alice.expect_closed().await?;
    Ok(())
}

#[tokio::test]
async fn quit_frees_the_name() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    alice.ask("/quit").await?;

    let again = TestClient::named(&relay, "alice").await;
    assert!(again.is_ok(), "name should be free after quit");
    Ok(())
}

#[tokio::test]
async fn dropped_connection_is_removed_from_directory() -> Result<()> {
    let relay = Relay::start().await?;
    let alice = TestClient::named(&relay, "alice").await?;
    let mut bob = TestClient::named(&relay, "bob").await?;
    assert_eq!(bob.ask("/list").await?, "> available users: alice");

    drop(alice);
    wait_for_list(&mut bob, |reply| reply == "> available users: ").await?;

    let _alice_again = TestClient::named(&relay, "alice").await?;
    Ok(())
}

#[tokio::test]
async fn peer_leaving_mid_conversation() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    let mut bob = TestClient::named(&relay, "bob").await?;
    alice.ask("/join bob").await?;

    bob.ask("/quit").await?;
    bob.expect_closed().await?;

    assert_eq!(alice.ask("/msg still there?").await?, format!("> {}", wire::NO_PEER));
    Ok(())
}

#[tokio::test]
async fn over_long_line_is_rejected_without_dropping_session() -> Result<()> {
    let config = ServerConfig {
        max_line_bytes: 64,
        ..ServerConfig::default()
    };
    let store: skychat_services::SharedHistory =
        std::sync::Arc::new(skychat_services::MemoryHistory::new());
    let relay = Relay::start_with(config, Some(store)).await?;
    let mut alice = relay.connect().await?;

    let long = format!("/msg {}", "x".repeat(300));
    assert_eq!(alice.ask(&long).await?, "err: line longer than 64 bytes");
    assert_eq!(alice.ask("/name alice").await?, "> you will be known as alice");
    Ok(())
}

#[tokio::test]
async fn client_that_never_reads_is_dropped() -> Result<()> {
    let config = ServerConfig {
        write_timeout_ms: 100,
        outbound_queue: 4,
        max_line_bytes: 70_000,
        ..ServerConfig::default()
    };
    let relay = Relay::start_with(config, None).await?;
    let _carol = TestClient::named(&relay, "carol").await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    let mut dave = TestClient::named(&relay, "dave").await?;
    alice.ask("/join carol").await?;

    // Each sealed line is over 100 KB of hex; carol's socket buffers fill
    // and the relay's write to her stalls.
    let body = "x".repeat(60_000);
    let mut gone = false;
    for round in 0..40 {
        for _ in 0..10 {
            alice.send(&format!("/msg {body}")).await?;
        }
        let list = dave.ask("/list").await?;
        if !list.contains("carol") {
            gone = true;
            break;
        }
        assert!(round < 39, "carol was never dropped: {list}");
    }
    assert!(gone);

    let _carol_again = TestClient::named(&relay, "carol").await?;
    Ok(())
}

#[tokio::test]
async fn crlf_terminated_lines_are_accepted() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = relay.connect().await?;
    assert_eq!(alice.ask("/name alice\r").await?, "> you will be known as alice");
    Ok(())
}

#[tokio::test]
async fn shutdown_closes_open_connections() -> Result<()> {
    let relay = Relay::start().await?;
    let mut alice = TestClient::named(&relay, "alice").await?;

    relay.stop();
    alice.expect_closed().await?;

    // Listener is gone once the accept loop returns.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TestClient::connect(relay.addr).await.is_err());
    Ok(())
}
