use std::sync::Arc;

use anyhow::Result;

use skychat_core::config::ServerConfig;
use skychat_core::wire;
use skychat_services::{SharedHistory, SqliteHistory};

use crate::{Relay, TestClient};

/// Alice and bob registered, alice talking to bob, three messages sent.
async fn conversation(relay: &Relay) -> Result<(TestClient, TestClient)> {
    let mut alice = TestClient::named(relay, "alice").await?;
    let mut bob = TestClient::named(relay, "bob").await?;
    alice.ask("/join bob").await?;
    for text in ["hello bob", "how are you", "bye bob"] {
        alice.send(&format!("/msg {text}")).await?;
        bob.line().await?;
    }
    Ok((alice, bob))
}

#[tokio::test]
async fn sent_messages_are_queryable() -> Result<()> {
    let relay = Relay::start().await?;
    let (mut alice, _bob) = conversation(&relay).await?;

    alice.send("get-m-from-me").await?;
    assert_eq!(alice.line().await?, "> #1 alice -> bob: hello bob");
    assert_eq!(alice.line().await?, "> #2 alice -> bob: how are you");
    assert_eq!(alice.line().await?, "> #3 alice -> bob: bye bob");
    Ok(())
}

#[tokio::test]
async fn history_answer_precedes_later_replies() -> Result<()> {
    let relay = Relay::start().await?;
    let (mut alice, _bob) = conversation(&relay).await?;

    for _ in 0..20 {
        // Both lines in one write so the relay reads them back to back.
        alice.send("get-m-from-me\n/list").await?;
        assert_eq!(alice.line().await?, "> #1 alice -> bob: hello bob");
        assert_eq!(alice.line().await?, "> #2 alice -> bob: how are you");
        assert_eq!(alice.line().await?, "> #3 alice -> bob: bye bob");
        assert_eq!(alice.line().await?, "> available users: bob");
    }

    alice.send("get-last 1\n/help\nget-contains nothing").await?;
    assert_eq!(alice.line().await?, "> #3 alice -> bob: bye bob");
    assert_eq!(alice.line().await?, "> Skychat : Chat Platform");
    let mut last = alice.line().await?;
    while last != format!("> {}", wire::NO_MESSAGES) {
        last = alice.line().await?;
    }
    Ok(())
}

#[tokio::test]
async fn received_messages_with_filters() -> Result<()> {
    let relay = Relay::start().await?;
    let (_alice, mut bob) = conversation(&relay).await?;

    bob.send("get-m-to-me ||contains bob").await?;
    assert_eq!(bob.line().await?, "> #1 alice -> bob: hello bob");
    assert_eq!(bob.line().await?, "> #3 alice -> bob: bye bob");

    assert_eq!(
        bob.ask("get-m-to-me ||last 1").await?,
        "> #3 alice -> bob: bye bob"
    );
    assert_eq!(
        bob.ask("get-m-from-me").await?,
        format!("> {}", wire::NO_MESSAGES)
    );
    Ok(())
}

#[tokio::test]
async fn last_and_contains() -> Result<()> {
    let relay = Relay::start().await?;
    let (mut alice, _bob) = conversation(&relay).await?;

    alice.send("get-last 2").await?;
    assert_eq!(alice.line().await?, "> #3 alice -> bob: bye bob");
    assert_eq!(alice.line().await?, "> #2 alice -> bob: how are you");

    assert_eq!(
        alice.ask("get-contains are").await?,
        "> #2 alice -> bob: how are you"
    );
    Ok(())
}

#[tokio::test]
async fn history_needs_a_name_and_valid_arguments() -> Result<()> {
    let relay = Relay::start().await?;
    let mut anon = relay.connect().await?;
    assert_eq!(
        anon.ask("get-m-to-me").await?,
        format!("> {}", wire::NAME_REQUIRED)
    );

    let mut alice = TestClient::named(&relay, "alice").await?;
    assert_eq!(alice.ask("get-last").await?, "err: usage: get-last <n>");
    assert_eq!(
        alice.ask("get-last many").await?,
        "err: expected a positive number, got 'many'"
    );
    assert_eq!(
        alice.ask("get-m-from-me ||first 2").await?,
        "err: unknown filter: ||first"
    );
    Ok(())
}

#[tokio::test]
async fn disabled_history() -> Result<()> {
    let relay = Relay::start_with(ServerConfig::default(), None).await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    assert_eq!(
        alice.ask("get-last 1").await?,
        format!("> {}", wire::HISTORY_DISABLED)
    );
    Ok(())
}

#[tokio::test]
async fn sqlite_backend_persists_messages() -> Result<()> {
    let path = std::env::temp_dir().join(format!(
        "skychat-integration-{}-{}.db",
        std::process::id(),
        line!()
    ));
    let _ = std::fs::remove_file(&path);

    {
        let store: SharedHistory = Arc::new(SqliteHistory::open(&path)?);
        let relay = Relay::start_with(ServerConfig::default(), Some(store)).await?;
        let (mut alice, _bob) = conversation(&relay).await?;
        // Query after the stores so they are known to be written.
        alice.send("get-m-from-me ||last 1").await?;
        assert_eq!(alice.line().await?, "> #3 alice -> bob: bye bob");
    }

    let store: SharedHistory = Arc::new(SqliteHistory::open(&path)?);
    let relay = Relay::start_with(ServerConfig::default(), Some(store)).await?;
    let mut alice = TestClient::named(&relay, "alice").await?;
    assert_eq!(
        alice.ask("get-contains hello").await?,
        "> #1 alice -> bob: hello bob"
    );

    drop(relay);
    let _ = std::fs::remove_file(&path);
    Ok(())
}
