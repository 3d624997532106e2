//! End-to-end session behavior over the loopback transport.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mimic_hostd::chat::ChatEvent;
use mimic_hostd::orchestrator::session::BotSession;
use mimic_hostd::AppError;

use super::test_helpers as helpers;

fn chat_event(channel: &str, text: &str) -> ChatEvent {
    ChatEvent {
        channel: channel.to_owned(),
        author: "alice".to_owned(),
        text: text.to_owned(),
    }
}

#[tokio::test]
async fn replies_to_inbound_event_when_probability_is_one() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let identity = helpers::test_identity(1);
    let mut peer = connector.register(&identity.bot_token).await;
    let cancel = CancellationToken::new();

    let session = BotSession::new(
        identity,
        helpers::fast_settings(1.0),
        store,
        connector,
        helpers::canned_generator("hello there"),
        repo,
        Duration::from_secs(60),
        cancel.clone(),
    );
    let join = tokio::spawn(session.run());

    peer.events
        .send(chat_event("general", "hi bot"))
        .await
        .expect("event delivered");

    let reply = tokio::time::timeout(Duration::from_secs(5), peer.outbound.recv())
        .await
        .expect("reply before timeout")
        .expect("outbound open");
    assert_eq!(reply.channel, "general");
    assert_eq!(reply.text, "hello there");

    cancel.cancel();
    join.await.expect("join").expect("session exits cleanly");
}

#[tokio::test]
async fn never_replies_when_probability_is_zero() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let identity = helpers::test_identity(1);
    let mut peer = connector.register(&identity.bot_token).await;
    let cancel = CancellationToken::new();

    let session = BotSession::new(
        identity,
        helpers::fast_settings(0.0),
        store,
        connector,
        helpers::canned_generator("should never appear"),
        repo,
        Duration::from_secs(60),
        cancel.clone(),
    );
    let join = tokio::spawn(session.run());

    for n in 0..5 {
        peer.events
            .send(chat_event("general", &format!("message {n}")))
            .await
            .expect("event delivered");
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(
        peer.outbound.try_recv().is_err(),
        "probability 0 must suppress every reply"
    );

    cancel.cancel();
    join.await.expect("join").expect("session exits cleanly");
}

#[tokio::test]
async fn generated_reply_respects_max_sentence_length() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let identity = helpers::test_identity(1);
    let mut peer = connector.register(&identity.bot_token).await;
    let cancel = CancellationToken::new();

    let mut settings = helpers::fast_settings(1.0);
    settings.max_sentence_length = 5;

    let session = BotSession::new(
        identity,
        settings,
        store,
        connector,
        helpers::canned_generator("a much longer canned line"),
        repo,
        Duration::from_secs(60),
        cancel.clone(),
    );
    let join = tokio::spawn(session.run());

    peer.events
        .send(chat_event("general", "hi"))
        .await
        .expect("event delivered");

    let reply = tokio::time::timeout(Duration::from_secs(5), peer.outbound.recv())
        .await
        .expect("reply before timeout")
        .expect("outbound open");
    assert_eq!(reply.text, "a muc");

    cancel.cancel();
    join.await.expect("join").expect("session exits cleanly");
}

#[tokio::test]
async fn starts_conversations_on_last_seen_channel() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let identity = helpers::test_identity(1);
    let mut peer = connector.register(&identity.bot_token).await;
    let cancel = CancellationToken::new();

    // Zero conversation wait: the self-start timer fires continuously.
    let mut settings = helpers::fast_settings(1.0);
    settings.new_conversation_min_wait = 0;
    settings.new_conversation_max_wait = 0;

    let session = BotSession::new(
        identity,
        settings,
        store,
        connector,
        helpers::canned_generator("unprompted thought"),
        repo,
        Duration::from_secs(60),
        cancel.clone(),
    );
    let join = tokio::spawn(session.run());

    // Seed the last-seen channel with one inbound event.
    peer.events
        .send(chat_event("lounge", "hello"))
        .await
        .expect("event delivered");

    // The direct reply plus at least one unsolicited message.
    let mut lounge_messages = 0;
    for _ in 0..2 {
        let message = tokio::time::timeout(Duration::from_secs(5), peer.outbound.recv())
            .await
            .expect("message before timeout")
            .expect("outbound open");
        assert_eq!(message.channel, "lounge");
        lounge_messages += 1;
    }
    assert_eq!(lounge_messages, 2);

    cancel.cancel();
    join.await.expect("join").expect("session exits cleanly");
}

#[tokio::test]
async fn quiet_mode_suppresses_unsolicited_conversations() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let identity = helpers::test_identity(1);
    let mut peer = connector.register(&identity.bot_token).await;
    let cancel = CancellationToken::new();

    let mut settings = helpers::fast_settings(1.0);
    settings.new_conversation_min_wait = 0;
    settings.new_conversation_max_wait = 0;
    settings.quiet_mode = true;

    let session = BotSession::new(
        identity,
        settings,
        store,
        connector,
        helpers::canned_generator("reply"),
        repo,
        Duration::from_secs(60),
        cancel.clone(),
    );
    let join = tokio::spawn(session.run());

    peer.events
        .send(chat_event("lounge", "hello"))
        .await
        .expect("event delivered");

    // The direct reply still arrives.
    let reply = tokio::time::timeout(Duration::from_secs(5), peer.outbound.recv())
        .await
        .expect("reply before timeout")
        .expect("outbound open");
    assert_eq!(reply.text, "reply");

    // But nothing unsolicited follows, despite the zero wait.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        peer.outbound.try_recv().is_err(),
        "quiet mode must suppress self-started conversations"
    );

    cancel.cancel();
    join.await.expect("join").expect("session exits cleanly");
}

#[tokio::test]
async fn unknown_token_fails_connection() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let cancel = CancellationToken::new();

    let session = BotSession::new(
        helpers::test_identity(9),
        helpers::fast_settings(1.0),
        store,
        connector,
        helpers::canned_generator("x"),
        repo,
        Duration::from_secs(60),
        cancel,
    );

    let result = session.run().await;
    assert!(matches!(result, Err(AppError::Connect(_))));
}

#[tokio::test]
async fn session_exits_when_event_stream_closes() {
    let connector = helpers::loopback();
    let (store, _store_dir) = helpers::temp_store();
    let repo = helpers::memory_repo().await;
    let identity = helpers::test_identity(1);
    let peer = connector.register(&identity.bot_token).await;
    let cancel = CancellationToken::new();

    let session = BotSession::new(
        identity,
        helpers::fast_settings(0.0),
        store,
        connector,
        helpers::canned_generator("x"),
        repo,
        Duration::from_secs(60),
        cancel,
    );
    let join = tokio::spawn(session.run());

    // Dropping the peer closes the inbound event channel.
    drop(peer);

    let result = tokio::time::timeout(Duration::from_secs(5), join)
        .await
        .expect("session exits after stream close")
        .expect("join");
    assert!(result.is_ok());
}
