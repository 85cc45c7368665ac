//! Subscribe handshake, reconnect, focus and seed handling.

mod common;

use common::{data, history, live_session, session, session_with, terminal, Op, RecordingChannel};
use serde_json::json;
use termsync::terminal::{
    SeedPolicy, SessionPhase, SubscribeBlocked, SubscriptionState, TerminalConfig,
};

#[test]
fn second_attempt_while_subscribed_sends_nothing() {
    let (mut session, mut channel) = live_session();
    assert!(session.is_subscribed());

    let result = session.attempt_subscription(&mut channel);
    assert_eq!(result, Err(SubscribeBlocked::AlreadySubscribed));
    assert_eq!(result.unwrap_err().as_str(), "already_subscribed");
    assert!(channel.sent.is_empty());
}

#[test]
fn first_attach_never_sends_resume_point() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();

    // Output seen before attaching still advances the tracker.
    session.handle_envelope(&data("early", 7), &mut channel);
    assert_eq!(session.last_sequence(), 7);

    let attempt = session.attempt_subscription(&mut channel).expect("subscribe");
    assert!(attempt.first_attach);
    let payload = channel.last_payload("terminal:subscribe").expect("sent");
    assert_eq!(payload, &json!({ "sessionId": "s1", "cols": 80, "rows": 24 }));
    assert!(session.expecting_seed());
}

#[test]
fn reconnect_sends_last_sequence() {
    let (mut session, mut channel) = live_session();
    session.handle_envelope(&data("x", 41), &mut channel);
    session.handle_envelope(&data("y", 42), &mut channel);

    session.handle_disconnect();
    assert_eq!(session.subscription_state(), SubscriptionState::Unsubscribed);

    let attempt = session.attempt_subscription(&mut channel).expect("resubscribe");
    assert!(!attempt.first_attach);
    assert_eq!(attempt.last_sequence, Some(42));
    let payload = channel.last_payload("terminal:subscribe").expect("sent");
    assert_eq!(payload["lastSequence"], 42);
    assert!(!session.expecting_seed());
}

#[test]
fn subscribe_is_followed_by_focus_claim() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");
    assert_eq!(channel.events(), vec!["terminal:subscribe", "terminal:focus"]);
    assert_eq!(
        channel.last_payload("terminal:focus"),
        Some(&json!({ "sessionId": "s1" }))
    );
    assert!(session.has_ever_subscribed());
    assert_eq!(session.subscription_state(), SubscriptionState::SubscribeAttempted);
}

#[test]
fn preconditions_block_without_side_effects() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    channel.connected = false;
    assert_eq!(
        session.attempt_subscription(&mut channel),
        Err(SubscribeBlocked::NotConnected)
    );

    channel.connected = true;
    session.display_mut().cols = 0;
    assert_eq!(
        session.attempt_subscription(&mut channel),
        Err(SubscribeBlocked::DisplayNotReady)
    );
    assert!(channel.sent.is_empty());
    assert!(!session.has_ever_subscribed());
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[test]
fn pending_attempt_blocks_duplicate() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");
    assert_eq!(
        session.attempt_subscription(&mut channel),
        Err(SubscribeBlocked::SubscribePending)
    );
    assert_eq!(channel.sent.len(), 2);
}

#[test]
fn failed_send_allows_retry_as_first_attach() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    channel.fail_sends = true;
    assert_eq!(
        session.attempt_subscription(&mut channel),
        Err(SubscribeBlocked::SendFailed)
    );
    assert!(!session.has_ever_subscribed());

    channel.fail_sends = false;
    let attempt = session.attempt_subscription(&mut channel).expect("retry");
    assert!(attempt.first_attach);
}

#[test]
fn subscribed_adopts_remote_sequence() {
    let (mut session, mut channel) = live_session();
    session.handle_envelope(&data("x", 90), &mut channel);
    session.handle_disconnect();
    session.attempt_subscription(&mut channel).expect("resubscribe");

    session.handle_envelope(&terminal("subscribed", json!({ "currentSequence": 12 })), &mut channel);
    assert_eq!(session.last_sequence(), 12);
    assert!(session.is_subscribed());
}

#[test]
fn reconnect_ack_flushes_pending_writes_joined() {
    let (mut session, mut channel) = live_session();
    session.handle_envelope(&history("HIST", 5), &mut channel);
    session.handle_envelope(&data("a", 6), &mut channel);
    session.handle_envelope(&data("b", 7), &mut channel);
    assert_eq!(session.pending_write_len(), 2);

    session.handle_disconnect();
    session.attempt_subscription(&mut channel).expect("resubscribe");
    session.handle_envelope(&terminal("subscribed", json!({})), &mut channel);

    assert_eq!(session.pending_write_len(), 0);
    assert_eq!(session.display().ops.last(), Some(&Op::Enqueue("ab".into())));
}

#[test]
fn disconnect_flushes_frames_held_for_fetch() {
    let (mut session, mut channel) = live_session();
    assert!(session.request_full_history(&mut channel));
    session.handle_envelope(&data("x", 1), &mut channel);
    session.handle_envelope(&data("y", -1), &mut channel);

    session.handle_disconnect();

    assert_eq!(session.phase(), SessionPhase::Live);
    assert_eq!(
        session.display().ops,
        vec![Op::Enqueue("x".into()), Op::Enqueue("y".into())]
    );
}

#[test]
fn disconnect_leaves_active_write_to_complete() {
    let (mut session, mut channel) = live_session();
    session.handle_envelope(&history("HIST", 5), &mut channel);
    session.handle_disconnect();
    assert!(matches!(session.phase(), SessionPhase::HistoryWriting { .. }));

    session.display_mut().ack_all();
    assert_eq!(session.poll_write_completions(), 1);
    assert_eq!(session.phase(), SessionPhase::Live);
}

#[test]
fn history_request_is_emitted_once() {
    let (mut session, mut channel) = live_session();
    assert!(session.request_full_history(&mut channel));
    assert!(!session.request_full_history(&mut channel));
    assert_eq!(channel.events(), vec!["terminal:request_history"]);
    assert_eq!(
        channel.last_payload("terminal:request_history"),
        Some(&json!({ "sessionId": "s1" }))
    );
}

#[test]
fn history_request_requires_subscription() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    assert!(!session.request_full_history(&mut channel));
    assert!(channel.sent.is_empty());
}

#[test]
fn failed_history_request_stops_buffering() {
    let (mut session, mut channel) = live_session();
    channel.fail_sends = true;
    assert!(!session.request_full_history(&mut channel));
    assert_eq!(session.phase(), SessionPhase::Live);
}

#[test]
fn scroll_to_top_needs_more_history() {
    let (mut session, mut channel) = live_session();
    assert!(!session.on_scrolled_to_top(&mut channel));

    session.handle_envelope(
        &terminal("full_history", json!({ "history": "H", "capturedSequence": 3, "hasHistory": true })),
        &mut channel,
    );
    session.display_mut().ack_all();
    session.poll_write_completions();

    assert!(session.on_scrolled_to_top(&mut channel));
    assert_eq!(session.phase(), SessionPhase::HistoryInFlight);
}

#[test]
fn focus_tracks_own_client_id() {
    let (mut session, mut channel) = live_session();
    session.handle_envelope(&terminal("focus_changed", json!({ "clientId": "me" })), &mut channel);
    assert!(session.is_authority());

    session.handle_envelope(&terminal("focus_changed", json!({ "clientId": "other" })), &mut channel);
    assert!(!session.is_authority());

    session.handle_envelope(&terminal("focus_changed", json!({ "clientId": null })), &mut channel);
    assert!(!session.is_authority());
}

#[test]
fn focus_without_own_identity_is_never_authority() {
    let (mut session, mut channel) = live_session();
    channel.id = None;
    session.handle_envelope(&terminal("focus_changed", json!({ "clientId": null })), &mut channel);
    assert!(!session.is_authority());
}

#[test]
fn out_of_order_seed_renders_in_index_order() {
    let mut session = session_with(TerminalConfig {
        seed_policy: SeedPolicy::Render,
        ..TerminalConfig::default()
    });
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");
    session.handle_envelope(&terminal("subscribed", json!({})), &mut channel);

    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 1, "totalChunks": 2, "data": "B" })),
        &mut channel,
    );
    assert!(session.expecting_seed());
    assert!(session.display().ops.is_empty());

    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 0, "totalChunks": 2, "data": "A" })),
        &mut channel,
    );
    assert_eq!(session.display().written(), vec!["AB"]);
    assert!(!session.expecting_seed());
}

#[test]
fn bad_seed_chunk_does_not_abort_assembly() {
    let mut session = session_with(TerminalConfig {
        seed_policy: SeedPolicy::Render,
        ..TerminalConfig::default()
    });
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");

    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 0, "totalChunks": 2, "data": "A" })),
        &mut channel,
    );
    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 7, "totalChunks": 2, "data": "Z" })),
        &mut channel,
    );
    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 1, "totalChunks": 2, "data": "B" })),
        &mut channel,
    );
    assert_eq!(session.display().written(), vec!["AB"]);
}

#[test]
fn snapshot_supersedes_pending_seed() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");
    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 0, "totalChunks": 2, "data": "A" })),
        &mut channel,
    );

    session.handle_envelope(&history("HIST", 5), &mut channel);
    assert!(!session.expecting_seed());

    session.display_mut().ack_all();
    session.poll_write_completions();
    assert_eq!(session.phase(), SessionPhase::Live);

    // A straggling chunk no longer completes a seed.
    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 1, "totalChunks": 2, "data": "B" })),
        &mut channel,
    );
    assert_eq!(session.display().written(), vec!["HIST"]);
}

#[test]
fn resubscribe_during_seed_skips_it() {
    let mut session = session();
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");
    session.handle_envelope(
        &terminal("seed_ansi", json!({ "chunk": 0, "totalChunks": 2, "data": "A" })),
        &mut channel,
    );

    session.handle_disconnect();
    session.attempt_subscription(&mut channel).expect("resubscribe");
    assert_eq!(session.phase(), SessionPhase::Live);

    session.handle_envelope(&data("live", 1), &mut channel);
    assert_eq!(session.display().written(), vec!["live"]);
}
