//! Session driving the real `vt100` display.

mod common;

use common::RecordingChannel;
use serde_json::json;
use termsync::terminal::{SessionPhase, TerminalConfig, TerminalSession, Vt100Display};
use termsync::{Envelope, TerminalDisplay};

fn envelope(kind: &str, payload: serde_json::Value) -> Envelope {
    Envelope::new("terminal/s1", kind, payload)
}

fn attached() -> (TerminalSession<Vt100Display>, RecordingChannel) {
    let display = Vt100Display::with_scrollback(5, 40, 1000);
    let mut session = TerminalSession::new("s1", display, TerminalConfig::default());
    let mut channel = RecordingChannel::connected();
    session.attempt_subscription(&mut channel).expect("subscribe");
    session.handle_envelope(&envelope("subscribed", json!({})), &mut channel);
    session.handle_envelope(
        &envelope("seed_ansi", json!({ "chunk": 0, "totalChunks": 1, "data": "" })),
        &mut channel,
    );
    (session, channel)
}

#[test]
fn history_then_newer_output_lands_on_screen_once() {
    let (mut session, mut channel) = attached();
    assert!(session.request_full_history(&mut channel));

    session.handle_envelope(
        &envelope("data", json!({ "data": "old\r\n", "sequence": 2 })),
        &mut channel,
    );
    session.handle_envelope(
        &envelope("data", json!({ "data": "new\r\n", "sequence": 4 })),
        &mut channel,
    );
    session.handle_envelope(
        &envelope(
            "full_history",
            json!({ "history": "line1\r\nold\r\n", "capturedSequence": 3 }),
        ),
        &mut channel,
    );
    assert_eq!(session.poll_write_completions(), 1);
    assert_eq!(session.phase(), SessionPhase::Live);

    let contents = session.display().contents();
    assert_eq!(contents.matches("old").count(), 1);
    assert!(contents.contains("line1"));
    assert!(contents.contains("new"));
}

#[test]
fn history_reload_preserves_scrollback_offset() {
    let (mut session, mut channel) = attached();
    for i in 0..30 {
        session.handle_envelope(
            &envelope("data", json!({ "data": format!("row {i}\r\n"), "sequence": i + 1 })),
            &mut channel,
        );
    }
    let bottom = session.display_mut().scroll_position();
    session.display_mut().scroll_to_line(bottom.base_y - 4);

    let mut snapshot = String::new();
    for i in 0..30 {
        snapshot.push_str(&format!("row {i}\r\n"));
    }
    session.handle_envelope(
        &envelope(
            "full_history",
            json!({ "history": snapshot, "capturedSequence": 30 }),
        ),
        &mut channel,
    );
    session.poll_write_completions();

    let position = session.display_mut().scroll_position();
    assert_eq!(position.base_y - position.viewport_y, 4);
}

#[test]
fn history_reload_restores_offset_deeper_than_screen() {
    let (mut session, mut channel) = attached();
    let mut snapshot = String::new();
    for i in 0..30 {
        let row = format!("row {i}\r\n");
        session.handle_envelope(
            &envelope("data", json!({ "data": row, "sequence": i + 1 })),
            &mut channel,
        );
        snapshot.push_str(&row);
    }
    session.display_mut().scroll_to_line(4);
    let before = session.display_mut().scroll_position();
    assert!(before.base_y - before.viewport_y > usize::from(session.display().rows()));

    session.handle_envelope(
        &envelope(
            "full_history",
            json!({ "history": snapshot, "capturedSequence": 30 }),
        ),
        &mut channel,
    );
    assert_eq!(session.poll_write_completions(), 1);

    let after = session.display_mut().scroll_position();
    assert_eq!(after.base_y - after.viewport_y, before.base_y - before.viewport_y);
    assert!(!session.display_mut().render_diff().is_empty());
    assert!(session.display().contents().contains("row"));
}

#[test]
fn history_cursor_is_applied_after_write() {
    let (mut session, mut channel) = attached();
    session.handle_envelope(
        &envelope(
            "full_history",
            json!({ "history": "$ ls\r\n$ ", "capturedSequence": 5, "cursorX": 1, "cursorY": 0 }),
        ),
        &mut channel,
    );
    session.poll_write_completions();
    assert_eq!(session.display().screen().cursor_position(), (0, 1));
}
