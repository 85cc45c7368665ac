//! Attach runtime: connects a local terminal to a remote session.
//!
//! One task owns the [`TerminalSession`] and feeds it every inbound
//! envelope in order, so handlers never run concurrently. A spawned writer
//! task drains the channel's outbound queue into the socket. After each
//! envelope the runtime collects display write completions and paints the
//! `vt100` state diff onto the host terminal's alternate screen.
//!
//! On a dropped connection the session is told to disconnect, and the
//! runtime reconnects with doubling backoff and resubscribes from the last
//! known sequence.

// Rust guideline compliant 2026-02

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::{cursor, execute, terminal};
use tokio::sync::mpsc;

use crate::channel::{ConnectionState, Envelope, Route, WsChannel};
use crate::config::Config;
use crate::constants::{DEFAULT_COLS, DEFAULT_ROWS};
use crate::terminal::messages::{kind, parse_payload, WelcomePayload};
use crate::terminal::{Dispatch, TerminalSession, Vt100Display};
use crate::ws::{self, WsMessage, WsReader, WsWriter};

/// Parameters for one `attach` run.
#[derive(Debug, Clone)]
pub struct AttachOptions {
    /// Remote session to attach to.
    pub session_id: String,
    /// Effective configuration (server URL, engine tuning, backoff).
    pub config: Config,
}

/// Why a single connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionExit {
    /// Socket closed or errored; reconnect.
    Dropped,
    /// User interrupt or the remote session ended; stop.
    Shutdown,
}

type AttachSession = TerminalSession<Vt100Display>;

/// Run until the remote session ends or the user interrupts.
pub async fn run(options: AttachOptions) -> Result<()> {
    let AttachOptions { session_id, config } = options;

    let (cols, rows) = terminal::size().unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
    let display = Vt100Display::with_scrollback(rows, cols, config.terminal.scrollback_lines);
    let mut session = TerminalSession::new(session_id.clone(), display, config.terminal);

    let ended = Arc::new(AtomicBool::new(false));
    {
        let ended = Arc::clone(&ended);
        session.on_lifecycle(move |change| {
            log::info!(
                "[Attach] session {} finished: {:?}",
                change.session_id,
                change.status
            );
            ended.store(true, Ordering::SeqCst);
        });
    }

    let mut stdout = std::io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)
        .context("Failed to enter alternate screen")?;
    let _screen = scopeguard::guard((), |()| restore_terminal());

    let mut channel = WsChannel::new();
    let mut delay = config.reconnect.initial();
    let mut attempt: u32 = 0;

    log::info!("[Attach] attaching to {session_id} via {}", config.server_url);

    loop {
        channel.set_state(ConnectionState::Connecting);
        match ws::connect(&config.server_url).await {
            Ok((writer, reader)) => {
                log::info!("[Attach] connected");
                attempt = 0;
                delay = config.reconnect.initial();
                let exit =
                    run_connection(&mut session, &mut channel, writer, reader, &ended, &mut stdout)
                        .await?;
                if exit == ConnectionExit::Shutdown {
                    break;
                }
            }
            Err(e) => log::warn!("[Attach] connect failed: {e:#}"),
        }

        session.handle_disconnect();
        attempt += 1;
        channel.set_state(ConnectionState::Reconnecting {
            attempt,
            next_retry_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        });
        log::info!("[Attach] reconnecting in {delay:?} (attempt {attempt})");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("[Attach] interrupted while waiting to reconnect");
                break;
            }
        }
        delay = config.reconnect.next(delay);
    }

    session.detach();
    channel.set_state(ConnectionState::Disconnected);
    log::info!("[Attach] detached from {session_id}");
    Ok(())
}

async fn run_connection<W: Write>(
    session: &mut AttachSession,
    channel: &mut WsChannel,
    mut writer: WsWriter,
    mut reader: WsReader,
    ended: &AtomicBool,
    out: &mut W,
) -> Result<ConnectionExit> {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    channel.attach_sender(outbound_tx);

    let writer_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(text) = outbound_rx.recv() => {
                    if let Err(e) = writer.send_text(text).await {
                        log::warn!("[Attach] send failed: {e:#}");
                        break;
                    }
                }
                Some(data) = pong_rx.recv() => {
                    if let Err(e) = writer.send_pong(data).await {
                        log::warn!("[Attach] pong failed: {e:#}");
                        break;
                    }
                }
                else => break,
            }
        }
        if let Err(e) = writer.close().await {
            log::debug!("[Attach] writer close: {e:#}");
        }
    });

    subscribe(session, channel);
    session.display_mut().invalidate_render();
    render(session, out)?;

    let exit = loop {
        tokio::select! {
            message = reader.recv() => match message {
                Some(Ok(WsMessage::Text(text))) => handle_text(session, channel, &text),
                Some(Ok(WsMessage::Ping(data))) => {
                    if pong_tx.send(data).is_err() {
                        break ConnectionExit::Dropped;
                    }
                }
                Some(Ok(WsMessage::Binary(len))) => {
                    log::debug!("[Attach] ignoring {len}-byte binary frame");
                }
                Some(Ok(WsMessage::Close { code, reason })) => {
                    log::info!("[Attach] server closed connection ({code}): {reason}");
                    break ConnectionExit::Dropped;
                }
                Some(Err(e)) => {
                    log::warn!("[Attach] {e:#}");
                    break ConnectionExit::Dropped;
                }
                None => {
                    log::info!("[Attach] stream ended");
                    break ConnectionExit::Dropped;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("[Attach] interrupted");
                break ConnectionExit::Shutdown;
            }
        }

        session.poll_write_completions();
        render(session, out)?;

        if ended.load(Ordering::SeqCst) {
            break ConnectionExit::Shutdown;
        }
    };

    channel.detach_sender();
    drop(pong_tx);
    if let Err(e) = writer_task.await {
        log::warn!("[Attach] writer task failed: {e}");
    }
    Ok(exit)
}

fn handle_text(session: &mut AttachSession, channel: &mut WsChannel, text: &str) {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::warn!("[Attach] dropping non-envelope frame: {e}");
            return;
        }
    };

    if let Some(age) = envelope.age(chrono::Utc::now()) {
        log::trace!(
            "[Attach] {} {} ({}ms in transit)",
            envelope.topic,
            envelope.kind,
            age.num_milliseconds()
        );
    }

    if envelope.route() == Route::System && envelope.kind == kind::WELCOME {
        match parse_payload::<WelcomePayload>(kind::WELCOME, &envelope.payload) {
            Ok(welcome) => {
                channel.set_client_id(welcome.client_id);
                subscribe(session, channel);
            }
            Err(e) => log::warn!("[Attach] {e}"),
        }
        return;
    }

    if session.handle_envelope(&envelope, channel) == Dispatch::Failed {
        log::debug!("[Attach] {} {} not applied", envelope.topic, envelope.kind);
    }
}

fn subscribe(session: &mut AttachSession, channel: &mut WsChannel) {
    match session.attempt_subscription(channel) {
        Ok(attempt) => log::debug!("[Attach] subscribed: {attempt:?}"),
        Err(blocked) => log::debug!("[Attach] subscribe deferred: {blocked}"),
    }
}

fn render<W: Write>(session: &mut AttachSession, out: &mut W) -> Result<()> {
    let diff = session.display_mut().render_diff();
    if diff.is_empty() {
        return Ok(());
    }
    out.write_all(&diff).context("Failed to write to terminal")?;
    out.flush().context("Failed to flush terminal")
}

/// Leave the alternate screen and show the cursor.
pub fn restore_terminal() {
    if let Err(e) = execute!(std::io::stdout(), terminal::LeaveAlternateScreen, cursor::Show) {
        log::warn!("[Attach] terminal restore failed: {e}");
    }
}
