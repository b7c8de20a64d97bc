use std::io::{self, Write};
use std::sync::Arc;

use dashchat::chat::{
    ChatError, ChatSession, DashboardFilters, EntryId, HostBindings, HostState, SubmitOutcome,
    Theme,
};
use dashchat::render::{render_entry, render_transcript};
use dashchat::settings::SettingsStore;
use dashchat_transport::{ConversationId, TransportError, create_transport};
use snafu::{ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Snafu)]
enum AppError {
    #[snafu(display("failed to build transport on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: TransportError,
    },
    #[snafu(display("failed to start chat session on `{stage}`: {source}"))]
    Session {
        stage: &'static str,
        source: ChatError,
    },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: io::Error,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Submit(String),
    Ask(String),
    Toggle(EntryId),
    Stop,
    Show,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Command::Submit(line.to_string()));
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "ask" => Some(Command::Ask(rest.trim().to_string())),
        "toggle" => rest.trim().parse().ok().map(|raw| Command::Toggle(EntryId::new(raw))),
        "stop" => Some(Command::Stop),
        "show" => Some(Command::Show),
        "quit" | "exit" => Some(Command::Quit),
        _ => Some(Command::Help),
    }
}

const HELP: &str = "commands: <text> | /ask <text> | /toggle <id> | /stop | /show | /quit";

fn host_bindings(store: &Arc<SettingsStore>) -> HostBindings {
    let filters = HostState::new(DashboardFilters::default(), |filters: &DashboardFilters| {
        tracing::info!(filters = ?filters, "dashboard filters changed");
    });

    let theme_store = Arc::clone(store);
    let theme = HostState::new(store.settings().theme, move |theme: &Theme| {
        tracing::info!(theme = %theme, "theme changed");
        let mut settings = (*theme_store.settings()).clone();
        settings.theme = *theme;
        if let Err(error) = theme_store.update(settings) {
            tracing::warn!(error = %error, "failed to persist theme");
        }
    });

    HostBindings::new(filters, theme)
}

/// Prints entries that stopped changing since the last call.
fn flush_finalized(
    session: &ChatSession,
    printed: &mut usize,
    out: &mut impl Write,
) -> io::Result<()> {
    for entry in &session.transcript().entries()[*printed..] {
        if entry.is_streaming {
            break;
        }
        writeln!(out, "{}\n", render_entry(entry))?;
        *printed += 1;
    }
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(error = %error, "failed to read stdin");
                    break;
                }
            }
        }
    });
    line_rx
}

/// Feeds input lines to the session until `/quit` or end of input.
///
/// End of input lets the exchange in flight finish, so piped questions still
/// get their answer.
async fn drive(
    session: &mut ChatSession,
    mut lines: mpsc::UnboundedReceiver<String>,
    out: &mut impl Write,
) -> io::Result<()> {
    let mut printed = 0;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    session.run_until_idle().await;
                    break;
                };
                match parse_command(&line) {
                    None => {}
                    Some(Command::Submit(text)) => {
                        if let SubmitOutcome::Opened(target) = session.submit(&text) {
                            tracing::debug!(target = %target, "waiting for assistant");
                        }
                    }
                    Some(Command::Ask(text)) => {
                        session.ask(&text).await;
                    }
                    Some(Command::Toggle(id)) => {
                        if session.toggle_expanded(id) {
                            if let Some(entry) = session.transcript().get(id) {
                                writeln!(out, "{}\n", render_entry(entry))?;
                            }
                        } else {
                            writeln!(out, "no results entry with id {}\n", id.0)?;
                        }
                    }
                    Some(Command::Stop) => {
                        session.close();
                    }
                    Some(Command::Show) => {
                        writeln!(out, "{}\n", render_transcript(session.transcript()))?;
                    }
                    Some(Command::Quit) => break,
                    Some(Command::Help) => writeln!(out, "{HELP}\n")?,
                }
            }
            Some(frame) = session.next_frame() => {
                session.handle_frame(frame);
            }
        }
        flush_finalized(session, &mut printed, out)?;
    }

    session.close();
    flush_finalized(session, &mut printed, out)
}

async fn run() -> Result<(), AppError> {
    let store = Arc::new(SettingsStore::load());
    let settings = store.settings();
    tracing::info!(
        endpoint = %settings.endpoint,
        config = ?store.config_path(),
        "starting dashboard chat"
    );

    let transport = create_transport(settings.to_transport_config()).context(TransportSnafu {
        stage: "create-transport",
    })?;
    let mut session = ChatSession::new(ConversationId::new(1), transport, host_bindings(&store))
        .context(SessionSnafu {
            stage: "create-session",
        })?;

    let mut out = io::stdout();
    writeln!(out, "{HELP}\n").context(WriteOutputSnafu {
        stage: "print-help",
    })?;
    drive(&mut session, spawn_stdin_reader(), &mut out)
        .await
        .context(WriteOutputSnafu {
            stage: "print-transcript",
        })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        tracing::error!(error = %error, "dashboard chat exited with an error");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use dashchat_transport::{
        BoxFuture, ChatReply, ChatTransport, StreamFrame, StreamHandle, StreamRequest,
        StreamWorker, TransportResult, make_frame_stream,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    /// Answers every stream with a fixed reply as soon as the worker runs.
    struct CannedTransport;

    impl ChatTransport for CannedTransport {
        fn name(&self) -> &str {
            "canned"
        }

        fn open_stream(&self, request: StreamRequest) -> TransportResult<StreamHandle> {
            let target = request.target;
            let (frame_tx, stream, cancel_rx) = make_frame_stream(target);
            let worker: StreamWorker = Box::pin(async move {
                for payload in [
                    r#"{"type":"RUN_STARTED"}"#,
                    r#"{"type":"TEXT_MESSAGE_START"}"#,
                    r#"{"type":"TEXT_MESSAGE_CONTENT","delta":"Anal"}"#,
                    r#"{"type":"TEXT_MESSAGE_CONTENT","delta":"isando..."}"#,
                    r#"{"type":"TEXT_MESSAGE_END"}"#,
                    r#"{"type":"RUN_FINISHED"}"#,
                ] {
                    if frame_tx.send(StreamFrame::data(target, payload)).is_err() {
                        return;
                    }
                }
                let _ = cancel_rx.await;
            });
            Ok(StreamHandle { stream, worker })
        }

        fn ask<'a>(&'a self, _message: &'a str) -> BoxFuture<'a, TransportResult<ChatReply>> {
            Box::pin(async { Ok(ChatReply::default()) })
        }
    }

    #[tokio::test]
    async fn end_of_input_waits_for_the_reply_in_flight() {
        let mut session = ChatSession::new(
            ConversationId::new(1),
            Arc::new(CannedTransport),
            HostBindings::detached(),
        )
        .unwrap();
        let (line_tx, lines) = mpsc::unbounded_channel();
        line_tx.send("vendas de março".to_string()).unwrap();
        drop(line_tx);

        let mut out = Vec::new();
        drive(&mut session, lines, &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(printed, "[1] > vendas de março\n\n[2] Analisando...\n\n");
        assert!(!session.is_pending());
    }

    #[test]
    fn commands_are_parsed() {
        assert_eq!(
            parse_command("  vendas de março "),
            Some(Command::Submit("vendas de março".to_string()))
        );
        assert_eq!(
            parse_command("/ask total por categoria"),
            Some(Command::Ask("total por categoria".to_string()))
        );
        assert_eq!(
            parse_command("/toggle 4"),
            Some(Command::Toggle(EntryId::new(4)))
        );
        assert_eq!(parse_command("/toggle x"), None);
        assert_eq!(parse_command("/quit"), Some(Command::Quit));
        assert_eq!(parse_command("/nope"), Some(Command::Help));
        assert_eq!(parse_command("   "), None);
    }
}
