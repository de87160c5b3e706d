//! Stdin/stdout JSON loop for the search host.
//!
//! Reads newline-delimited [`HostCommand`]s and writes [`HostEvent`]s as
//! newline-delimited JSON. Stdout is reserved for the protocol; tracing
//! goes to stderr.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::SearchHost;
use super::contract::{HostCommand, HostEvent};
use crate::config::QsbConfig;
use crate::error::Result;

/// Coalesces keystrokes: only the last text typed within the delay of the
/// previous one is issued.
#[derive(Debug)]
pub struct TypingDebounce {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl TypingDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Records a keystroke at `now`, replacing any text not yet issued.
    pub fn push(&mut self, text: String, now: Instant) {
        self.pending = Some((text, now + self.delay));
    }

    /// When the pending text is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Takes the pending text if it is due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, at)) if *at <= now => self.pending.take().map(|(text, _)| text),
            _ => None,
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Runs the host on stdin/stdout until stdin closes or `runtime.stop`.
///
/// # Errors
///
/// Returns an error if the host cannot be built or stdio fails.
pub async fn run_stdio_host(config: QsbConfig) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    run_session(config, stdin, stdout).await
}

/// Runs the host over any line reader and writer.
///
/// # Errors
///
/// Returns an error if the host cannot be built or I/O fails.
pub async fn run_session<R, W>(config: QsbConfig, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut debounce = TypingDebounce::new(config.suggest.typing_update_suggestions_delay());
    let host = SearchHost::new(config, tx)?;
    let mut lines = reader.lines();

    let outcome: Result<()> = loop {
        let deadline = debounce.deadline();
        tokio::select! {
            biased;
            Some(event) = events.recv() => {
                if let Err(e) = write_event(&mut writer, &event).await {
                    break Err(e);
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(text) = debounce.take_due(Instant::now()) {
                    host.update_query(&text);
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::info!("stdin closed; stopping");
                        break Ok(());
                    }
                    Err(e) => break Err(e.into()),
                };
                match handle_line(&host, &mut debounce, line.trim()) {
                    Flow::Continue => {}
                    Flow::Stop => {
                        tracing::info!("runtime.stop received; stopping");
                        break Ok(());
                    }
                }
            }
        }
    };

    let shutdown = host.shutdown();
    drop(host);
    while let Ok(event) = events.try_recv() {
        write_event(&mut writer, &event).await?;
    }
    outcome.and(shutdown)
}

fn handle_line(host: &SearchHost, debounce: &mut TypingDebounce, line: &str) -> Flow {
    if line.is_empty() {
        return Flow::Continue;
    }
    let command: HostCommand = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable command");
            host.emit(HostEvent::Error {
                message: format!("invalid command: {e}"),
            });
            return Flow::Continue;
        }
    };

    let result = match command {
        HostCommand::QueryUpdate { text } => {
            debounce.push(text, Instant::now());
            Ok(())
        }
        HostCommand::Click { position } => host
            .click(position)
            .map(|row| host.emit(HostEvent::Launch { row })),
        HostCommand::SelectCorpus { name } => host.select_corpus(name.as_deref()),
        HostCommand::ViewCorpus { name } => host.view_corpus(name.as_deref()),
        HostCommand::EnableCorpus { name, enabled } => {
            host.set_corpus_enabled(&name, enabled).map(|()| {
                host.emit(HostEvent::Corpora {
                    corpora: host.corpora(),
                })
            })
        }
        HostCommand::ListCorpora => {
            host.emit(HostEvent::Corpora {
                corpora: host.corpora(),
            });
            Ok(())
        }
        HostCommand::ClearHistory => {
            host.clear_history();
            Ok(())
        }
        HostCommand::Stop => return Flow::Stop,
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "command failed");
        host.emit(HostEvent::Error {
            message: e.to_string(),
        });
    }
    Flow::Continue
}

async fn write_event<W: AsyncWrite + Unpin>(writer: &mut W, event: &HostEvent) -> Result<()> {
    let json = serde_json::to_string(event)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
