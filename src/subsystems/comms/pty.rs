//! PTY (console) channel: reads lines from stdin, runs each through the
//! orchestrator, prints the outcome to stdout.
//!
//! Runs until `exit`/`quit`, end of input, or the `shutdown` token is
//! cancelled (Ctrl-C).

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::orchestrator::Orchestrator;
use crate::subsystems::router::SessionState;

use super::{Channel, ChannelFuture};

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye", "q"];

pub struct PtyChannel {
    channel_id: String,
    banner: String,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, name: &str) -> Self {
        Self {
            channel_id: channel_id.into(),
            banner: format!(
                "─────────────────────────────────\n {name} console  (type 'help', 'exit' or Ctrl-C to quit)\n─────────────────────────────────"
            ),
        }
    }
}

impl Channel for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            run_console(&self.channel_id, &self.banner, stdin, stdout, orchestrator, shutdown).await
        })
    }
}

/// Console loop over arbitrary reader/writer so it can be driven in tests.
pub async fn run_console<R, W>(
    channel_id: &str,
    banner: &str,
    input: R,
    mut output: W,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(%channel_id, "pty channel started");
    let mut lines = input.lines();
    let mut session = SessionState::new();

    emit(&mut output, &format!("{banner}\n")).await?;

    loop {
        emit(&mut output, "> ").await?;

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                emit(&mut output, "\n[pty] shutdown signal received, closing console\n").await?;
                info!("pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => input.trim().to_string(),
                };
                if input.is_empty() {
                    continue;
                }
                if EXIT_WORDS.contains(&input.to_ascii_lowercase().as_str()) {
                    emit(&mut output, "Goodbye. Your progress is saved.\n").await?;
                    break;
                }

                debug!(input = %input, "pty received line");
                let reply = match orchestrator.handle(&input, &mut session).await {
                    Ok(outcome) => outcome.to_string(),
                    Err(e) => render_error(&e),
                };
                emit(&mut output, &format!("{reply}\n")).await?;
            }
        }
    }

    info!(%channel_id, "pty channel stopped");
    Ok(())
}

fn render_error(e: &AppError) -> String {
    match e.hint() {
        Some(hint) => format!("Error: {e}\n{hint}"),
        None => format!("Error: {e}"),
    }
}

async fn emit<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<(), AppError> {
    output
        .write_all(text.as_bytes())
        .await
        .map_err(|e| AppError::Comms(format!("console write failed: {e}")))?;
    output
        .flush()
        .await
        .map_err(|e| AppError::Comms(format!("console flush failed: {e}")))
}
