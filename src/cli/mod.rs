//! Interactive terminal loop.
//!
//! [`run`] wires a [`Conversation`] to stdin/stdout and Ctrl-C.
//! [`run_loop`] holds the loop itself and is generic over its streams
//! and interrupt signal so tests can drive it with scripted input.

use std::future::Future;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::agent::{Conversation, TurnOutcome};
use crate::config::Config;
use crate::models;

const BANNER_START: &str = "\n=== Starting New Session ===\n\n";
const BANNER_ENDED: &str = "\n=== Session Ended ===\n\n";
const BANNER_INTERRUPTED: &str = "\n\n=== Session Interrupted ===\n\n";
const PROMPT: &str = "\n> ";

/// How the loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The conversation ended (farewell, end command or fatal API error).
    Ended,
    /// Input reached end-of-file.
    EndOfInput,
    /// The interrupt signal fired.
    Interrupted,
}

/// Run one interactive session on the terminal.
///
/// Startup failures (no API key, unreadable transcript) are returned as
/// errors; everything after the greeting ends gracefully.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let provider = models::build_provider(cfg)?;
    let mut conversation = Conversation::open(cfg, provider).await?;

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let exit = run_loop(&mut conversation, input, &mut output, interrupt).await?;
    info!(
        ?exit,
        exchanges = conversation.state().exchanges,
        path = %conversation.session_file().display(),
        "session finished"
    );
    Ok(())
}

/// Greeting, then one reply per non-empty input line until the session
/// ends, input runs out or `interrupt` resolves.
///
/// Per-turn errors (e.g. the transcript became unwritable) are logged
/// and reported on `output` after any reply; the loop keeps going.
pub async fn run_loop<R, W, F>(
    conversation: &mut Conversation,
    input: R,
    output: &mut W,
    interrupt: F,
) -> anyhow::Result<LoopExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut lines = input.lines();

    say(output, BANNER_START).await?;

    let greeting = tokio::select! {
        outcome = conversation.start_session() => outcome,
        _ = &mut interrupt => {
            conversation.close();
            say(output, BANNER_INTERRUPTED).await?;
            return Ok(LoopExit::Interrupted);
        }
    };
    match greeting {
        Ok(TurnOutcome::Reply(text)) => say(output, &format!("{text}\n")).await?,
        Ok(TurnOutcome::Unsaved { reply, error }) => {
            say(output, &format!("{reply}\n")).await?;
            report(output, &error).await?;
        }
        Ok(TurnOutcome::Ended(text)) => {
            if let Some(text) = text {
                say(output, &format!("{text}\n")).await?;
            }
            say(output, BANNER_ENDED).await?;
            return Ok(LoopExit::Ended);
        }
        Err(e) => {
            error!(error = %e, "greeting failed");
            report(output, &format!("{e:#}")).await?;
        }
    }

    loop {
        say(output, PROMPT).await?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("read input")?,
            _ = &mut interrupt => {
                conversation.close();
                say(output, BANNER_INTERRUPTED).await?;
                return Ok(LoopExit::Interrupted);
            }
        };
        let Some(line) = line else {
            conversation.close();
            say(output, BANNER_ENDED).await?;
            return Ok(LoopExit::EndOfInput);
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outcome = tokio::select! {
            outcome = conversation.chat(line) => outcome,
            _ = &mut interrupt => {
                conversation.close();
                say(output, BANNER_INTERRUPTED).await?;
                return Ok(LoopExit::Interrupted);
            }
        };

        match outcome {
            Ok(TurnOutcome::Reply(text)) => say(output, &format!("\n{text}\n")).await?,
            Ok(TurnOutcome::Unsaved { reply, error }) => {
                say(output, &format!("\n{reply}\n")).await?;
                report(output, &error).await?;
            }
            Ok(TurnOutcome::Ended(text)) => {
                if let Some(text) = text {
                    say(output, &format!("\n{text}\n")).await?;
                }
                say(output, BANNER_ENDED).await?;
                return Ok(LoopExit::Ended);
            }
            Err(e) => {
                error!(error = %e, "turn failed");
                report(output, &format!("{e:#}")).await?;
            }
        }
    }
}

async fn report<W: AsyncWrite + Unpin>(output: &mut W, error: &str) -> anyhow::Result<()> {
    say(output, &format!("\nAn error occurred: {error}\nPlease try again.\n")).await
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> anyhow::Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .context("write to terminal")?;
    output.flush().await.context("flush terminal")?;
    Ok(())
}
