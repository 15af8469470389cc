//! Integration tests: the terminal loop driven with scripted input.

mod support;

use eli::agent::Conversation;
use eli::cli::{run_loop, LoopExit};
use eli::persona::FALLBACK_REPLY;
use support::{config_for, read, ScriptedProvider};
use tempfile::TempDir;

const START: &str = "\n=== Starting New Session ===\n\n";
const ENDED: &str = "\n=== Session Ended ===\n\n";
const INTERRUPTED: &str = "\n\n=== Session Interrupted ===\n\n";

async fn open(dir: &TempDir, replies: &[Result<&str, &str>]) -> Conversation {
    let file = dir.path().join("session.txt");
    let (provider, _trace) = ScriptedProvider::new(replies);
    Conversation::open(&config_for(&file), Box::new(provider))
        .await
        .unwrap()
}

fn text(output: Vec<u8>) -> String {
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn end_command_closes_loop() {
    let dir = TempDir::new().unwrap();
    let mut conv = open(&dir, &[Ok("Hi, I'm Eli."), Ok("Nice to hear.")]).await;
    let mut output = Vec::new();

    let exit = run_loop(
        &mut conv,
        &b"\nhello there\n/quit\n"[..],
        &mut output,
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(exit, LoopExit::Ended);
    assert!(!conv.state().is_active);
    // The blank line only re-prompts.
    assert_eq!(
        text(output),
        format!("{START}Hi, I'm Eli.\n\n> \n> \nNice to hear.\n\n> {ENDED}")
    );
    assert!(read(conv.session_file()).ends_with("User: hello there\nEli: Nice to hear.\n"));
}

#[tokio::test]
async fn end_of_input_closes_loop() {
    let dir = TempDir::new().unwrap();
    let mut conv = open(&dir, &[Ok("Hi."), Ok("Go on.")]).await;
    let mut output = Vec::new();

    let exit = run_loop(&mut conv, &b"how are you\n"[..], &mut output, std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(exit, LoopExit::EndOfInput);
    assert!(!conv.state().is_active);
    assert!(text(output).ends_with(&format!("\nGo on.\n\n> {ENDED}")));
}

#[tokio::test]
async fn farewell_prints_goodbye_and_stops_reading() {
    let dir = TempDir::new().unwrap();
    let mut conv = open(&dir, &[Ok("Hi."), Ok("Take care.")]).await;
    let mut output = Vec::new();

    let exit = run_loop(
        &mut conv,
        &b"bye for now\nnever read\n"[..],
        &mut output,
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(exit, LoopExit::Ended);
    assert!(text(output).ends_with(&format!("\nTake care.\n{ENDED}")));
    let transcript = read(conv.session_file());
    assert!(transcript.ends_with("User: bye for now\nEli: Take care.\n"));
    assert!(!transcript.contains("never read"));
}

#[tokio::test]
async fn interrupt_ends_session() {
    let dir = TempDir::new().unwrap();
    let mut conv = open(&dir, &[Ok("Hi.")]).await;
    let mut output = Vec::new();
    // Input that never arrives; the writer half keeps it open.
    let (_writer, reader) = tokio::io::duplex(64);

    let exit = run_loop(
        &mut conv,
        tokio::io::BufReader::new(reader),
        &mut output,
        async {},
    )
    .await
    .unwrap();

    assert_eq!(exit, LoopExit::Interrupted);
    assert!(!conv.state().is_active);
    let output = text(output);
    assert!(output.starts_with(START));
    assert!(output.ends_with(INTERRUPTED));
}

#[tokio::test]
async fn permanent_error_on_greeting_ends_loop() {
    let dir = TempDir::new().unwrap();
    let mut conv = open(&dir, &[Err("Anthropic API returned 403 Forbidden: no access")]).await;
    let mut output = Vec::new();

    let exit = run_loop(&mut conv, &b"hello\n"[..], &mut output, std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(exit, LoopExit::Ended);
    assert_eq!(text(output), format!("{START}{FALLBACK_REPLY}\n{ENDED}"));
}

#[tokio::test]
async fn write_failures_are_reported_and_loop_continues() {
    let dir = TempDir::new().unwrap();
    let mut conv = open(&dir, &[Ok("Hi."), Ok("Still here.")]).await;
    // The transcript disappears after startup; appends now fail.
    std::fs::remove_file(conv.session_file()).unwrap();
    let mut output = Vec::new();

    let exit = run_loop(&mut conv, &b"are you there\n"[..], &mut output, std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(exit, LoopExit::EndOfInput);
    let output = text(output);
    // Replies still reach the user, each followed by the write error.
    assert!(output.contains(&format!("{START}Hi.\n\nAn error occurred: ")));
    assert!(output.contains("\nStill here.\n\nAn error occurred: "));
    assert_eq!(output.matches("Please try again.\n").count(), 2);
    assert!(output.ends_with(ENDED));
}
