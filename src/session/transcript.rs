//! Plain-text transcript format.
//!
//! ```text
//! # Therapy Session History
//!
//! --- Session: 2026-10-16T09:30:00Z ---
//! Client Name: Sam
//! Eli: Welcome back, Sam.
//! User: I had a rough week.
//! ```
//!
//! Rendering is strict, parsing is lenient: lines that are not a marker
//! either continue the previous turn or, before the first turn, are
//! ignored.  Older free-text logs therefore still parse.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::persona;

const SESSION_PREFIX: &str = "--- Session: ";
const SESSION_SUFFIX: &str = " ---";
const CLIENT_NAME_PREFIX: &str = "Client Name: ";

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Line label written in front of the turn text.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => persona::NAME,
        }
    }

    /// Role name used by the chat APIs.
    pub fn api_role(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-labelled unit of conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// `"<Label>: <text>\n"`, with trailing whitespace of `text` dropped.
    pub fn render(&self) -> String {
        format!("{}: {}\n", self.role.label(), self.text.trim_end())
    }
}

/// Header line that opens a session, preceded by a blank line.
pub fn session_header(started_at: &DateTime<Utc>, client_name: Option<&str>) -> String {
    let mut out = format!(
        "\n{SESSION_PREFIX}{}{SESSION_SUFFIX}\n",
        started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    if let Some(name) = client_name {
        out.push_str(&client_name_line(name));
    }
    out
}

/// `"Client Name: <name>\n"`.
pub fn client_name_line(name: &str) -> String {
    format!("{CLIENT_NAME_PREFIX}{}\n", name.trim())
}

/// Parsed view of a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Turns in file order, across all sessions.
    pub turns: Vec<Turn>,
    /// Number of `--- Session: ... ---` headers seen.
    pub session_count: usize,
    /// Most recently recorded client name, if any.
    pub client_name: Option<String>,
}

impl Transcript {
    /// Parse transcript text.  Never fails.
    pub fn parse(raw: &str) -> Self {
        let mut out = Transcript::default();
        let mut current: Option<Turn> = None;

        for line in raw.lines() {
            if is_session_header(line) {
                out.flush(&mut current);
                out.session_count += 1;
                continue;
            }
            if let Some(name) = line.strip_prefix(CLIENT_NAME_PREFIX) {
                out.flush(&mut current);
                let name = name.trim();
                out.client_name = match name {
                    "" | "None" | "Unknown" => None,
                    n => Some(n.to_string()),
                };
                continue;
            }
            if let Some((role, text)) = split_turn(line) {
                out.flush(&mut current);
                current = Some(Turn::new(role, text));
                continue;
            }
            if let Some(turn) = current.as_mut() {
                turn.text.push('\n');
                turn.text.push_str(line);
            }
        }
        out.flush(&mut current);
        out
    }

    fn flush(&mut self, current: &mut Option<Turn>) {
        if let Some(mut turn) = current.take() {
            let trimmed = turn.text.trim_end().len();
            turn.text.truncate(trimmed);
            self.turns.push(turn);
        }
    }
}

fn is_session_header(line: &str) -> bool {
    let line = line.trim_end();
    line.starts_with(SESSION_PREFIX) && line.ends_with(SESSION_SUFFIX)
}

fn split_turn(line: &str) -> Option<(Role, &str)> {
    for role in [Role::User, Role::Assistant] {
        if let Some(rest) = line
            .strip_prefix(role.label())
            .and_then(|r| r.strip_prefix(':'))
        {
            return Some((role, rest.strip_prefix(' ').unwrap_or(rest)));
        }
    }
    None
}
