//! The conversation loop: one interactive session against a provider.
//!
//! [`Conversation`] reads the transcript once at startup, asks the model
//! for a greeting, then handles one user line per [`Conversation::chat`]
//! call.  Every completed exchange is appended to the transcript in a
//! single write; failed exchanges are not written.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::context;
use crate::models::{is_permanent_error, ChatMessage, ModelProvider};
use crate::persona::{self, PromptContext};
use crate::session::transcript::{client_name_line, session_header};
use crate::session::{Role, SessionStore, Transcript, Turn};

/// Inputs that end the session without a farewell from the model.
const END_COMMANDS: &[&str] = &["/quit", "/exit", "/end"];

/// Single words that signal a goodbye.
const FAREWELL_WORDS: &[&str] = &["bye", "goodbye", "farewell"];

/// Multi-word phrases that signal a goodbye.
const FAREWELL_PHRASES: &[&str] = &["see you", "going now"];

/// Phrases that usually precede a name.
const NAME_INDICATORS: &[&str] = &["name is ", "call me ", "i'm ", "im ", "i am "];

/// Words that follow a name indicator or open a reply without being a name.
const NOT_A_NAME: &[&str] = &[
    "hello", "hi", "hey", "yes", "no", "yeah", "nope", "ok", "okay", "sure", "thanks", "not",
    "so", "very", "really", "just", "a", "an", "the", "feeling", "doing", "going", "trying",
    "fine", "good", "great", "well", "sad", "happy", "tired", "here", "back", "sorry", "glad",
    "alright", "stressed", "anxious", "worried", "scared", "lonely", "lost", "confused",
];

/// Result of one conversational step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Show the text; the session continues.
    Reply(String),
    /// The session is over.  Show the text, if any, then stop.
    Ended(Option<String>),
    /// The model replied but the exchange could not be written.  Show
    /// the reply and the error; the exchange is not carried forward.
    Unsaved { reply: String, error: String },
}

/// Mutable state of the session in progress.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Random id tagging this run's log lines.
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub is_active: bool,
    /// No prior history beyond the default content.
    pub is_first_session: bool,
    pub client_name: Option<String>,
    /// Completed exchanges in this run, greeting included.
    pub exchanges: usize,
}

/// One interactive session bound to a transcript file and a provider.
pub struct Conversation {
    provider: Box<dyn ModelProvider>,
    session_file: PathBuf,
    /// Earlier sessions trimmed to the context budget; empty for a
    /// first session.
    previous_sessions: String,
    state: SessionState,
    /// This run's exchange as sent to the provider (no system message).
    messages: Vec<ChatMessage>,
    /// The session header has not been written yet.
    header_pending: bool,
    /// A name learned this turn that still needs a `Client Name:` line.
    pending_name: Option<String>,
}

impl Conversation {
    // -- construction -------------------------------------------------------

    /// Prepare the transcript and load prior history.
    ///
    /// Creates the transcript when `session.auto_create` is set, then
    /// reads it.  Any filesystem error here aborts startup.
    pub async fn open(cfg: &Config, provider: Box<dyn ModelProvider>) -> anyhow::Result<Self> {
        let path = cfg.session.file.clone();

        if cfg.session.auto_create {
            let created = SessionStore::ensure_exists(&path, &cfg.session.default_content).await?;
            if created {
                info!(path = %path.display(), "created new session file");
            }
        }
        let previous_sessions = SessionStore::read_all(&path).await?;

        let actual = previous_sessions.trim();
        let is_first_session =
            actual.is_empty() || actual == cfg.session.default_content.trim();
        let transcript = Transcript::parse(&previous_sessions);
        let client_name = if is_first_session {
            None
        } else {
            transcript.client_name.clone()
        };

        let previous_sessions = if is_first_session {
            String::new()
        } else {
            context::fit_to_budget(&previous_sessions, cfg.context.max_tokens).into_owned()
        };

        let state = SessionState {
            id: crate::utils::generate_nonce(),
            started_at: Utc::now(),
            is_active: true,
            is_first_session,
            client_name,
            exchanges: 0,
        };

        info!(
            session = %state.id,
            first_session = state.is_first_session,
            prior_sessions = transcript.session_count,
            prior_turns = transcript.turns.len(),
            client_known = state.client_name.is_some(),
            "session initialized"
        );

        Ok(Self {
            provider,
            session_file: path,
            previous_sessions,
            state,
            messages: Vec::new(),
            header_pending: true,
            pending_name: None,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session_file(&self) -> &std::path::Path {
        &self.session_file
    }

    /// Stop accepting turns.
    pub fn close(&mut self) {
        if self.state.is_active {
            info!(session = %self.state.id, exchanges = self.state.exchanges, "session closed");
        }
        self.state.is_active = false;
    }

    // -- turns --------------------------------------------------------------

    /// Ask the model for the opening greeting and record it.
    pub async fn start_session(&mut self) -> anyhow::Result<TurnOutcome> {
        let instruction =
            persona::opening_prompt(self.state.is_first_session, self.state.client_name.as_deref());

        match self.request(&instruction).await {
            Ok(greeting) => {
                let turns = [Turn::new(Role::Assistant, greeting.clone())];
                if let Err(e) = self.persist(&turns).await {
                    return Ok(self.unsaved(greeting, e));
                }
                self.messages.push(ChatMessage::new(Role::User.api_role(), instruction));
                self.messages.push(ChatMessage::new(Role::Assistant.api_role(), greeting.clone()));
                Ok(TurnOutcome::Reply(greeting))
            }
            Err(e) => Ok(self.provider_failure(e, persona::FALLBACK_REPLY)),
        }
    }

    /// Handle one line of user input.
    pub async fn chat(&mut self, user_message: &str) -> anyhow::Result<TurnOutcome> {
        if !self.state.is_active {
            return Ok(TurnOutcome::Ended(Some(
                "Session has ended. Please start a new session.".to_string(),
            )));
        }

        let user_message = user_message.trim();
        if is_end_command(user_message) {
            self.close();
            return Ok(TurnOutcome::Ended(None));
        }

        if self.state.is_first_session && self.state.client_name.is_none() {
            // Only the reply to the greeting may be a bare name.
            let answering_greeting = self.state.exchanges == 1;
            if let Some(name) = extract_name(user_message, answering_greeting) {
                info!(session = %self.state.id, name = %name, "learned client name");
                self.state.client_name = Some(name.clone());
                self.pending_name = Some(name);
            }
        }

        if is_farewell(user_message) {
            let prompt = persona::farewell_prompt(self.state.client_name.as_deref(), user_message);
            let reply = match self.request(&prompt).await {
                Ok(reply) => {
                    let turns = [
                        Turn::new(Role::User, user_message),
                        Turn::new(Role::Assistant, reply.clone()),
                    ];
                    if let Err(e) = self.persist(&turns).await {
                        error!(session = %self.state.id, error = %format!("{e:#}"), "farewell not recorded");
                    }
                    reply
                }
                Err(e) => {
                    warn!(session = %self.state.id, error = %e, "farewell request failed");
                    persona::FALLBACK_FAREWELL.to_string()
                }
            };
            self.close();
            return Ok(TurnOutcome::Ended(Some(reply)));
        }

        match self.request(user_message).await {
            Ok(reply) => {
                let turns = [
                    Turn::new(Role::User, user_message),
                    Turn::new(Role::Assistant, reply.clone()),
                ];
                if let Err(e) = self.persist(&turns).await {
                    return Ok(self.unsaved(reply, e));
                }
                self.messages.push(ChatMessage::new(Role::User.api_role(), user_message));
                self.messages.push(ChatMessage::new(Role::Assistant.api_role(), reply.clone()));
                Ok(TurnOutcome::Reply(reply))
            }
            Err(e) => Ok(self.provider_failure(e, persona::FALLBACK_REPLY)),
        }
    }

    // -- internals ----------------------------------------------------------

    /// Send system prompt + this run's exchange + `user_text`.
    async fn request(&self, user_text: &str) -> anyhow::Result<String> {
        let system = persona::system_prompt(&PromptContext {
            first_session: self.state.is_first_session,
            client_name: self.state.client_name.as_deref(),
            previous_sessions: &self.previous_sessions,
        });

        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        messages.push(ChatMessage::new("system", system));
        messages.extend(self.messages.iter().cloned());
        messages.push(ChatMessage::new(Role::User.api_role(), user_text));

        debug!(
            session = %self.state.id,
            provider = self.provider.name(),
            messages = messages.len(),
            "sending request"
        );
        let reply = self.provider.send_chat(&messages).await?;
        debug!(
            session = %self.state.id,
            reply = %crate::utils::truncate_str(&reply, 80),
            "reply received"
        );
        Ok(reply)
    }

    /// Log a provider error and decide whether the session survives it.
    fn provider_failure(&mut self, err: anyhow::Error, fallback: &str) -> TurnOutcome {
        if is_permanent_error(&err) {
            error!(session = %self.state.id, error = %err, "model request failed permanently, ending session");
            self.close();
            TurnOutcome::Ended(Some(fallback.to_string()))
        } else {
            warn!(session = %self.state.id, error = %err, "model request failed");
            TurnOutcome::Reply(fallback.to_string())
        }
    }

    /// A reply whose exchange could not be written.  The session stays
    /// open; the exchange is left out of later requests.
    fn unsaved(&self, reply: String, err: anyhow::Error) -> TurnOutcome {
        let error = format!("{err:#}");
        error!(session = %self.state.id, error = %error, "exchange not recorded");
        TurnOutcome::Unsaved { reply, error }
    }

    /// Append `turns`, preceded by the session header on the first write
    /// and followed by a newly learned client name, in one write.
    async fn persist(&mut self, turns: &[Turn]) -> anyhow::Result<()> {
        let mut text = String::new();
        if self.header_pending {
            text.push_str(&session_header(
                &self.state.started_at,
                self.state.client_name.as_deref(),
            ));
        }
        for turn in turns {
            text.push_str(&turn.render());
        }
        let name_line = self.pending_name.as_deref().map(client_name_line);
        if let Some(line) = &name_line {
            // A header written in this same batch already names the client.
            if !self.header_pending {
                text.push_str(line);
            }
        }

        SessionStore::append(&self.session_file, &text).await?;

        self.header_pending = false;
        self.pending_name = None;
        self.state.exchanges += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Input classification
// ---------------------------------------------------------------------------

/// `true` for the explicit end-of-session commands.
pub fn is_end_command(input: &str) -> bool {
    let input = input.trim();
    END_COMMANDS.iter().any(|c| input.eq_ignore_ascii_case(c))
}

/// Lowercased words of `text`, keeping apostrophes inside words.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// `true` when the message says goodbye (whole-word match).
pub fn is_farewell(message: &str) -> bool {
    let words = words(message);
    if words.iter().any(|w| FAREWELL_WORDS.contains(&w.as_str())) {
        return true;
    }
    let joined = format!(" {} ", words.join(" "));
    FAREWELL_PHRASES
        .iter()
        .any(|p| joined.contains(&format!(" {p} ")))
}

/// Try to pull the client's name out of `message`.
///
/// Looks for an indicator such as "my name is" or "call me" and takes the
/// next word.  When `bare_allowed`, a reply of a single word is also
/// taken as the name.  Greetings and common non-name words are ignored.
pub fn extract_name(message: &str, bare_allowed: bool) -> Option<String> {
    let lower = message.to_lowercase();

    for indicator in NAME_INDICATORS {
        for idx in word_start_matches(&lower, indicator) {
            let rest = &lower[idx + indicator.len()..];
            if let Some(name) = rest.split_whitespace().next().and_then(clean_name) {
                return Some(name);
            }
        }
    }

    if bare_allowed {
        let mut it = message.split_whitespace();
        if let (Some(only), None) = (it.next(), it.next()) {
            return clean_name(only);
        }
    }
    None
}

/// Byte offsets of `needle` in `haystack` where it starts a word.
fn word_start_matches<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack.match_indices(needle).map(|(i, _)| i).filter(move |&i| {
        haystack[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric() && c != '\'')
    })
}

/// Strip punctuation, reject non-names, capitalize.
fn clean_name(word: &str) -> Option<String> {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'');
    let word = word.trim_matches(|c: char| c == '-' || c == '\'');
    if word.is_empty() || !word.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'') {
        return None;
    }
    let lower = word.to_lowercase();
    if NOT_A_NAME.contains(&lower.as_str()) {
        return None;
    }
    let mut chars = lower.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
}
