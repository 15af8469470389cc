#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use eli::config::{Config, ProviderKind};
use eli::models::{ChatMessage, ModelProvider};

/// What the scripted provider saw and what it still has to say.
#[derive(Default)]
pub struct ProviderTrace {
    /// Queued replies; `Err` strings become provider errors.
    pub replies: VecDeque<Result<String, String>>,
    /// Every request, in order.
    pub requests: Vec<Vec<ChatMessage>>,
}

/// Provider that answers from a script and records its requests.
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderTrace>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[Result<&str, &str>]) -> (Self, Arc<Mutex<ProviderTrace>>) {
        let trace = ProviderTrace {
            replies: replies
                .iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect(),
            requests: Vec::new(),
        };
        let state = Arc::new(Mutex::new(trace));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn send_chat(&self, messages: &[ChatMessage]) -> Result<String, anyhow::Error> {
        let mut state = lock_unpoisoned(&self.state);
        state.requests.push(messages.to_vec());
        match state.replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Config pointing at `file` with everything else at defaults.
pub fn config_for(file: &Path) -> Config {
    let mut cfg = Config {
        provider: ProviderKind::Echo,
        ..Config::default()
    };
    cfg.session.file = file.to_path_buf();
    cfg
}

/// Content of a transcript, for assertions.
pub fn read(file: &Path) -> String {
    std::fs::read_to_string(file).unwrap()
}
