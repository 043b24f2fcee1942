//! A generator that replays canned replies and records what it was asked.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ArError, Result};
use crate::rerank::{Generator, HeuristicGenerator, Prompt};

/// One canned reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Answer as the offline generator would.
    Heuristic,
    Timeout,
    Unavailable(String),
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    prompts: Vec<Prompt>,
}

/// Cloning shares the script, so a test can keep a handle after boxing one
/// copy into a reranker. When the script runs out it answers heuristically.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGenerator {
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                replies: replies.into_iter().collect(),
                prompts: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.script.lock().prompts.len()
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.script.lock().prompts.clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String> {
        let reply = {
            let mut script = self.script.lock();
            script.prompts.push(prompt.clone());
            script.replies.pop_front().unwrap_or(Reply::Heuristic)
        };
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Heuristic => HeuristicGenerator.generate(prompt),
            Reply::Timeout => Err(ArError::RerankTimeout { after_secs: 30 }),
            Reply::Unavailable(reason) => Err(ArError::RerankUnavailable {
                endpoint: "scripted".to_string(),
                reason,
            }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
