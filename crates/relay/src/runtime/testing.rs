//! In-process inference fake shared by the runtime unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use pr_domain::error::{Error, Result};
use pr_providers::{GenerateRequest, InferenceProvider, TranscribeRequest};

pub(crate) enum Step {
    Reply(&'static str),
    /// Reply after sleeping this many milliseconds.
    Delayed(&'static str, u64),
    Fail,
    Hang,
}

/// Plays back scripted steps, then echoes `default_reply` forever.
pub(crate) struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    default_reply: String,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn new(default_reply: &str) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().push_back(step);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait::async_trait]
impl InferenceProvider for ScriptedProvider {
    async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        self.requests.lock().push(req.clone());
        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text.to_string()),
            Some(Step::Delayed(text, ms)) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(text.to_string())
            }
            Some(Step::Fail) => Err(Error::Provider {
                provider: "scripted".into(),
                message: "HTTP 503 - unavailable".into(),
            }),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok("too late".into())
            }
            None => Ok(self.default_reply.clone()),
        }
    }

    async fn transcribe(&self, _req: &TranscribeRequest) -> Result<String> {
        Ok("transcribed words".into())
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}
