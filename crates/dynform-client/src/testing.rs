//! In-memory form service for tests, enabled by the `test-util` feature.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dynform_spec::FieldSpec;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::transport::{FormTransport, SubmitResponse};

#[derive(Default)]
struct Script {
    field_lists: VecDeque<Result<Vec<FieldSpec>, FetchError>>,
    choices: VecDeque<Result<Vec<String>, FetchError>>,
    submits: VecDeque<Result<SubmitResponse, FetchError>>,
    calls: Vec<String>,
    submitted: Vec<Map<String, Value>>,
}

/// Each call records itself, waits `latency`, then pops its next scripted reply.
///
/// A call dropped during the wait leaves its reply queued. An exhausted script
/// answers with a network error.
pub struct ScriptedTransport {
    latency: Duration,
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            script: Mutex::new(Script::default()),
        })
    }

    pub fn push_field_list(&self, reply: Result<Vec<FieldSpec>, FetchError>) {
        self.lock().field_lists.push_back(reply);
    }

    pub fn push_choices(&self, reply: Result<Vec<String>, FetchError>) {
        self.lock().choices.push_back(reply);
    }

    pub fn push_submit(&self, reply: Result<SubmitResponse, FetchError>) {
        self.lock().submits.push_back(reply);
    }

    /// `form`, `choice/{id}` and `save`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn submitted(&self) -> Vec<Map<String, Value>> {
        self.lock().submitted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn exhausted() -> FetchError {
    FetchError::Network("script exhausted".into())
}

#[async_trait]
impl FormTransport for ScriptedTransport {
    async fn field_list(&self) -> Result<Vec<FieldSpec>, FetchError> {
        self.lock().calls.push("form".into());
        tokio::time::sleep(self.latency).await;
        let reply = self.lock().field_lists.pop_front();
        reply.unwrap_or_else(|| Err(exhausted()))
    }

    async fn choice_set(&self, field_id: &str) -> Result<Vec<String>, FetchError> {
        self.lock().calls.push(format!("choice/{field_id}"));
        tokio::time::sleep(self.latency).await;
        let reply = self.lock().choices.pop_front();
        reply.unwrap_or_else(|| Err(exhausted()))
    }

    async fn submit(&self, payload: &Map<String, Value>) -> Result<SubmitResponse, FetchError> {
        {
            let mut script = self.lock();
            script.calls.push("save".into());
            script.submitted.push(payload.clone());
        }
        tokio::time::sleep(self.latency).await;
        let reply = self.lock().submits.pop_front();
        reply.unwrap_or_else(|| Err(exhausted()))
    }
}
