//! Doubles shared by workflow and HTTP tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::inference::{CompletionRequest, InferenceGateway};
use crate::memory_db::*;
use crate::shared_state::ServiceContext;

/// Canned inference that records every request it receives
pub struct StubInference {
    reply: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubInference {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), requests: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { reply: None, requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl InferenceGateway for StubInference {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(anyhow::anyhow!("stub inference unavailable")),
        }
    }
}

/// Real profile store whose append operations always fail
pub struct FailingAppends {
    inner: ProfileStore,
}

#[async_trait]
impl ProfileRepository for FailingAppends {
    async fn get_profile(&self, user_id: i64) -> anyhow::Result<Option<UserProfile>> {
        self.inner.get_profile(user_id).await
    }

    async fn put_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        self.inner.put_profile(profile).await
    }

    async fn delete_profile(&self, user_id: i64) -> anyhow::Result<bool> {
        self.inner.delete_profile(user_id).await
    }

    async fn append_history(&self, _user_id: i64, _entry: &HistoryEntry, _updated_at: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("profile table unavailable"))
    }

    async fn append_summary(
        &self,
        _user_id: i64,
        _summary: &ConversationSummary,
        _updated_at: &str,
    ) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("profile table unavailable"))
    }
}

/// In-memory stores wired into a `ServiceContext`, with direct store handles
/// kept for assertions
pub struct Harness {
    pub ctx: ServiceContext,
    pub inference: Arc<StubInference>,
    pub db_conversations: ConversationStore,
    pub db_profiles: ProfileStore,
}

impl Harness {
    pub fn new(inference: StubInference) -> Self {
        Self::build(inference, false)
    }

    pub fn with_failing_profile_appends(inference: StubInference) -> Self {
        Self::build(inference, true)
    }

    fn build(inference: StubInference, failing_appends: bool) -> Self {
        let db = WellnessDatabase::new_in_memory().unwrap();
        let inference = Arc::new(inference);
        let profiles: Arc<dyn ProfileRepository> = if failing_appends {
            Arc::new(FailingAppends { inner: db.profiles.clone() })
        } else {
            Arc::new(db.profiles.clone())
        };
        let ctx = ServiceContext::new(Arc::new(db.conversations.clone()), profiles, inference.clone());
        Self {
            ctx,
            inference,
            db_conversations: db.conversations,
            db_profiles: db.profiles,
        }
    }
}
