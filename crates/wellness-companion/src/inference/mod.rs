//! Inference gateway - the seam between workflows and the hosted LLM

pub mod llm_client;

pub use llm_client::LlmClient;

use async_trait::async_trait;

/// Sampling knobs sent with every completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl SamplingParams {
    /// Conversational replies
    pub const CHAT: SamplingParams = SamplingParams { temperature: 0.7, max_tokens: 1024, top_p: 0.9 };
    /// History summaries
    pub const SUMMARY: SamplingParams = SamplingParams { temperature: 0.5, max_tokens: 512, top_p: 0.9 };
}

/// One system + user exchange, non-streaming
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub params: SamplingParams,
}

impl CompletionRequest {
    pub fn chat(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            params: SamplingParams::CHAT,
        }
    }

    pub fn summary(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            params: SamplingParams::SUMMARY,
        }
    }
}

#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Trimmed completion text, or an error for transport/status/empty replies
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String>;
}
