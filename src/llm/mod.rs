//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{ChatMessage, ChatRole, LlmClient, TokenStream};

/// 根据配置与环境变量选择 LLM 后端：provider=openai 且有 OPENAI_API_KEY 时走 OpenAI，否则 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok();

    if provider == "openai" && has_key {
        tracing::info!(model = %cfg.model, "Using OpenAI-compatible LLM");
        Arc::new(OpenAiClient::new(cfg.base_url.as_deref(), &cfg.model, None))
    } else {
        if provider != "mock" {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
        }
        Arc::new(MockLlmClient::new())
    }
}
