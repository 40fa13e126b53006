//! 推理层：适配器契约、帧模型与基于 LLM 的默认实现

pub mod adapter;
pub mod frame;
pub mod llm_adapter;

pub use adapter::{AdapterInput, FrameStream, ReasoningAdapter};
pub use frame::{Frame, FrameContent, FrameMessage, ToolCallRequest};
pub use llm_adapter::{parse_llm_output, LlmReasoningAdapter, PlannerOutput};
