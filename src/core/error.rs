//! Agent 错误类型
//!
//! 单次执行内的错误全部由编排器转换为 failed 终态事件；只有构建期错误会向上传播。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(String),

    /// 帧流迭代过程中出错
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool discovery failed: {0}")]
    ToolDiscovery(String),

    /// 配置文件缺失字段或格式错误
    #[error("Config error: {0}")]
    Config(String),

    /// 请求校验失败（传输层映射为 400）
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
