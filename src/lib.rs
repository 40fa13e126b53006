//! Herald - 可流式、可取消的对话推理 Agent 任务编排服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、事件总线、任务编排器、优雅关闭
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 初始化
//! - **protocol**: 消息、任务、生命周期事件、Agent 名片
//! - **reasoning**: 推理适配器与帧模型
//! - **server**: axum HTTP / SSE 传输层
//! - **store**: 会话历史、取消登记、任务快照
//! - **tools**: 本地与远程工具描述

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod reasoning;
pub mod server;
pub mod store;
pub mod tools;
