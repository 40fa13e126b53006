//! 消息定义：角色、内容片段（text / file / data）
//!
//! 只有 text 片段参与推理输入；其余片段原样保存在对话历史中。

use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// 文件片段内容（按引用或内联 base64）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
}

/// 消息内容片段
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    File { file: FileContent },
    Data { data: serde_json::Value },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// 非空文本片段返回其内容
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        }
    }
}

/// 消息类型标记，线上固定为 "message"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Message,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// 缺省时按 "message" 解析
    #[serde(default)]
    pub kind: MessageKind,
    pub role: Role,
    pub message_id: String,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Message,
            role: Role::User,
            message_id: uuid::Uuid::new_v4().to_string(),
            parts: vec![Part::text(text)],
            task_id: None,
            context_id: None,
            metadata: None,
        }
    }

    /// Agent 消息：总是带上所属 task / context，message_id 每次新生成
    pub fn agent(text: impl Into<String>, task_id: &str, context_id: &str) -> Self {
        Self {
            kind: MessageKind::Message,
            role: Role::Agent,
            message_id: uuid::Uuid::new_v4().to_string(),
            parts: vec![Part::text(text)],
            task_id: Some(task_id.to_string()),
            context_id: Some(context_id.to_string()),
            metadata: None,
        }
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_parts(mut self, parts: Vec<Part>) -> Self {
        self.parts = parts;
        self
    }

    /// 所有非空 text 片段以换行拼接；无文本时为空串
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
