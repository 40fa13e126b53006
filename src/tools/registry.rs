//! 工具目录
//!
//! 推理引擎可用工具的声明式描述（名称 / 描述 / 参数 schema）；按名登记，
//! 生成 schema JSON 拼入 system prompt。工具本身不在本进程执行。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 单个工具描述
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// 参数 JSON Schema；缺省为无参数对象
    #[serde(default = "empty_parameters", alias = "inputSchema")]
    pub parameters: Value,
}

fn empty_parameters() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// 工具目录：按名称有序存储，重名时后注册者覆盖
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut catalog = Self::new();
        for d in descriptors {
            catalog.register(d);
        }
        catalog
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 生成 [{name, description, parameters}] JSON，供 system prompt 使用
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<&ToolDescriptor> = self.tools.values().collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
