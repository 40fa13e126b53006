//! Agent 名片（/.well-known/agent.json）

use serde::Serialize;

use crate::config::AppConfig;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// 由 [app] 配置生成名片；技能列表为可用工具名
    pub fn from_config(cfg: &AppConfig, tool_names: &[String]) -> Self {
        let url = cfg
            .app
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}/", cfg.server.host, cfg.server.port));
        Self {
            name: cfg.app.name.clone(),
            description: cfg.app.description.clone(),
            url,
            version: cfg.app.version.clone(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            capabilities: AgentCapabilities { streaming: true },
            skills: vec![AgentSkill {
                id: "react-agent".to_string(),
                name: cfg.app.name.clone(),
                description: "Answers questions through a streamed reasoning loop".to_string(),
                tags: std::iter::once("reasoning".to_string())
                    .chain(tool_names.iter().cloned())
                    .collect(),
            }],
        }
    }
}
