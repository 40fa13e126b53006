//! 远程工具发现
//!
//! 从 JSON 配置读取工具服务器列表（{"server": {"url": "http://..."}}），逐个 GET `{url}/tools`
//! 取工具描述；任何失败都退回到本地工具集，只记日志，不影响启动。

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{builtin, ToolCatalog, ToolDescriptor};
use crate::config::ToolsSection;
use crate::core::AgentError;

/// 远程工具名前缀
const REMOTE_TOOL_PREFIX: &str = "mcp";

/// 单个远程工具服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteServer {
    pub url: String,
}

/// 启动时一次性计算的工具集
#[derive(Debug, Clone)]
pub enum ToolSet {
    /// 本地 + 全部远程工具
    Full(Vec<ToolDescriptor>),
    /// 远程发现失败，仅本地工具
    Reduced {
        tools: Vec<ToolDescriptor>,
        reason: String,
    },
}

impl ToolSet {
    pub fn tools(&self) -> &[ToolDescriptor] {
        match self {
            ToolSet::Full(tools) | ToolSet::Reduced { tools, .. } => tools.as_slice(),
        }
    }

    pub fn is_reduced(&self) -> bool {
        matches!(self, ToolSet::Reduced { .. })
    }

    pub fn into_catalog(self) -> ToolCatalog {
        match self {
            ToolSet::Full(tools) | ToolSet::Reduced { tools, .. } => {
                ToolCatalog::from_descriptors(tools)
            }
        }
    }
}

/// 读取服务器列表文件
pub fn load_servers(path: &Path) -> Result<BTreeMap<String, RemoteServer>, AgentError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AgentError::ToolDiscovery(format!("read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| AgentError::ToolDiscovery(format!("parse {}: {}", path.display(), e)))
}

/// 远程工具名：mcp__{server}__{tool}
pub fn prefixed_name(server: &str, tool: &str) -> String {
    format!("{}__{}__{}", REMOTE_TOOL_PREFIX, server, tool)
}

async fn fetch_server_tools(
    client: &reqwest::Client,
    name: &str,
    server: &RemoteServer,
) -> Result<Vec<ToolDescriptor>, AgentError> {
    let url = format!("{}/tools", server.url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| AgentError::ToolDiscovery(format!("{}: {}", name, e)))?
        .error_for_status()
        .map_err(|e| AgentError::ToolDiscovery(format!("{}: {}", name, e)))?;
    let tools: Vec<ToolDescriptor> = response
        .json()
        .await
        .map_err(|e| AgentError::ToolDiscovery(format!("{}: invalid tool list: {}", name, e)))?;
    Ok(tools
        .into_iter()
        .map(|mut t| {
            t.name = prefixed_name(name, &t.name);
            t
        })
        .collect())
}

async fn discover_remote(cfg: &ToolsSection, path: &Path) -> Result<Vec<ToolDescriptor>, AgentError> {
    let servers = load_servers(path)?;
    tracing::info!(count = servers.len(), path = %path.display(), "loaded remote tool server list");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.discovery_timeout_secs))
        .build()
        .map_err(|e| AgentError::ToolDiscovery(e.to_string()))?;

    let mut tools = Vec::new();
    for (name, server) in &servers {
        tools.extend(fetch_server_tools(&client, name, server).await?);
    }
    Ok(tools)
}

/// 组装工具集：本地工具 + 远程发现；远程失败时降级为 Reduced
pub async fn assemble_tools(cfg: &ToolsSection) -> ToolSet {
    let local = builtin::local_tools();
    let Some(path) = cfg.remote_servers_path.as_deref() else {
        tracing::info!(local = local.len(), "no remote tool servers configured");
        return ToolSet::Full(local);
    };

    match discover_remote(cfg, path).await {
        Ok(remote) => {
            tracing::info!(
                total = local.len() + remote.len(),
                local = local.len(),
                remote = remote.len(),
                "tool set assembled"
            );
            ToolSet::Full(local.into_iter().chain(remote).collect())
        }
        Err(e) => {
            tracing::warn!(error = %e, "remote tool discovery failed, using local tools only");
            ToolSet::Reduced {
                tools: local,
                reason: e.to_string(),
            }
        }
    }
}
