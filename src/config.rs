//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HERALD__*` 覆盖（双下划线表示嵌套，如 `HERALD__SERVER__PORT=4000`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub shutdown: ShutdownSection,
}

/// [app] 段：Agent 名片信息
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_description")]
    pub description: String,
    #[serde(default = "default_app_version")]
    pub version: String,
    /// 对外地址；未设置时由 [server] host/port 拼出
    pub public_url: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            description: default_app_description(),
            version: default_app_version(),
            public_url: None,
        }
    }
}

fn default_app_name() -> String {
    "Herald ReAct Agent".to_string()
}

fn default_app_description() -> String {
    "Streamed, cancellable reasoning agent".to_string()
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

/// [server] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// [llm] 段：后端选择；openai 需要 OPENAI_API_KEY，否则退回 mock
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [tools] 段：远程工具发现
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 远程工具服务器列表（JSON：{"server": {"url": "..."}}），未设置时只用本地工具
    pub remote_servers_path: Option<PathBuf>,
    /// 单个服务器发现超时（秒）
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            remote_servers_path: None,
            discovery_timeout_secs: default_discovery_timeout_secs(),
        }
    }
}

fn default_discovery_timeout_secs() -> u64 {
    10
}

/// [shutdown] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSection {
    #[serde(default = "default_cleanup_timeout_secs")]
    pub cleanup_timeout_secs: u64,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            cleanup_timeout_secs: default_cleanup_timeout_secs(),
        }
    }
}

fn default_cleanup_timeout_secs() -> u64 {
    5
}

/// 从 config 目录加载配置，环境变量 HERALD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HERALD__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, AgentError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HERALD")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AgentError::Config(e.to_string()))
}
