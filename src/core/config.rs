//! 构建配置模块
//!
//! 从 TOML 文件读取构建参数，命令行参数可以覆盖其中的值。
//!
//! ## 配置格式
//!
//! ```toml
//! content_dir = "public/markdowns"
//! source_dir = "../notes"
//! listing_output = "src/assets/fileNames.json"
//! search_index_output = "src/assets/searchIndex.json"
//! history = "cli"
//! git_timeout_secs = 10
//! ```

use crate::vcs::HistoryBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名
pub const CONFIG_FILE: &str = "markdex.toml";

/// 构建配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// 内容根目录
    pub content_dir: PathBuf,
    /// 外部 Markdown 目录，扫描前同步到内容目录
    pub source_dir: Option<PathBuf>,
    /// 文件列表产物路径
    pub listing_output: PathBuf,
    /// 搜索索引产物路径
    pub search_index_output: PathBuf,
    /// 提交历史后端
    pub history: HistoryBackend,
    /// git 命令超时（秒）
    pub git_timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("public/markdowns"),
            source_dir: None,
            listing_output: PathBuf::from("src/assets/fileNames.json"),
            search_index_output: PathBuf::from("src/assets/searchIndex.json"),
            history: HistoryBackend::Cli,
            git_timeout_secs: 10,
        }
    }
}

impl BuildConfig {
    /// 从文件加载配置
    ///
    /// 文件不存在时返回默认配置；内容无法解析时返回错误。
    ///
    /// # Arguments
    ///
    /// * `path` - 配置文件路径
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config {:?}", path))
    }

    /// git 命令超时
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}
