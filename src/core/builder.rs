//! 索引构建模块
//!
//! 串起整条流水线：同步 → 扫描 → 按时间排序 → 写出两个 JSON 产物。
//!
//! 两个产物分别写入，没有跨文件的事务；先写成功的那个会保留在磁盘上。

use crate::core::config::BuildConfig;
use crate::core::io::ContentIo;
use crate::core::record::ListingRecord;
use crate::core::scanner::Scanner;
use crate::core::sync::{sync_content, SyncReport};
use crate::vcs::CommitHistory;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// 构建结果
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// 索引的 Markdown 文件数
    pub files_indexed: usize,
    /// 同步结果
    pub sync: SyncReport,
    /// 文件列表产物路径
    pub listing_path: PathBuf,
    /// 搜索索引产物路径
    pub search_index_path: PathBuf,
}

/// 索引构建器
pub struct IndexBuilder<'a> {
    config: &'a BuildConfig,
    io: &'a dyn ContentIo,
    history: &'a dyn CommitHistory,
}

impl<'a> IndexBuilder<'a> {
    /// 创建构建器
    ///
    /// # Arguments
    ///
    /// * `config` - 构建配置
    /// * `io` - I/O 能力
    /// * `history` - 提交历史来源
    pub fn new(
        config: &'a BuildConfig,
        io: &'a dyn ContentIo,
        history: &'a dyn CommitHistory,
    ) -> Self {
        Self {
            config,
            io,
            history,
        }
    }

    /// 执行一次完整构建
    pub fn build(&self) -> Result<BuildReport> {
        let root = &self.config.content_dir;

        // 同步结果不影响后续流程
        let sync = match &self.config.source_dir {
            Some(source) => sync_content(source, root, self.io),
            None => {
                warn!("No external content source configured, skipping sync");
                SyncReport {
                    source_missing: true,
                    ..SyncReport::default()
                }
            }
        };

        let scanned = Scanner::new(self.io, self.history).scan_root(root)?;
        let files_indexed = scanned.len();

        let mut listing = scanned.listing;
        sort_listing(&mut listing);

        self.emit(&self.config.listing_output, &listing)
            .context("Failed to emit listing")?;
        self.emit(&self.config.search_index_output, &scanned.search_index)
            .context("Failed to emit search index")?;

        info!(
            "Indexed {} markdown file(s) into {:?} and {:?}",
            files_indexed, self.config.listing_output, self.config.search_index_output
        );

        Ok(BuildReport {
            files_indexed,
            sync,
            listing_path: self.config.listing_output.clone(),
            search_index_path: self.config.search_index_output.clone(),
        })
    }

    /// 序列化为带缩进的 JSON 并覆盖写入
    fn emit<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !self.io.exists(parent) {
                self.io.create_dir_all(parent)?;
            }
        }
        self.io.write(path, &json)
    }
}

/// 按最后修改时间倒序排序，时间相同保持原顺序
pub fn sort_listing(listing: &mut [ListingRecord]) {
    listing.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
}

/// 顶层入口：执行构建并捕获错误
///
/// 失败时记录带上下文的错误并返回 `false`，不会继续向上抛出。
pub fn run_build(config: &BuildConfig, io: &dyn ContentIo, history: &dyn CommitHistory) -> bool {
    match IndexBuilder::new(config, io, history).build() {
        Ok(report) => {
            if report.sync.has_errors() {
                warn!("Sync finished with {} error(s)", report.sync.failed.len());
            }
            true
        }
        Err(e) => {
            error!("Index build failed: {:#}", e);
            false
        }
    }
}
