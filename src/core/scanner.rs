//! 目录扫描模块
//!
//! 递归遍历内容目录，为每个 Markdown 文件生成一条列表记录和一条搜索索引记录。
//!
//! 遍历顺序就是目录列举的顺序，不做排序；最终顺序由构建器决定。
//! 遍历中的任何文件系统错误都会向上传播并中止扫描，避免产出残缺的索引。

use crate::core::io::ContentIo;
use crate::core::record::{
    category_of, heading_lines, is_markdown, relative_path, title_of, ListingRecord,
    SearchIndexRecord,
};
use crate::core::strip::strip_markdown;
use crate::vcs::{resolve_date, CommitHistory};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// 扫描输出：两份平行的记录列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutput {
    pub listing: Vec<ListingRecord>,
    pub search_index: Vec<SearchIndexRecord>,
}

impl ScanOutput {
    /// 追加另一份扫描结果
    pub fn extend(&mut self, other: ScanOutput) {
        self.listing.extend(other.listing);
        self.search_index.extend(other.search_index);
    }

    /// 记录的文件数
    pub fn len(&self) -> usize {
        self.listing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listing.is_empty()
    }
}

/// 目录扫描器
pub struct Scanner<'a> {
    io: &'a dyn ContentIo,
    history: &'a dyn CommitHistory,
}

impl<'a> Scanner<'a> {
    /// 创建扫描器
    ///
    /// # Arguments
    ///
    /// * `io` - I/O 能力
    /// * `history` - 提交历史来源，用于解析日期
    pub fn new(io: &'a dyn ContentIo, history: &'a dyn CommitHistory) -> Self {
        Self { io, history }
    }

    /// 扫描整个内容目录
    pub fn scan_root(&self, root: &Path) -> Result<ScanOutput> {
        self.scan(root, root)
    }

    /// 递归扫描 `current` 目录，路径相对 `root` 计算
    ///
    /// 每一层返回自己的结果，在上一层拼接，不共享可变累加器。
    pub fn scan(&self, current: &Path, root: &Path) -> Result<ScanOutput> {
        let mut output = ScanOutput::default();

        let entries = self
            .io
            .read_dir(current)
            .with_context(|| format!("Failed to scan {:?}", current))?;

        for entry in entries {
            if entry.is_dir {
                output.extend(self.scan(&entry.path, root)?);
                continue;
            }

            let name = entry.file_name();
            if !is_markdown(&name) {
                continue;
            }

            let (listing, search) = self.index_file(&entry.path, &name, root)?;
            output.listing.push(listing);
            output.search_index.push(search);
        }

        Ok(output)
    }

    /// 为单个文件生成两条记录
    fn index_file(
        &self,
        path: &Path,
        name: &str,
        root: &Path,
    ) -> Result<(ListingRecord, SearchIndexRecord)> {
        let rel = relative_path(path, root);
        let category = category_of(&rel);
        let content = self.io.read_to_string(path)?;
        let last_modified = resolve_date(path, self.history, self.io);

        debug!("Scanned {} ({}) at {}", rel, category, last_modified);

        let listing = ListingRecord {
            name: name.to_string(),
            category: category.clone(),
            path: rel.clone(),
            last_modified,
            heading_lines: heading_lines(&content),
        };

        let search = SearchIndexRecord {
            id: rel.clone(),
            title: title_of(name),
            content: strip_markdown(&content),
            path: rel,
            category,
        };

        Ok((listing, search))
    }
}
