//! 搜索模块
//!
//! 运行时加载搜索索引产物并回答查询。
//!
//! - [`FullTextIndex`] - 可替换的全文索引能力
//! - [`SearchEngine`] - 显式初始化的查询句柄，只初始化一次
//! - [`TantivyIndex`] - 基于 tantivy 的内存索引实现
//!
//! ## 使用方法
//!
//! ```rust,ignore
//! use markdex::search::{load_index, SearchEngine, TantivyIndex};
//!
//! let engine: SearchEngine<TantivyIndex> = SearchEngine::default();
//! engine.initialize(&load_index(path)?);
//! for hit in engine.query("vue router") {
//!     println!("{} {:.3}", hit.id, hit.score);
//! }
//! ```

pub mod tantivy_index;

pub use tantivy_index::TantivyIndex;

use crate::core::record::SearchIndexRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// 多个词项的组合方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combine {
    /// 所有词项都必须命中
    #[default]
    And,
    /// 任一词项命中即可
    Or,
}

/// 索引与查询选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// 参与索引的字段
    pub fields: Vec<String>,
    /// 随结果返回的字段
    pub store_fields: Vec<String>,
    /// 字段权重，缺省为 1
    pub boost: BTreeMap<String, f64>,
    /// 模糊匹配容错率，最大编辑距离为 `round(fuzzy * 词长)`
    pub fuzzy: f64,
    /// 是否启用前缀匹配
    pub prefix: bool,
    /// 默认组合方式
    pub combine_with: Combine,
}

impl Default for SearchOptions {
    /// 博客搜索的默认配置：标题权重最高
    fn default() -> Self {
        Self {
            fields: vec!["title".into(), "content".into(), "category".into()],
            store_fields: vec!["title".into(), "path".into(), "category".into()],
            boost: BTreeMap::from([
                ("title".to_string(), 2.0),
                ("category".to_string(), 1.0),
                ("content".to_string(), 1.0),
            ]),
            fuzzy: 0.2,
            prefix: true,
            combine_with: Combine::And,
        }
    }
}

impl SearchOptions {
    /// 字段权重
    pub fn boost_of(&self, field: &str) -> f64 {
        self.boost.get(field).copied().unwrap_or(1.0)
    }
}

/// 一条查询结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    /// 命中的索引词
    pub terms: Vec<String>,
    /// 存储字段
    pub fields: BTreeMap<String, String>,
}

impl SearchHit {
    /// 读取存储字段
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// 全文索引能力
pub trait FullTextIndex {
    /// 用选项创建空索引
    fn with_options(options: SearchOptions) -> Result<Self>
    where
        Self: Sized;

    /// 批量加入文档；失败时索引保持不变
    fn add_all(&mut self, docs: &[SearchIndexRecord]) -> Result<()>;

    /// 查询，`combine` 为 `None` 时使用默认组合方式
    fn search(&self, query: &str, combine: Option<Combine>) -> Vec<SearchHit>;

    /// 文档数
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 取记录中某个字段的值
pub fn field_value<'r>(record: &'r SearchIndexRecord, field: &str) -> Option<&'r str> {
    match field {
        "id" => Some(&record.id),
        "title" => Some(&record.title),
        "content" => Some(&record.content),
        "path" => Some(&record.path),
        "category" => Some(&record.category),
        _ => None,
    }
}

/// 查询句柄
///
/// 通过引用传给使用方，而不是放在全局状态里。
/// `initialize` 只有第一次调用生效；未初始化时查询返回空结果。
pub struct SearchEngine<I: FullTextIndex> {
    options: SearchOptions,
    /// 建立失败时为 `None`
    index: OnceLock<Option<I>>,
}

impl<I: FullTextIndex> Default for SearchEngine<I> {
    fn default() -> Self {
        Self::new(SearchOptions::default())
    }
}

impl<I: FullTextIndex> SearchEngine<I> {
    /// 创建未初始化的句柄
    pub fn new(options: SearchOptions) -> Self {
        Self {
            options,
            index: OnceLock::new(),
        }
    }

    /// 建立索引
    ///
    /// 重复调用不做任何事，返回 `false`。
    /// 建立失败只记录错误，句柄仍视为已初始化（索引为空）。
    pub fn initialize(&self, data: &[SearchIndexRecord]) -> bool {
        let mut created = false;
        self.index.get_or_init(|| {
            created = true;
            let built = I::with_options(self.options.clone()).and_then(|mut index| {
                index.add_all(data)?;
                Ok(index)
            });
            match built {
                Ok(index) => {
                    info!("Search index built with {} document(s)", index.len());
                    Some(index)
                }
                Err(e) => {
                    error!("Failed to build search index: {:#}", e);
                    None
                }
            }
        });
        created
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.index.get().is_some()
    }

    /// 使用默认组合方式查询
    pub fn query(&self, query: &str) -> Vec<SearchHit> {
        self.query_with(query, None)
    }

    /// 查询，可覆盖组合方式
    pub fn query_with(&self, query: &str, combine: Option<Combine>) -> Vec<SearchHit> {
        let Some(slot) = self.index.get() else {
            warn!("Search engine is not initialized");
            return Vec::new();
        };
        let Some(index) = slot else {
            return Vec::new();
        };
        if query.trim().is_empty() {
            return Vec::new();
        }
        index.search(query, combine)
    }
}

/// 读取搜索索引产物
pub fn load_index(path: &Path) -> Result<Vec<SearchIndexRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read search index {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid search index {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::Cell;

    thread_local! {
        static CONSTRUCTED: Cell<usize> = const { Cell::new(0) };
    }

    /// 记录调用情况的假索引
    struct FakeIndex {
        docs: Vec<SearchIndexRecord>,
        fail: bool,
    }

    impl FullTextIndex for FakeIndex {
        fn with_options(options: SearchOptions) -> Result<Self> {
            CONSTRUCTED.with(|c| c.set(c.get() + 1));
            if options.fields.is_empty() {
                bail!("no fields");
            }
            Ok(Self {
                docs: Vec::new(),
                fail: options.fuzzy < 0.0,
            })
        }

        fn add_all(&mut self, docs: &[SearchIndexRecord]) -> Result<()> {
            if self.fail {
                bail!("index build error");
            }
            self.docs.extend_from_slice(docs);
            Ok(())
        }

        fn search(&self, query: &str, _combine: Option<Combine>) -> Vec<SearchHit> {
            self.docs
                .iter()
                .filter(|d| d.title.contains(query))
                .map(|d| SearchHit {
                    id: d.id.clone(),
                    score: 1.0,
                    terms: vec![query.to_string()],
                    fields: BTreeMap::new(),
                })
                .collect()
        }

        fn len(&self) -> usize {
            self.docs.len()
        }
    }

    fn docs() -> Vec<SearchIndexRecord> {
        vec![SearchIndexRecord {
            id: "Vue/article1.md".into(),
            title: "Vue.js 基礎".into(),
            content: "這是關於Vue.js的基礎教學".into(),
            path: "Vue/article1.md".into(),
            category: "Vue".into(),
        }]
    }

    #[test]
    fn test_initialize_once() {
        CONSTRUCTED.with(|c| c.set(0));
        let engine: SearchEngine<FakeIndex> = SearchEngine::default();

        assert!(engine.initialize(&docs()));
        assert!(!engine.initialize(&docs()));
        assert_eq!(CONSTRUCTED.with(|c| c.get()), 1);
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_query_delegates() {
        let engine: SearchEngine<FakeIndex> = SearchEngine::default();
        engine.initialize(&docs());

        let hits = engine.query("Vue");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "Vue/article1.md");
    }

    #[test]
    fn test_query_uninitialized_is_empty() {
        let engine: SearchEngine<FakeIndex> = SearchEngine::default();
        assert!(engine.query("test").is_empty());
    }

    #[test]
    fn test_empty_query_is_empty() {
        let engine: SearchEngine<FakeIndex> = SearchEngine::default();
        engine.initialize(&docs());
        assert!(engine.query("").is_empty());
        assert!(engine.query("   ").is_empty());
    }

    #[test]
    fn test_build_failure_is_swallowed() {
        let options = SearchOptions {
            fuzzy: -1.0,
            ..SearchOptions::default()
        };
        let engine: SearchEngine<FakeIndex> = SearchEngine::new(options);

        assert!(engine.initialize(&docs()));
        assert!(engine.is_initialized());
        assert!(engine.query("Vue").is_empty());
    }

    #[test]
    fn test_construction_failure_is_swallowed() {
        let options = SearchOptions {
            fields: Vec::new(),
            ..SearchOptions::default()
        };
        let engine: SearchEngine<FakeIndex> = SearchEngine::new(options);

        assert!(engine.initialize(&docs()));
        assert!(engine.is_initialized());
        assert!(engine.query("Vue").is_empty());
    }

    #[test]
    fn test_default_options() {
        let options = SearchOptions::default();
        assert_eq!(options.fields, vec!["title", "content", "category"]);
        assert_eq!(options.store_fields, vec!["title", "path", "category"]);
        assert_eq!(options.boost_of("title"), 2.0);
        assert_eq!(options.boost_of("unknown"), 1.0);
        assert_eq!(options.combine_with, Combine::And);
        assert!(options.prefix);
    }
}
