//! 基于 tantivy 的内存全文索引
//!
//! 每个查询词展开为三种子查询，按字段权重加权后取并集：
//!
//! - 精确词项，BM25 打分
//! - 前缀匹配，权重折减为 [`PREFIX_WEIGHT`]
//! - 模糊匹配，最大编辑距离为 `round(fuzzy × 词长)`，权重折减为 [`FUZZY_WEIGHT`]
//!
//! 多个查询词之间按 [`Combine`] 组合为 `Must` 或 `Should`。

use crate::core::record::SearchIndexRecord;
use crate::search::{field_value, Combine, FullTextIndex, SearchHit, SearchOptions};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashSet};
use tantivy::collector::TopDocs;
use tantivy::query::{
    BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, QueryClone, TermQuery,
};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::tokenizer::{Token, TokenStream};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Score, TantivyDocument, Term};
use tracing::{debug, warn};

/// 前缀匹配的权重
pub const PREFIX_WEIGHT: Score = 0.375;
/// 模糊匹配的权重
pub const FUZZY_WEIGHT: Score = 0.45;

/// tantivy 的 Levenshtein 自动机最多支持距离 2
const MAX_FUZZY_DISTANCE: u8 = 2;

/// 单线程写入的内存预算
const WRITER_HEAP_BYTES: usize = 50_000_000;

const ID_FIELD: &str = "id";

/// tantivy 内存索引
pub struct TantivyIndex {
    options: SearchOptions,
    index: Index,
    reader: IndexReader,
    id_field: Field,
    /// 参与检索的字段
    search_fields: Vec<(String, Field)>,
    /// 随结果返回的字段
    stored_fields: Vec<(String, Field)>,
    /// 已写入的文档 id
    ids: HashSet<String>,
}

impl TantivyIndex {
    /// 按选项生成 schema
    fn schema(options: &SearchOptions) -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field(ID_FIELD, STRING | STORED);

        let mut names: Vec<&String> = options.fields.iter().collect();
        for name in &options.store_fields {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        for name in names.into_iter().filter(|n| n.as_str() != ID_FIELD) {
            let mut field_options = TextOptions::default();
            if options.fields.contains(name) {
                field_options = field_options.set_indexing_options(
                    TextFieldIndexing::default()
                        .set_tokenizer("default")
                        .set_index_option(IndexRecordOption::WithFreqsAndPositions),
                );
            }
            if options.store_fields.contains(name) {
                field_options = field_options.set_stored();
            }
            builder.add_text_field(name, field_options);
        }

        builder.build()
    }

    /// 用索引自带的分词器切分查询，去重并保持顺序
    fn query_terms(&self, query: &str) -> Result<Vec<String>> {
        let Some((_, field)) = self.search_fields.first() else {
            return Ok(Vec::new());
        };

        let mut analyzer = self.index.tokenizer_for_field(*field)?;
        let mut stream = analyzer.token_stream(query);
        let mut terms: Vec<String> = Vec::new();
        stream.process(&mut |token: &Token| {
            if !terms.contains(&token.text) {
                terms.push(token.text.clone());
            }
        });

        Ok(terms)
    }

    /// 单个查询词在所有检索字段上的子查询
    fn term_query(&self, text: &str) -> Box<dyn Query> {
        let len = text.chars().count() as f64;
        let distance = ((self.options.fuzzy * len).round().max(0.0) as u8).min(MAX_FUZZY_DISTANCE);

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (name, field) in &self.search_fields {
            let boost = self.options.boost_of(name) as Score;
            let term = Term::from_field_text(*field, text);

            let exact = TermQuery::new(term.clone(), IndexRecordOption::WithFreqs);
            clauses.push((Occur::Should, Box::new(BoostQuery::new(Box::new(exact), boost))));

            if self.options.prefix {
                let prefix = FuzzyTermQuery::new_prefix(term.clone(), 0, true);
                clauses.push((
                    Occur::Should,
                    Box::new(BoostQuery::new(Box::new(prefix), boost * PREFIX_WEIGHT)),
                ));
            }

            if distance > 0 {
                let fuzzy = FuzzyTermQuery::new(term, distance, true);
                clauses.push((
                    Occur::Should,
                    Box::new(BoostQuery::new(Box::new(fuzzy), boost * FUZZY_WEIGHT)),
                ));
            }
        }

        Box::new(BooleanQuery::new(clauses))
    }

    fn try_search(&self, query: &str, combine: Combine) -> Result<Vec<SearchHit>> {
        let terms = self.query_terms(query)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let occur = match combine {
            Combine::And => Occur::Must,
            Combine::Or => Occur::Should,
        };
        let per_term: Vec<(String, Box<dyn Query>)> = terms
            .into_iter()
            .map(|t| {
                let q = self.term_query(&t);
                (t, q)
            })
            .collect();
        let combined = BooleanQuery::new(
            per_term
                .iter()
                .map(|(_, q)| (occur, q.box_clone()))
                .collect(),
        );

        let searcher = self.reader.searcher();
        let limit = (searcher.num_docs() as usize).max(1);
        let mut top_docs = searcher.search(&combined, &TopDocs::with_limit(limit))?;
        // 同分按写入顺序
        top_docs.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;

            let id = doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let fields: BTreeMap<String, String> = self
                .stored_fields
                .iter()
                .filter_map(|(name, field)| {
                    doc.get_first(*field)
                        .and_then(|v| v.as_str())
                        .map(|v| (name.clone(), v.to_string()))
                })
                .collect();

            let matched = per_term
                .iter()
                .filter(|(_, q)| q.explain(&searcher, address).is_ok())
                .map(|(t, _)| t.clone())
                .collect();

            hits.push(SearchHit {
                id,
                score: f64::from(score),
                terms: matched,
                fields,
            });
        }

        Ok(hits)
    }
}

impl FullTextIndex for TantivyIndex {
    fn with_options(options: SearchOptions) -> Result<Self> {
        for name in options.fields.iter().chain(&options.store_fields) {
            if !matches!(name.as_str(), "id" | "title" | "content" | "path" | "category") {
                bail!("Unknown index field: {}", name);
            }
        }

        let schema = Self::schema(&options);
        let index = Index::create_in_ram(schema.clone());
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        let lookup = |names: &[String]| -> Result<Vec<(String, Field)>> {
            names
                .iter()
                .filter(|n| n.as_str() != ID_FIELD)
                .map(|n| Ok((n.clone(), schema.get_field(n)?)))
                .collect()
        };
        let search_fields = lookup(&options.fields)?;
        let stored_fields = lookup(&options.store_fields)?;
        let id_field = schema.get_field(ID_FIELD)?;

        Ok(Self {
            options,
            index,
            reader,
            id_field,
            search_fields,
            stored_fields,
            ids: HashSet::new(),
        })
    }

    fn add_all(&mut self, docs: &[SearchIndexRecord]) -> Result<()> {
        // 先整体校验，失败时不写入任何文档
        let mut seen: HashSet<&str> = HashSet::new();
        for doc in docs {
            if self.ids.contains(&doc.id) || !seen.insert(doc.id.as_str()) {
                bail!("Duplicate document id: {}", doc.id);
            }
        }

        let mut writer: IndexWriter = self
            .index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        for record in docs {
            let mut doc = TantivyDocument::default();
            doc.add_text(self.id_field, &record.id);
            for (name, field) in self.search_fields.iter().chain(&self.stored_fields) {
                // 同时检索和存储的字段只写一次
                if doc.get_first(*field).is_some() {
                    continue;
                }
                if let Some(value) = field_value(record, name) {
                    doc.add_text(*field, value);
                }
            }
            writer.add_document(doc)?;
        }

        writer.commit().context("Failed to commit search index")?;
        self.reader.reload()?;
        self.ids.extend(docs.iter().map(|d| d.id.clone()));

        debug!("Committed {} document(s) to search index", docs.len());
        Ok(())
    }

    fn search(&self, query: &str, combine: Option<Combine>) -> Vec<SearchHit> {
        let combine = combine.unwrap_or(self.options.combine_with);
        match self.try_search(query, combine) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search for {:?} failed: {:#}", query, e);
                Vec::new()
            }
        }
    }

    fn len(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }
}
