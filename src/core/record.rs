//! 索引记录模块
//!
//! 每个 Markdown 文件产出两条记录：
//!
//! - [`ListingRecord`] - 写入文件列表产物，供前端按时间、分类展示
//! - [`SearchIndexRecord`] - 写入搜索索引产物，供全文检索加载

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// 位于内容根目录下的文件的分类
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Markdown 扩展名
pub const MARKDOWN_EXT: &str = ".md";

/// 文件列表记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    /// 文件名（含扩展名）
    pub name: String,
    /// 顶层目录名
    pub category: String,
    /// 相对内容根目录的路径，分隔符统一为 `/`
    pub path: String,
    /// 最后修改时间
    #[serde(with = "iso_millis")]
    pub last_modified: DateTime<Utc>,
    /// 以 `## ` 开头的原始行
    pub heading_lines: Vec<String>,
}

/// 搜索索引记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexRecord {
    /// 唯一键，等于 `path`
    pub id: String,
    /// 去掉 `.md` 的文件名
    pub title: String,
    /// 去除 Markdown 语法后的纯文本
    pub content: String,
    pub path: String,
    pub category: String,
}

/// 按路径深度推导分类
///
/// 直接位于根目录下的文件归为 [`UNCATEGORIZED`]，否则取第一段路径。
pub fn category_of(relative_path: &str) -> String {
    match relative_path.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => UNCATEGORIZED.to_string(),
    }
}

/// 计算相对根目录的 POSIX 风格路径
pub fn relative_path(path: &Path, root: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    rel.to_string_lossy().replace('\\', "/")
}

/// 文件名去掉 `.md` 后缀
pub fn title_of(file_name: &str) -> String {
    file_name
        .strip_suffix(MARKDOWN_EXT)
        .unwrap_or(file_name)
        .to_string()
}

/// 是否为 Markdown 文件名
pub fn is_markdown(file_name: &str) -> bool {
    file_name.ends_with(MARKDOWN_EXT)
}

/// 提取二级标题行（以 `## ` 开头的行，保持原样）
pub fn heading_lines(content: &str) -> Vec<String> {
    content
        .split('\n')
        .filter(|line| line.starts_with("## "))
        .map(|line| line.to_string())
        .collect()
}

/// 毫秒精度、`Z` 结尾的 ISO-8601 时间格式
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod iso_millis {
    use super::*;

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_category_of() {
        assert_eq!(category_of("foo.md"), UNCATEGORIZED);
        assert_eq!(category_of("PHP/bar.md"), "PHP");
        assert_eq!(category_of("JS/deep/nested.md"), "JS");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/content/PHP/bar.md"), Path::new("/content")),
            "PHP/bar.md"
        );
        assert_eq!(
            relative_path(Path::new("/content/foo.md"), Path::new("/content")),
            "foo.md"
        );
    }

    #[test]
    fn test_title_of() {
        assert_eq!(title_of("laravel.md"), "laravel");
        assert_eq!(title_of("notes.md.md"), "notes.md");
    }

    #[test]
    fn test_heading_lines() {
        let content = "# Title\n## First\ntext ## not\n### Deep\n##NoSpace\n## Second";
        assert_eq!(heading_lines(content), vec!["## First", "## Second"]);
        assert!(heading_lines("").is_empty());
    }

    #[test]
    fn test_heading_lines_keeps_carriage_return() {
        assert_eq!(heading_lines("## Crlf\r\nbody"), vec!["## Crlf\r"]);
    }

    #[test]
    fn test_listing_record_json_shape() {
        let record = ListingRecord {
            name: "bar.md".to_string(),
            category: "PHP".to_string(),
            path: "PHP/bar.md".to_string(),
            last_modified: Utc.with_ymd_and_hms(2022, 12, 31, 16, 0, 0).unwrap(),
            heading_lines: vec!["## Title".to_string()],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lastModified"], "2022-12-31T16:00:00.000Z");
        assert_eq!(json["headingLines"][0], "## Title");

        let back: ListingRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
