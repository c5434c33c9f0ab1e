//! 目录（TOC）拆分模块
//!
//! 把 `<!-- TOC -->` ... `<!-- /TOC -->` 之间的目录与正文分开，
//! 并能把一个目录下的 Markdown 文件逐个编译为 JSON。

use crate::core::io::ContentIo;
use crate::core::record::{is_markdown, title_of};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{error, info};

static TOC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!--\s*TOC\s*-->(.*?)<!--\s*/TOC\s*-->").unwrap());

/// 拆分结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitDoc {
    /// 去掉目录块后的正文
    pub content: String,
    /// 目录块内部文本，没有目录时为空
    pub toc_content: String,
}

/// 编译后写出的单文件 JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDoc {
    pub name: String,
    pub content: String,
    pub toc_content: String,
}

/// 编译汇总
#[derive(Debug, Default)]
pub struct CompileSummary {
    /// 成功写出的文件
    pub written: Vec<String>,
    /// 失败的文件及原因
    pub errors: Vec<(String, String)>,
}

/// 拆分目录与正文
///
/// 标记大小写不敏感，注释内部允许任意空白。只处理第一对标记。
pub fn split_toc(raw: &str) -> SplitDoc {
    let Some(caps) = TOC_BLOCK.captures(raw) else {
        return SplitDoc {
            content: raw.to_string(),
            toc_content: String::new(),
        };
    };

    let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    let toc_content = caps
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let mut content = String::with_capacity(raw.len());
    content.push_str(&raw[..whole.start]);
    content.push_str(&raw[whole.end..]);

    SplitDoc {
        content: content.trim().to_string(),
        toc_content,
    }
}

/// 编译目录下的所有 Markdown 文件
///
/// 为每个 `.md` 文件写出 `<文件名>.json`，输出目录不存在时自动创建。
/// 单个文件写入失败只记录，不中断其余文件。
///
/// # Arguments
///
/// * `source_dir` - Markdown 所在目录（不递归）
/// * `output_dir` - JSON 输出目录
/// * `io` - I/O 能力
pub fn compile_markdown_files(
    source_dir: &Path,
    output_dir: &Path,
    io: &dyn ContentIo,
) -> Result<CompileSummary> {
    if !io.exists(output_dir) {
        io.create_dir_all(output_dir)?;
    }

    let entries = io
        .read_dir(source_dir)
        .with_context(|| format!("Failed to read markdown dir {:?}", source_dir))?;

    let mut summary = CompileSummary::default();

    for entry in entries {
        let name = entry.file_name();
        if entry.is_dir || !is_markdown(&name) {
            continue;
        }

        let raw = io.read_to_string(&entry.path)?;
        let split = split_toc(&raw);
        let doc = CompiledDoc {
            name: name.clone(),
            content: split.content,
            toc_content: split.toc_content,
        };

        let json_name = format!("{}.json", title_of(&name));
        let target = output_dir.join(&json_name);

        let written = serde_json::to_string(&doc)
            .map_err(anyhow::Error::from)
            .and_then(|json| io.write(&target, &json));

        match written {
            Ok(()) => {
                info!("Compiled {}", json_name);
                summary.written.push(json_name);
            }
            Err(e) => {
                error!("Failed to write {}: {:#}", json_name, e);
                summary.errors.push((json_name, e.to_string()));
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::MemoryIo;

    const WITH_TOC: &str = "
# Title
<!-- TOC -->
- Link 1
- Link 2
<!-- /TOC -->
## Subtitle
Content here.
    ";

    #[test]
    fn test_split_standard_toc() {
        let doc = split_toc(WITH_TOC);
        assert!(doc.toc_content.contains("- Link 1"));
        assert!(doc.toc_content.contains("- Link 2"));
        assert!(doc.content.contains("# Title"));
        assert!(doc.content.contains("## Subtitle"));
        assert!(!doc.content.contains("<!-- TOC -->"));
    }

    #[test]
    fn test_split_irregular_markers() {
        let raw = "\n# Title\n<!--  TOC  -->\n- Link 1\n<!-- /toc   -->\nContent here.\n";
        let doc = split_toc(raw);
        assert_eq!(doc.toc_content, "- Link 1");
        assert!(doc.content.contains("Content here."));
        assert!(!doc.content.contains("<!--"));
    }

    #[test]
    fn test_split_without_toc() {
        let doc = split_toc("# Just Content");
        assert_eq!(doc.toc_content, "");
        assert_eq!(doc.content, "# Just Content");
    }

    #[test]
    fn test_compile_markdown_files() {
        let io = MemoryIo::new();
        io.add_file("/in/test.md", WITH_TOC);
        io.add_file("/in/no-toc.md", "# Just Content");
        io.add_file("/in/image.png", "binary");

        let summary = compile_markdown_files(Path::new("/in"), Path::new("/out"), &io).unwrap();

        assert_eq!(summary.written, vec!["test.json", "no-toc.json"]);
        assert!(io.exists(Path::new("/out")));

        let json = io.contents(Path::new("/out/test.json")).unwrap();
        let doc: CompiledDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.name, "test.md");
        assert!(doc.toc_content.contains("- Link 1"));
        assert!(!doc.content.contains("<!-- TOC -->"));

        let json = io.contents(Path::new("/out/no-toc.json")).unwrap();
        let doc: CompiledDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.toc_content, "");
        assert_eq!(doc.content, "# Just Content");
    }

    #[test]
    fn test_compile_write_failure_is_not_fatal() {
        let io = MemoryIo::new();
        io.add_file("/in/a.md", "a");
        io.add_file("/in/b.md", "b");
        io.fail_writes_to("/out/a.json");

        let summary = compile_markdown_files(Path::new("/in"), Path::new("/out"), &io).unwrap();

        assert_eq!(summary.written, vec!["b.json"]);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].0, "a.json");
    }
}
