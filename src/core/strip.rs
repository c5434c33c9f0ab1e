//! Markdown 纯文本化模块
//!
//! 把 Markdown 转成只用于索引的纯文本。规则按顺序执行，后面的规则假设
//! 前面的已经去掉了冲突的语法：
//!
//! 1. 代码块 → 空格
//! 2. `[文字](链接)` → 文字
//! 3. HTML 标签 → 空格
//! 4. 粗体、斜体标记去掉
//! 5. 标题 `#` 前缀 → 空格
//! 6. 换行 → 空格
//! 7. 合并空白并修剪
//!
//! 嵌套强调、引用式链接、表格、脚注不做特殊处理。

use regex::{Captures, Regex};
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*|__(.*?)__").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*|_(.*?)_").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#+\s").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// 去除 Markdown 语法，只保留纯文本
///
/// 空输入返回空字符串，永不失败。
pub fn strip_markdown(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }

    let text = CODE_FENCE.replace_all(markdown, " ");
    let text = LINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = BOLD.replace_all(&text, unwrap_either);
    let text = ITALIC.replace_all(&text, unwrap_either);
    let text = HEADING.replace_all(&text, " ");
    let text = text.replace('\n', " ");
    let text = WHITESPACE.replace_all(&text, " ");

    text.trim().to_string()
}

/// 取两个分支中匹配到的那一个内部文本
fn unwrap_either(caps: &Captures) -> String {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// HTML 实体编码 `& < > " '`
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// 高亮文本中的关键字
///
/// 先对整段文本做实体编码，再用同样编码过的关键字做不区分大小写的字面匹配，
/// 每处匹配包上 `<span class="search-highlight">`。关键字为空时只返回编码后的文本。
pub fn highlight_match(text: &str, query: &str) -> String {
    let escaped_text = escape_html(text);
    if query.is_empty() {
        return escaped_text;
    }

    let pattern = format!("(?i){}", regex::escape(&escape_html(query)));
    let Ok(re) = Regex::new(&pattern) else {
        return escaped_text;
    };

    re.replace_all(&escaped_text, |caps: &Captures| {
        format!("<span class=\"search-highlight\">{}</span>", &caps[0])
    })
    .into_owned()
}
